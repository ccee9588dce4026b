//! Typed query handle: filter, sort, paging, projection and relations, plus the
//! terminal fetch and mutation operations.

mod builder;
mod ops;
mod spec;

pub use builder::Query;
pub use spec::QuerySpec;
