//! AND / OR predicate accumulation and final-filter merging.

mod builder;
mod clause;
mod operator;

pub use builder::FilterBuilder;
pub use clause::{Clause, Predicate};
pub use operator::Operator;
