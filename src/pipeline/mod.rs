//! Relation-aware plan composition: plain find vs. aggregation pipeline.

mod compose;
mod relation;

pub use compose::{ExecutionPlan, Retrieval, compose};
pub use relation::{Cardinality, RelationDescriptor, RelationSet};
