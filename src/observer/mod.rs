//! Lifecycle observers around create / update / delete.
//!
//! Observers register on an [`ObserverRegistry`] owned by the `Odm` handle, or come
//! from the model itself via [`Model::observers`](crate::model::Model::observers).
//! Optional capabilities (priority, stage filter, type filter) are attached to the
//! [`ObserverRecord`] when it is built.

mod dispatch;
mod registry;
mod traits;

pub use registry::{ErrorHandler, ObserverRecord, ObserverRegistry};
pub use traits::{
    HookError, HookResult, ModelObserver, OnlyType, Prioritized, Stage, StageFilter, StageSet,
    TypeFilter,
};
