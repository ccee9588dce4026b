//! Query construction and execution over a BSON document store.
//!
//! An [`Odm`] handle binds typed [`Query`] values to a [`DocumentStore`]. Queries
//! accumulate AND / OR filters, sort, paging, projection and named relations; terminal
//! operations pick a plain find or an aggregation pipeline, and mutations run the
//! registered observers around the store call.

pub mod config;
pub mod context;
pub mod errors;
pub mod filter;
pub mod identifier;
pub mod logger;
pub mod model;
pub mod observer;
pub mod odm;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod transaction;

pub use config::{OdmConfig, RelationPolicy};
pub use context::{ExecContext, SessionId};
pub use errors::{OdmError, Result, StoreError};
pub use filter::{FilterBuilder, Operator};
pub use identifier::{IdInput, parse_identifier, resolve_identifier_field};
pub use model::{Entity, FieldKind, FieldMeta, Model};
pub use observer::{ModelObserver, ObserverRecord, ObserverRegistry, Stage};
pub use odm::Odm;
pub use pipeline::{Cardinality, ExecutionPlan, RelationDescriptor, RelationSet, Retrieval};
pub use query::{Query, QuerySpec};
pub use store::{DocumentStore, MemoryStore, Namespace, StoreSession};
pub use transaction::TransactionCoordinator;

/// Initializes logging from `odmkit-log.yaml` when present.
///
/// # Errors
/// Returns an error if the file exists but cannot be loaded.
pub fn init() -> std::result::Result<(), Box<dyn std::error::Error>> {
    logger::init()
}
