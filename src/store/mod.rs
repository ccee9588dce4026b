//! Boundary with the document-store driver.
//!
//! The query layer only shapes calls into the primitive operations below. Any driver can
//! sit behind [`DocumentStore`]; [`MemoryStore`] is the in-process reference store.

pub mod memory;
mod types;

use bson::{Bson, Document};

use crate::context::{ExecContext, SessionId};
use crate::errors::StoreError;

pub use memory::MemoryStore;
pub use types::{
    DeleteReport, FindOptions, Namespace, Order, SortSpec, UpdateReport, sort_document,
};

pub type StoreResult<T> = Result<T, StoreError>;

pub trait DocumentStore: Send + Sync {
    /// Inserts one document and returns its `_id`.
    fn insert_one(&self, ctx: &ExecContext, ns: &Namespace, doc: Document) -> StoreResult<Bson>;

    fn insert_many(
        &self,
        ctx: &ExecContext,
        ns: &Namespace,
        docs: Vec<Document>,
    ) -> StoreResult<Vec<Bson>>;

    fn find_one(
        &self,
        ctx: &ExecContext,
        ns: &Namespace,
        filter: &Document,
        projection: Option<&Document>,
    ) -> StoreResult<Option<Document>>;

    fn find(
        &self,
        ctx: &ExecContext,
        ns: &Namespace,
        filter: &Document,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>>;

    /// Applies an update document (`{"$set": {...}}`) to the first match.
    fn update_one(
        &self,
        ctx: &ExecContext,
        ns: &Namespace,
        filter: &Document,
        update: &Document,
    ) -> StoreResult<UpdateReport>;

    fn delete_one(&self, ctx: &ExecContext, ns: &Namespace, filter: &Document)
    -> StoreResult<DeleteReport>;

    fn count(&self, ctx: &ExecContext, ns: &Namespace, filter: &Document) -> StoreResult<u64>;

    fn aggregate(
        &self,
        ctx: &ExecContext,
        ns: &Namespace,
        pipeline: &[Document],
    ) -> StoreResult<Vec<Document>>;

    fn start_session(&self) -> StoreResult<Box<dyn StoreSession>>;
}

/// A store session. Dropping it releases the session and discards any transaction
/// still in progress.
pub trait StoreSession: Send {
    fn id(&self) -> SessionId;

    fn start_transaction(&mut self) -> StoreResult<()>;

    fn commit_transaction(&mut self, ctx: &ExecContext) -> StoreResult<()>;

    fn abort_transaction(&mut self, ctx: &ExecContext) -> StoreResult<()>;
}
