//! In-process reference store.
//!
//! Implements the full [`DocumentStore`] surface over in-memory collections so the query
//! layer can run end to end without a server. Transactions take a snapshot of the
//! committed state when they start; commit publishes only the namespaces the
//! transaction wrote, and abort discards them. A commit whose written namespace was
//! changed by someone else since the snapshot fails with a write conflict.

mod aggregate;
mod filter;
mod ops;

use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use self::aggregate::{Collections, run_pipeline};
use self::filter::{compare_docs, eval_filter, parse_filter, values_equal};
use self::ops::{apply_projection, apply_update};
use super::{
    DeleteReport, DocumentStore, FindOptions, Namespace, StoreResult, StoreSession, UpdateReport,
};
use crate::context::{ExecContext, SessionId};
use crate::errors::StoreError;

struct TxnState {
    working: Collections,
    /// Committed versions at snapshot time.
    seen: HashMap<Namespace, u64>,
    dirty: HashSet<Namespace>,
}

#[derive(Default)]
struct SessionState {
    txn: Option<TxnState>,
}

/// Committed collections; every committed write bumps the namespace version.
#[derive(Default)]
struct Committed {
    docs: Collections,
    versions: HashMap<Namespace, u64>,
}

impl Committed {
    fn version(&self, ns: &Namespace) -> u64 {
        self.versions.get(ns).copied().unwrap_or(0)
    }

    fn bump(&mut self, ns: &Namespace) {
        *self.versions.entry(ns.clone()).or_insert(0) += 1;
    }
}

#[derive(Default)]
struct Inner {
    committed: RwLock<Committed>,
    sessions: Mutex<HashMap<SessionId, SessionState>>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let collections = self.inner.committed.read().docs.len();
        let sessions = self.active_sessions();
        f.debug_struct("MemoryStore")
            .field("collections", &collections)
            .field("sessions", &sessions)
            .finish()
    }
}

fn check_deadline(ctx: &ExecContext) -> StoreResult<()> {
    if ctx.is_expired() {
        return Err(StoreError::DeadlineExceeded);
    }
    Ok(())
}

fn with_id(doc: Document) -> (Bson, Document) {
    if let Some(id) = doc.get("_id") {
        return (id.clone(), doc);
    }
    let id = Bson::ObjectId(ObjectId::new());
    let mut out = Document::new();
    out.insert("_id", id.clone());
    for (k, v) in doc {
        out.insert(k, v);
    }
    (id, out)
}

fn ensure_unique(existing: &[Document], id: &Bson) -> StoreResult<()> {
    if existing.iter().any(|d| d.get("_id").is_some_and(|x| values_equal(x, id))) {
        return Err(StoreError::DuplicateKey(id.to_string()));
    }
    Ok(())
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed documents of `ns`, in insertion order.
    #[must_use]
    pub fn documents(&self, ns: &Namespace) -> Vec<Document> {
        self.inner.committed.read().docs.get(ns).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    fn read<T>(&self, ctx: &ExecContext, f: impl FnOnce(&Collections) -> StoreResult<T>) -> StoreResult<T> {
        check_deadline(ctx)?;
        if let Some(sid) = ctx.session() {
            let sessions = self.inner.sessions.lock();
            let state = sessions.get(&sid).ok_or_else(|| StoreError::SessionNotFound(sid.to_string()))?;
            if let Some(txn) = &state.txn {
                return f(&txn.working);
            }
        }
        f(&self.inner.committed.read().docs)
    }

    fn write<T>(
        &self,
        ctx: &ExecContext,
        ns: &Namespace,
        f: impl FnOnce(&mut Vec<Document>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        check_deadline(ctx)?;
        if let Some(sid) = ctx.session() {
            let mut sessions = self.inner.sessions.lock();
            let state =
                sessions.get_mut(&sid).ok_or_else(|| StoreError::SessionNotFound(sid.to_string()))?;
            if let Some(txn) = state.txn.as_mut() {
                txn.dirty.insert(ns.clone());
                return f(txn.working.entry(ns.clone()).or_default());
            }
        }
        let mut committed = self.inner.committed.write();
        let out = f(committed.docs.entry(ns.clone()).or_default())?;
        committed.bump(ns);
        Ok(out)
    }
}

impl DocumentStore for MemoryStore {
    fn insert_one(&self, ctx: &ExecContext, ns: &Namespace, doc: Document) -> StoreResult<Bson> {
        let (id, doc) = with_id(doc);
        self.write(ctx, ns, |docs| {
            ensure_unique(docs, &id)?;
            docs.push(doc);
            Ok(())
        })?;
        log::trace!("insert_one {ns} _id={id}");
        Ok(id)
    }

    fn insert_many(&self, ctx: &ExecContext, ns: &Namespace, docs: Vec<Document>) -> StoreResult<Vec<Bson>> {
        let prepared: Vec<(Bson, Document)> = docs.into_iter().map(with_id).collect();
        self.write(ctx, ns, |existing| {
            for (i, (id, _)) in prepared.iter().enumerate() {
                ensure_unique(existing, id)?;
                if prepared[..i].iter().any(|(other, _)| values_equal(other, id)) {
                    return Err(StoreError::DuplicateKey(id.to_string()));
                }
            }
            let mut ids = Vec::with_capacity(prepared.len());
            for (id, doc) in prepared {
                ids.push(id);
                existing.push(doc);
            }
            log::trace!("insert_many {ns} n={}", ids.len());
            Ok(ids)
        })
    }

    fn find_one(
        &self,
        ctx: &ExecContext,
        ns: &Namespace,
        filter: &Document,
        projection: Option<&Document>,
    ) -> StoreResult<Option<Document>> {
        let filter = parse_filter(filter)?;
        self.read(ctx, |cols| {
            let Some(doc) = cols.get(ns).and_then(|docs| docs.iter().find(|d| eval_filter(d, &filter)))
            else {
                return Ok(None);
            };
            match projection {
                Some(p) => apply_projection(doc, p).map(Some),
                None => Ok(Some(doc.clone())),
            }
        })
    }

    fn find(
        &self,
        ctx: &ExecContext,
        ns: &Namespace,
        filter: &Document,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        let filter = parse_filter(filter)?;
        let mut docs: Vec<Document> = self.read(ctx, |cols| {
            Ok(cols
                .get(ns)
                .map(|docs| docs.iter().filter(|d| eval_filter(d, &filter)).cloned().collect())
                .unwrap_or_default())
        })?;
        if !options.sort.is_empty() {
            docs.sort_by(|a, b| compare_docs(a, b, &options.sort));
        }
        let skip = usize::try_from(options.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = options.limit.and_then(|l| usize::try_from(l).ok()).unwrap_or(usize::MAX);
        let docs = docs.into_iter().skip(skip).take(limit);
        match &options.projection {
            Some(p) => docs.map(|d| apply_projection(&d, p)).collect(),
            None => Ok(docs.collect()),
        }
    }

    fn update_one(
        &self,
        ctx: &ExecContext,
        ns: &Namespace,
        filter: &Document,
        update: &Document,
    ) -> StoreResult<UpdateReport> {
        let filter = parse_filter(filter)?;
        self.write(ctx, ns, |docs| {
            let Some(target) = docs.iter_mut().find(|d| eval_filter(d, &filter)) else {
                return Ok(UpdateReport::default());
            };
            let mut updated = target.clone();
            let modified = apply_update(&mut updated, update)?;
            *target = updated;
            Ok(UpdateReport { matched: 1, modified: u64::from(modified) })
        })
    }

    fn delete_one(&self, ctx: &ExecContext, ns: &Namespace, filter: &Document) -> StoreResult<DeleteReport> {
        let filter = parse_filter(filter)?;
        self.write(ctx, ns, |docs| {
            match docs.iter().position(|d| eval_filter(d, &filter)) {
                Some(pos) => {
                    docs.remove(pos);
                    Ok(DeleteReport { deleted: 1 })
                }
                None => Ok(DeleteReport::default()),
            }
        })
    }

    fn count(&self, ctx: &ExecContext, ns: &Namespace, filter: &Document) -> StoreResult<u64> {
        let filter = parse_filter(filter)?;
        self.read(ctx, |cols| {
            let n = cols.get(ns).map_or(0, |docs| docs.iter().filter(|d| eval_filter(d, &filter)).count());
            Ok(n as u64)
        })
    }

    fn aggregate(&self, ctx: &ExecContext, ns: &Namespace, pipeline: &[Document]) -> StoreResult<Vec<Document>> {
        self.read(ctx, |cols| run_pipeline(cols, ns, pipeline))
    }

    fn start_session(&self) -> StoreResult<Box<dyn StoreSession>> {
        let id = SessionId::new();
        self.inner.sessions.lock().insert(id, SessionState::default());
        log::debug!("session {id} started");
        Ok(Box::new(MemorySession { id, inner: Arc::clone(&self.inner) }))
    }
}

struct MemorySession {
    id: SessionId,
    inner: Arc<Inner>,
}

impl MemorySession {
    fn take_txn(&self) -> StoreResult<TxnState> {
        let mut sessions = self.inner.sessions.lock();
        let state = sessions
            .get_mut(&self.id)
            .ok_or_else(|| StoreError::SessionNotFound(self.id.to_string()))?;
        state.txn.take().ok_or_else(|| StoreError::NoTransaction(self.id.to_string()))
    }
}

impl StoreSession for MemorySession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn start_transaction(&mut self) -> StoreResult<()> {
        let mut sessions = self.inner.sessions.lock();
        let state = sessions
            .get_mut(&self.id)
            .ok_or_else(|| StoreError::SessionNotFound(self.id.to_string()))?;
        if state.txn.is_some() {
            return Err(StoreError::TransactionInProgress(self.id.to_string()));
        }
        let committed = self.inner.committed.read();
        state.txn = Some(TxnState {
            working: committed.docs.clone(),
            seen: committed.versions.clone(),
            dirty: HashSet::new(),
        });
        Ok(())
    }

    fn commit_transaction(&mut self, ctx: &ExecContext) -> StoreResult<()> {
        check_deadline(ctx)?;
        let TxnState { mut working, seen, dirty } = self.take_txn()?;
        let mut committed = self.inner.committed.write();
        if let Some(ns) = dirty
            .iter()
            .find(|ns| committed.version(ns) != seen.get(*ns).copied().unwrap_or(0))
        {
            log::debug!("session {} lost a write conflict on {ns}", self.id);
            return Err(StoreError::WriteConflict(ns.to_string()));
        }
        for ns in dirty {
            let docs = working.remove(&ns).unwrap_or_default();
            committed.bump(&ns);
            committed.docs.insert(ns, docs);
        }
        log::debug!("session {} committed", self.id);
        Ok(())
    }

    fn abort_transaction(&mut self, _ctx: &ExecContext) -> StoreResult<()> {
        self.take_txn()?;
        log::debug!("session {} aborted", self.id);
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        if let Some(state) = self.inner.sessions.lock().remove(&self.id)
            && state.txn.is_some()
        {
            log::debug!("session {} released with an open transaction; discarding it", self.id);
        }
    }
}
