#![allow(dead_code)]

use bson::oid::ObjectId;
use bson::{Bson, Document};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use odmkit::context::{ExecContext, SessionId};
use odmkit::errors::StoreError;
use odmkit::model::{Entity, FieldKind, FieldMeta, Model};
use odmkit::observer::{HookResult, ModelObserver, ObserverRecord, Stage};
use odmkit::store::{
    DeleteReport, DocumentStore, FindOptions, MemoryStore, Namespace, StoreResult, StoreSession,
    UpdateReport,
};
use odmkit::{Odm, OdmConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub age: i32,
}

impl User {
    pub fn new(name: &str, age: i32) -> Self {
        Self { id: None, name: name.to_string(), age }
    }

    pub fn with_id(name: &str, age: i32) -> Self {
        Self { id: Some(ObjectId::new()), name: name.to_string(), age }
    }
}

impl Model for User {
    fn fields() -> &'static [FieldMeta] {
        const FIELDS: &[FieldMeta] = &[
            FieldMeta::new("_id", FieldKind::ObjectId),
            FieldMeta::new("name", FieldKind::String),
            FieldMeta::new("age", FieldKind::Int),
        ];
        FIELDS
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub author_id: Option<ObjectId>,
}

impl Model for Post {
    fn fields() -> &'static [FieldMeta] {
        const FIELDS: &[FieldMeta] = &[
            FieldMeta::new("_id", FieldKind::ObjectId),
            FieldMeta::new("title", FieldKind::String),
            FieldMeta::new("author_id", FieldKind::ObjectId),
        ];
        FIELDS
    }
}

/// A model keyed by a plain string, so it has no `ObjectId` identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    #[serde(rename = "_id")]
    pub key: String,
    pub value: String,
}

impl Model for Setting {
    fn fields() -> &'static [FieldMeta] {
        const FIELDS: &[FieldMeta] = &[FieldMeta::new("_id", FieldKind::String), FieldMeta::new("value", FieldKind::String)];
        FIELDS
    }
}

/// A user that brings its own observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditedUser {
    pub name: String,
    #[serde(skip)]
    pub log: Option<EventLog>,
}

impl Model for AuditedUser {
    fn observers(&self) -> Vec<ObserverRecord> {
        match &self.log {
            Some(log) => vec![Recorder::new("model", log).record()],
            None => Vec::new(),
        }
    }
}

pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Records `tag:stage` for every hook and fails at one stage on request.
pub struct Recorder {
    tag: String,
    log: EventLog,
    fail_at: Option<Stage>,
}

impl Recorder {
    pub fn new(tag: &str, log: &EventLog) -> Self {
        Self { tag: tag.to_string(), log: Arc::clone(log), fail_at: None }
    }

    pub fn failing_at(mut self, stage: Stage) -> Self {
        self.fail_at = Some(stage);
        self
    }

    pub fn record(self) -> ObserverRecord {
        let name = self.tag.clone();
        ObserverRecord::new(Arc::new(self)).named(name)
    }

    fn hit(&self, stage: Stage) -> HookResult {
        self.log.lock().push(format!("{}:{stage}", self.tag));
        if self.fail_at == Some(stage) {
            return Err(format!("{} rejected {stage}", self.tag).into());
        }
        Ok(())
    }
}

impl ModelObserver for Recorder {
    fn creating(&self, _model: &dyn Entity) -> HookResult {
        self.hit(Stage::Creating)
    }
    fn created(&self, _model: &dyn Entity) -> HookResult {
        self.hit(Stage::Created)
    }
    fn updating(&self, _model: &dyn Entity) -> HookResult {
        self.hit(Stage::Updating)
    }
    fn updated(&self, _model: &dyn Entity) -> HookResult {
        self.hit(Stage::Updated)
    }
    fn deleting(&self, _model: &dyn Entity) -> HookResult {
        self.hit(Stage::Deleting)
    }
    fn deleted(&self, _model: &dyn Entity) -> HookResult {
        self.hit(Stage::Deleted)
    }
}

/// Wraps a [`MemoryStore`], records the calls it sees and fails named operations.
#[derive(Clone, Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    failing: Arc<Mutex<HashSet<&'static str>>>,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: &'static str) {
        self.failing.lock().insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.failing.lock().remove(op);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    pub fn called(&self, op: &str) -> bool {
        self.calls.lock().iter().any(|c| *c == op)
    }

    fn enter(&self, op: &'static str) -> StoreResult<()> {
        self.calls.lock().push(op);
        if self.failing.lock().contains(op) {
            return Err(StoreError::Unavailable(format!("injected failure in {op}")));
        }
        Ok(())
    }
}

impl DocumentStore for FaultyStore {
    fn insert_one(&self, ctx: &ExecContext, ns: &Namespace, doc: Document) -> StoreResult<Bson> {
        self.enter("insert_one")?;
        self.inner.insert_one(ctx, ns, doc)
    }

    fn insert_many(&self, ctx: &ExecContext, ns: &Namespace, docs: Vec<Document>) -> StoreResult<Vec<Bson>> {
        self.enter("insert_many")?;
        self.inner.insert_many(ctx, ns, docs)
    }

    fn find_one(
        &self,
        ctx: &ExecContext,
        ns: &Namespace,
        filter: &Document,
        projection: Option<&Document>,
    ) -> StoreResult<Option<Document>> {
        self.enter("find_one")?;
        self.inner.find_one(ctx, ns, filter, projection)
    }

    fn find(
        &self,
        ctx: &ExecContext,
        ns: &Namespace,
        filter: &Document,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        self.enter("find")?;
        self.inner.find(ctx, ns, filter, options)
    }

    fn update_one(
        &self,
        ctx: &ExecContext,
        ns: &Namespace,
        filter: &Document,
        update: &Document,
    ) -> StoreResult<UpdateReport> {
        self.enter("update_one")?;
        self.inner.update_one(ctx, ns, filter, update)
    }

    fn delete_one(&self, ctx: &ExecContext, ns: &Namespace, filter: &Document) -> StoreResult<DeleteReport> {
        self.enter("delete_one")?;
        self.inner.delete_one(ctx, ns, filter)
    }

    fn count(&self, ctx: &ExecContext, ns: &Namespace, filter: &Document) -> StoreResult<u64> {
        self.enter("count")?;
        self.inner.count(ctx, ns, filter)
    }

    fn aggregate(&self, ctx: &ExecContext, ns: &Namespace, pipeline: &[Document]) -> StoreResult<Vec<Document>> {
        self.enter("aggregate")?;
        self.inner.aggregate(ctx, ns, pipeline)
    }

    fn start_session(&self) -> StoreResult<Box<dyn StoreSession>> {
        self.enter("start_session")?;
        let inner = self.inner.start_session()?;
        Ok(Box::new(FaultySession { inner, store: self.clone() }))
    }
}

struct FaultySession {
    inner: Box<dyn StoreSession>,
    store: FaultyStore,
}

impl StoreSession for FaultySession {
    fn id(&self) -> SessionId {
        self.inner.id()
    }

    fn start_transaction(&mut self) -> StoreResult<()> {
        self.store.enter("start_transaction")?;
        self.inner.start_transaction()
    }

    fn commit_transaction(&mut self, ctx: &ExecContext) -> StoreResult<()> {
        self.store.enter("commit_transaction")?;
        self.inner.commit_transaction(ctx)
    }

    fn abort_transaction(&mut self, ctx: &ExecContext) -> StoreResult<()> {
        self.store.enter("abort_transaction")?;
        self.inner.abort_transaction(ctx)
    }
}

pub fn users_ns() -> Namespace {
    Namespace::new("app", "users")
}

pub fn odm_over(store: Arc<dyn DocumentStore>) -> Odm {
    Odm::new(store, OdmConfig::default())
}

pub fn memory_odm() -> (Odm, MemoryStore) {
    let store = MemoryStore::new();
    (odm_over(Arc::new(store.clone())), store)
}

pub fn faulty_odm() -> (Odm, FaultyStore) {
    let store = FaultyStore::new();
    (odm_over(Arc::new(store.clone())), store)
}
