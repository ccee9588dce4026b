use bson::{Bson, Document, doc};

use super::builder::Query;
use crate::errors::{OdmError, Result};
use crate::logger::AUDIT_TARGET;
use crate::model::Model;
use crate::observer::{ObserverRecord, Stage};
use crate::pipeline::{ExecutionPlan, Retrieval, compose};
use crate::store::{DeleteReport, FindOptions, StoreResult, UpdateReport};

fn decode<M: Model>(doc: Document) -> Result<M> {
    Ok(bson::deserialize_from_document(doc)?)
}

impl<M: Model> Query<M> {
    /// The plan a fetch would run.
    ///
    /// # Errors
    /// `UnknownRelation` under the strict policy.
    pub fn plan(&self, retrieval: Retrieval) -> Result<ExecutionPlan> {
        compose(&self.spec, &self.relations, retrieval, self.policy)
    }

    /// Renders the multi-document plan as relaxed extended JSON.
    ///
    /// # Errors
    /// `UnknownRelation` under the strict policy, `Serialization` if rendering fails.
    pub fn explain(&self) -> Result<String> {
        let plan = self.plan(Retrieval::Many)?.to_document();
        serde_json::to_string_pretty(&Bson::Document(plan).into_relaxed_extjson())
            .map_err(|e| OdmError::Serialization(e.to_string()))
    }

    /// First matching document, as stored.
    ///
    /// Without relations the sort keys pick which document comes first; skip and limit
    /// are ignored. With relations the first joined row is returned.
    ///
    /// # Errors
    /// `NotFound` when nothing matches; `Execution { op: "first" }` on store failure.
    pub fn first_raw(&self) -> Result<Document> {
        let found = match self.plan(Retrieval::One)? {
            ExecutionPlan::Find { filter, options } if options.sort.is_empty() => self
                .store
                .find_one(&self.ctx, &self.ns, &filter, options.projection.as_ref())
                .map_err(|e| OdmError::execution("first", e))?,
            ExecutionPlan::Find { filter, options } => {
                let options = FindOptions { limit: Some(1), ..options };
                self.store
                    .find(&self.ctx, &self.ns, &filter, &options)
                    .map_err(|e| OdmError::execution("first", e))?
                    .into_iter()
                    .next()
            }
            ExecutionPlan::Aggregate { pipeline } => self
                .store
                .aggregate(&self.ctx, &self.ns, &pipeline)
                .map_err(|e| OdmError::execution("first", e))?
                .into_iter()
                .next(),
        };
        found.ok_or_else(|| OdmError::NotFound { collection: self.ns.collection.clone() })
    }

    /// # Errors
    /// See [`first_raw`](Self::first_raw); `Serialization` if the document does not decode.
    pub fn first(&self) -> Result<M> {
        decode(self.first_raw()?)
    }

    /// Every matching document, as stored. Empty when nothing matches.
    ///
    /// # Errors
    /// `Execution { op: "all" }` on store failure.
    pub fn all_raw(&self) -> Result<Vec<Document>> {
        let docs = match self.plan(Retrieval::Many)? {
            ExecutionPlan::Find { filter, options } => {
                self.store.find(&self.ctx, &self.ns, &filter, &options)
            }
            ExecutionPlan::Aggregate { pipeline } => self.store.aggregate(&self.ctx, &self.ns, &pipeline),
        };
        docs.map_err(|e| OdmError::execution("all", e))
    }

    /// # Errors
    /// See [`all_raw`](Self::all_raw).
    pub fn all(&self) -> Result<Vec<M>> {
        self.all_raw()?.into_iter().map(decode).collect()
    }

    /// Number of documents matching the filter. Relations, sort and paging are ignored.
    ///
    /// # Errors
    /// `Execution { op: "count" }` on store failure.
    pub fn count(&self) -> Result<u64> {
        self.store
            .count(&self.ctx, &self.ns, &self.spec.final_filter())
            .map_err(|e| OdmError::execution("count", e))
    }

    /// # Errors
    /// Same as [`count`](Self::count).
    pub fn exists(&self) -> Result<bool> {
        Ok(self.count()? > 0)
    }

    /// Runs a caller-supplied pipeline against the bound collection.
    ///
    /// # Errors
    /// `Execution { op: "aggregate" }` on store failure.
    pub fn aggregate(&self, pipeline: &[Document]) -> Result<Vec<Document>> {
        self.store
            .aggregate(&self.ctx, &self.ns, pipeline)
            .map_err(|e| OdmError::execution("aggregate", e))
    }

    fn observers_for(&self, model: &M) -> Vec<ObserverRecord> {
        let mut records = self.observers.clone();
        records.extend(model.observers());
        records
    }

    /// Pre-hooks, store call, post-hooks. A failed pre-hook skips the store call; a
    /// failed post-hook is reported after the write has been applied.
    fn mutate<T>(
        &self,
        model: &M,
        op: &'static str,
        stages: (Stage, Stage),
        write: impl FnOnce() -> StoreResult<T>,
    ) -> Result<T> {
        let records = self.observers_for(model);
        if let Err(e) = self.registry.dispatch(stages.0, model, &records) {
            log::info!(target: AUDIT_TARGET, "{op} on {} skipped: {e}", self.ns);
            return Err(e);
        }
        let out = write().map_err(|e| OdmError::execution(op, e))?;
        log::info!(target: AUDIT_TARGET, "{op} on {}", self.ns);
        self.registry.dispatch(stages.1, model, &records)?;
        Ok(out)
    }

    /// Inserts `model` and returns its `_id`.
    ///
    /// # Errors
    /// `Serialization`, `ObserverHook` or `Execution { op: "create" }`.
    pub fn create(&self, model: &M) -> Result<Bson> {
        let doc = bson::serialize_to_document(model)?;
        self.mutate(model, "create", (Stage::Creating, Stage::Created), || {
            self.store.insert_one(&self.ctx, &self.ns, doc)
        })
    }

    /// Inserts every model in one store call. Observers are not notified, and an
    /// empty slice does nothing.
    ///
    /// # Errors
    /// `Serialization` or `Execution { op: "bulk_create" }`.
    pub fn bulk_create(&self, models: &[M]) -> Result<Vec<Bson>> {
        if models.is_empty() {
            return Ok(Vec::new());
        }
        let docs = models.iter().map(bson::serialize_to_document).collect::<std::result::Result<Vec<_>, _>>()?;
        let ids = self
            .store
            .insert_many(&self.ctx, &self.ns, docs)
            .map_err(|e| OdmError::execution("bulk_create", e))?;
        log::info!(target: AUDIT_TARGET, "bulk_create on {}: {} documents", self.ns, ids.len());
        Ok(ids)
    }

    /// Sets `patch` on the first document matching the filter. `model` is what the
    /// observers see.
    ///
    /// # Errors
    /// `ObserverHook` or `Execution { op: "update" }`.
    pub fn update(&self, model: &M, patch: Document) -> Result<UpdateReport> {
        let filter = self.spec.final_filter();
        let update = doc! { "$set": patch };
        self.mutate(model, "update", (Stage::Updating, Stage::Updated), || {
            self.store.update_one(&self.ctx, &self.ns, &filter, &update)
        })
    }

    /// Deletes the first document matching the filter.
    ///
    /// # Errors
    /// `ObserverHook` or `Execution { op: "delete" }`.
    pub fn delete(&self, model: &M) -> Result<DeleteReport> {
        let filter = self.spec.final_filter();
        self.mutate(model, "delete", (Stage::Deleting, Stage::Deleted), || {
            self.store.delete_one(&self.ctx, &self.ns, &filter)
        })
    }
}
