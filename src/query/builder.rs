use bson::{Bson, Document};
use log::Level;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::spec::QuerySpec;
use crate::config::RelationPolicy;
use crate::context::ExecContext;
use crate::diag;
use crate::errors::Result;
use crate::filter::{FilterBuilder, Operator};
use crate::identifier::{ID_FIELD, IdInput, identifier_for};
use crate::model::Model;
use crate::observer::{ObserverRecord, ObserverRegistry};
use crate::pipeline::{RelationDescriptor, RelationSet};
use crate::store::{DocumentStore, Namespace, Order, SortSpec};

/// A query over the collection of `M`.
///
/// Every configuring call consumes the query and returns the updated one, so a
/// configured query can be cloned and each clone refined independently:
///
/// ```ignore
/// let adults = odm.query::<User>("users").where_("age", ">=", 18);
/// let named = adults.clone().where_("name", "=", "alice");
/// ```
pub struct Query<M: Model> {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) registry: Arc<ObserverRegistry>,
    pub(crate) ns: Namespace,
    pub(crate) spec: QuerySpec,
    pub(crate) relations: Arc<RelationSet>,
    pub(crate) observers: Vec<ObserverRecord>,
    pub(crate) ctx: ExecContext,
    pub(crate) policy: RelationPolicy,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for Query<M> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
            ns: self.ns.clone(),
            spec: self.spec.clone(),
            relations: Arc::clone(&self.relations),
            observers: self.observers.clone(),
            ctx: self.ctx,
            policy: self.policy,
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for Query<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("model", &std::any::type_name::<M>())
            .field("ns", &self.ns)
            .field("spec", &self.spec)
            .field("relations", &self.relations.len())
            .field("observers", &self.observers.len())
            .field("ctx", &self.ctx)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<M: Model> Query<M> {
    pub(crate) fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<ObserverRegistry>,
        ns: Namespace,
        ctx: ExecContext,
        policy: RelationPolicy,
    ) -> Self {
        Self {
            store,
            registry,
            ns,
            spec: QuerySpec::default(),
            relations: Arc::new(RelationSet::new()),
            observers: Vec::new(),
            ctx,
            policy,
            _model: PhantomData,
        }
    }

    fn filter_mut(&mut self) -> &mut FilterBuilder {
        &mut self.spec.filter
    }

    /// Adds an AND clause. `op` is one of `=`, `>`, `<`, `!=`, `>=`, `<=`; anything else
    /// is treated as `=`.
    #[must_use]
    pub fn where_(self, field: impl Into<String>, op: &str, value: impl Into<Bson>) -> Self {
        self.where_op(field, Operator::parse(op), value)
    }

    #[must_use]
    pub fn where_op(mut self, field: impl Into<String>, op: Operator, value: impl Into<Bson>) -> Self {
        self.filter_mut().and(field, op, value);
        self
    }

    #[must_use]
    pub fn where_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.filter_mut().and_in(field, values);
        self
    }

    #[must_use]
    pub fn where_not_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.filter_mut().and_not_in(field, values);
        self
    }

    /// Adds an OR clause.
    #[must_use]
    pub fn or_where(self, field: impl Into<String>, op: &str, value: impl Into<Bson>) -> Self {
        self.or_where_op(field, Operator::parse(op), value)
    }

    #[must_use]
    pub fn or_where_op(mut self, field: impl Into<String>, op: Operator, value: impl Into<Bson>) -> Self {
        self.filter_mut().or(field, op, value);
        self
    }

    #[must_use]
    pub fn or_where_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.filter_mut().or_in(field, values);
        self
    }

    #[must_use]
    pub fn or_where_not_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        self.filter_mut().or_not_in(field, values);
        self
    }

    /// Adds `_id = id`, or yields `None` (with a warning) when `M` has no `ObjectId`
    /// `_id` or `id` does not parse. See [`try_where_id`](Self::try_where_id).
    #[must_use]
    pub fn where_id(self, id: impl Into<IdInput>) -> Option<Self> {
        match self.try_where_id(id) {
            Ok(q) => Some(q),
            Err(e) => {
                diag!(Level::Warn, "where_id on {}: {e}", std::any::type_name::<M>());
                None
            }
        }
    }

    /// # Errors
    /// `MissingIdentifierField`, `InvalidIdentifier` or `UnsupportedIdentifierType`.
    pub fn try_where_id(self, id: impl Into<IdInput>) -> Result<Self> {
        let oid = identifier_for::<M>(id)?;
        Ok(self.where_op(ID_FIELD, Operator::Eq, oid))
    }

    /// Appends a sort key; earlier keys take precedence.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        let order = if ascending { Order::Asc } else { Order::Desc };
        self.spec.sort.push(SortSpec::new(field, order));
        self
    }

    /// Zero clears the limit.
    #[must_use]
    pub fn limit(mut self, n: u64) -> Self {
        self.spec.limit = n;
        self
    }

    #[must_use]
    pub fn offset(mut self, n: u64) -> Self {
        self.spec.skip = n;
        self
    }

    /// Replaces the projection with the given fields.
    #[must_use]
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.select(fields);
        self
    }

    #[must_use]
    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.exclude(fields);
        self
    }

    /// Requests relations by name; they are joined in request order.
    #[must_use]
    pub fn with<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.relations.extend(relations.into_iter().map(Into::into));
        self
    }

    /// Attaches a shared relation set, replacing the current one.
    #[must_use]
    pub fn relations(mut self, set: Arc<RelationSet>) -> Self {
        self.relations = set;
        self
    }

    /// Adds descriptors on top of the current relation set. The shared set is copied,
    /// never modified.
    ///
    /// # Errors
    /// `OdmError::InvalidRelation` for an invalid descriptor.
    pub fn set_relation_config(mut self, config: HashMap<String, RelationDescriptor>) -> Result<Self> {
        let mut set = RelationSet::clone(&self.relations);
        set.extend(config)?;
        self.relations = Arc::new(set);
        Ok(self)
    }

    #[must_use]
    pub fn relation_policy(mut self, policy: RelationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Adds an observer for mutations run through this query.
    #[must_use]
    pub fn observe(mut self, record: ObserverRecord) -> Self {
        self.observers.push(record);
        self
    }

    /// Replaces the execution context (deadline, session).
    #[must_use]
    pub fn with_context(mut self, ctx: ExecContext) -> Self {
        self.ctx = ctx;
        self
    }

    #[must_use]
    pub fn in_database(mut self, database: impl Into<String>) -> Self {
        self.ns.database = database.into();
        self
    }

    #[must_use]
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    #[must_use]
    pub fn context(&self) -> &ExecContext {
        &self.ctx
    }

    /// The final filter this query would send.
    #[must_use]
    pub fn to_bson(&self) -> Document {
        self.spec.final_filter()
    }
}
