use std::path::Path;
use std::sync::Arc;

use crate::config::OdmConfig;
use crate::context::ExecContext;
use crate::errors::Result;
use crate::model::Model;
use crate::observer::{ObserverRecord, ObserverRegistry};
use crate::query::Query;
use crate::store::{DocumentStore, Namespace};
use crate::transaction::TransactionCoordinator;

struct Inner {
    store: Arc<dyn DocumentStore>,
    observers: Arc<ObserverRegistry>,
    config: OdmConfig,
}

/// Entry handle: a store, its observer registry and the configuration.
///
/// Cheap to clone; clones share the store and the registry.
#[derive(Clone)]
pub struct Odm {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Odm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Odm")
            .field("config", &self.inner.config)
            .field("observers", &self.inner.observers)
            .finish_non_exhaustive()
    }
}

impl Odm {
    /// Creates a handle with a fresh observer registry.
    pub fn new(store: Arc<dyn DocumentStore>, config: OdmConfig) -> Self {
        Self::with_registry(store, Arc::new(ObserverRegistry::new()), config)
    }

    /// Creates a handle sharing an existing registry.
    pub fn with_registry(
        store: Arc<dyn DocumentStore>,
        observers: Arc<ObserverRegistry>,
        config: OdmConfig,
    ) -> Self {
        log::info!(
            "odm ready: database={} relation_policy={:?}",
            config.database,
            config.relation_policy
        );
        Self { inner: Arc::new(Inner { store, observers, config }) }
    }

    /// Creates a handle from a TOML configuration file.
    ///
    /// # Errors
    /// `OdmError::Config` if the file cannot be read or parsed.
    pub fn open(store: Arc<dyn DocumentStore>, config_path: &Path) -> Result<Self> {
        Ok(Self::new(store, OdmConfig::load(config_path)?))
    }

    #[must_use]
    pub fn observers(&self) -> &Arc<ObserverRegistry> {
        &self.inner.observers
    }

    /// Registers a global observer. Shorthand for `observers().register(..)`.
    pub fn observe(&self, record: ObserverRecord) {
        self.inner.observers.register(record);
    }

    #[must_use]
    pub fn config(&self) -> &OdmConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    /// Context with the configured default deadline, starting now.
    #[must_use]
    pub fn default_context(&self) -> ExecContext {
        match self.inner.config.default_timeout() {
            Some(t) => ExecContext::new().with_timeout(t),
            None => ExecContext::new(),
        }
    }

    /// A query over `collection` in the configured database.
    #[must_use]
    pub fn query<M: Model>(&self, collection: &str) -> Query<M> {
        Query::new(
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.observers),
            Namespace::new(self.inner.config.database.clone(), collection),
            self.default_context(),
            self.inner.config.relation_policy,
        )
    }

    #[must_use]
    pub fn transaction(&self) -> TransactionCoordinator {
        TransactionCoordinator::new(Arc::clone(&self.inner.store)).with_context(self.default_context())
    }

    /// Runs `work` in a store transaction. Queries inside should adopt the given
    /// context with `Query::with_context`.
    ///
    /// # Errors
    /// See [`TransactionCoordinator::run`].
    pub fn run_in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&ExecContext) -> Result<T>,
    {
        self.transaction().run(work)
    }
}
