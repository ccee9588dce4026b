use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use super::traits::{HookError, ModelObserver, Prioritized, Stage, StageFilter, TypeFilter};
use crate::model::Entity;

/// Receives every hook failure with its stage and model.
pub type ErrorHandler = Arc<dyn Fn(&HookError, Stage, &dyn Entity) + Send + Sync>;

/// An observer plus the optional capabilities it was registered with.
///
/// Capabilities are recorded when the record is built; dispatch never probes the
/// observer for them.
#[derive(Clone)]
pub struct ObserverRecord {
    observer: Arc<dyn ModelObserver>,
    priority: Option<i32>,
    stage_filter: Option<Arc<dyn StageFilter>>,
    type_filter: Option<Arc<dyn TypeFilter>>,
    name: Option<String>,
}

impl ObserverRecord {
    pub fn new(observer: Arc<dyn ModelObserver>) -> Self {
        Self { observer, priority: None, stage_filter: None, type_filter: None, name: None }
    }

    /// Builds a record from a type implementing every capability.
    pub fn from_full<T>(observer: Arc<T>) -> Self
    where
        T: ModelObserver + StageFilter + Prioritized + TypeFilter + 'static,
    {
        let stage_filter: Arc<dyn StageFilter> = observer.clone();
        let type_filter: Arc<dyn TypeFilter> = observer.clone();
        Self {
            priority: Some(observer.priority()),
            stage_filter: Some(stage_filter),
            type_filter: Some(type_filter),
            observer,
            name: None,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn with_stage_filter(mut self, filter: Arc<dyn StageFilter>) -> Self {
        self.stage_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_type_filter(mut self, filter: Arc<dyn TypeFilter>) -> Self {
        self.type_filter = Some(filter);
        self
    }

    /// Label used in logs.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority.unwrap_or(0)
    }

    #[must_use]
    pub fn has_priority(&self) -> bool {
        self.priority.is_some()
    }

    #[must_use]
    pub fn has_stage_filter(&self) -> bool {
        self.stage_filter.is_some()
    }

    #[must_use]
    pub fn has_type_filter(&self) -> bool {
        self.type_filter.is_some()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Whether this record should run for `model` at `stage`.
    #[must_use]
    pub fn applies(&self, stage: Stage, model: &dyn Entity) -> bool {
        if let Some(tf) = &self.type_filter
            && !tf.accepts(model)
        {
            return false;
        }
        self.stage_filter.as_ref().is_none_or(|sf| sf.interested_in(stage))
    }

    pub(crate) fn observer(&self) -> &dyn ModelObserver {
        self.observer.as_ref()
    }
}

impl fmt::Debug for ObserverRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRecord")
            .field("name", &self.name())
            .field("priority", &self.priority)
            .field("has_stage_filter", &self.has_stage_filter())
            .field("has_type_filter", &self.has_type_filter())
            .finish()
    }
}

/// Process-level observer configuration, owned by an `Odm` handle.
///
/// Registration is meant to happen during start-up; the lock keeps late registration
/// safe, and dispatch works on a snapshot so hooks never run under it.
#[derive(Default)]
pub struct ObserverRegistry {
    global: RwLock<Vec<ObserverRecord>>,
    error_handler: RwLock<Option<ErrorHandler>>,
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("global", &*self.global.read())
            .field("has_error_handler", &self.error_handler.read().is_some())
            .finish()
    }
}

impl ObserverRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, record: ObserverRecord) {
        log::debug!("registering global observer {} (priority {})", record.name(), record.priority());
        self.global.write().push(record);
    }

    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&HookError, Stage, &dyn Entity) + Send + Sync + 'static,
    {
        let handler: ErrorHandler = Arc::new(handler);
        *self.error_handler.write() = Some(handler);
    }

    pub fn clear_error_handler(&self) {
        *self.error_handler.write() = None;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.global.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global.read().is_empty()
    }

    pub(crate) fn snapshot(&self) -> Vec<ObserverRecord> {
        self.global.read().clone()
    }

    pub(crate) fn error_handler(&self) -> Option<ErrorHandler> {
        self.error_handler.read().clone()
    }
}
