use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::model::Entity;

pub type HookError = Box<dyn std::error::Error + Send + Sync>;
pub type HookResult = Result<(), HookError>;

/// Lifecycle stage around a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Creating,
    Created,
    Updating,
    Updated,
    Deleting,
    Deleted,
}

impl Stage {
    pub const ALL: [Self; 6] = [
        Self::Creating,
        Self::Created,
        Self::Updating,
        Self::Updated,
        Self::Deleting,
        Self::Deleted,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Created => "created",
            Self::Updating => "updating",
            Self::Updated => "updated",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
        }
    }

    /// Pre-hooks run before the store mutation; their failure skips it.
    #[must_use]
    pub fn is_pre(self) -> bool {
        matches!(self, Self::Creating | Self::Updating | Self::Deleting)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hooks invoked around create / update / delete. Every hook defaults to a no-op.
pub trait ModelObserver: Send + Sync {
    fn creating(&self, _model: &dyn Entity) -> HookResult {
        Ok(())
    }
    fn created(&self, _model: &dyn Entity) -> HookResult {
        Ok(())
    }
    fn updating(&self, _model: &dyn Entity) -> HookResult {
        Ok(())
    }
    fn updated(&self, _model: &dyn Entity) -> HookResult {
        Ok(())
    }
    fn deleting(&self, _model: &dyn Entity) -> HookResult {
        Ok(())
    }
    fn deleted(&self, _model: &dyn Entity) -> HookResult {
        Ok(())
    }
}

/// Invokes the hook matching `stage`.
pub(crate) fn call_hook(observer: &dyn ModelObserver, stage: Stage, model: &dyn Entity) -> HookResult {
    match stage {
        Stage::Creating => observer.creating(model),
        Stage::Created => observer.created(model),
        Stage::Updating => observer.updating(model),
        Stage::Updated => observer.updated(model),
        Stage::Deleting => observer.deleting(model),
        Stage::Deleted => observer.deleted(model),
    }
}

/// Restricts which stages an observer is invoked for.
pub trait StageFilter: Send + Sync {
    fn interested_in(&self, stage: Stage) -> bool;
}

/// Ordering weight; higher runs first.
pub trait Prioritized: Send + Sync {
    fn priority(&self) -> i32;
}

/// Restricts which models an observer is invoked for.
pub trait TypeFilter: Send + Sync {
    fn accepts(&self, model: &dyn Entity) -> bool;
}

impl<F> StageFilter for F
where
    F: Fn(Stage) -> bool + Send + Sync,
{
    fn interested_in(&self, stage: Stage) -> bool {
        self(stage)
    }
}

/// A fixed set of stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageSet(Vec<Stage>);

impl StageSet {
    #[must_use]
    pub fn of(stages: &[Stage]) -> Self {
        Self(stages.to_vec())
    }

    #[must_use]
    pub fn contains(&self, stage: Stage) -> bool {
        self.0.contains(&stage)
    }
}

impl StageFilter for StageSet {
    fn interested_in(&self, stage: Stage) -> bool {
        self.contains(stage)
    }
}

/// Accepts only models of type `T`.
pub struct OnlyType<T>(PhantomData<fn() -> T>);

impl<T: Any> OnlyType<T> {
    #[must_use]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: Any> Default for OnlyType<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any> TypeFilter for OnlyType<T> {
    fn accepts(&self, model: &dyn Entity) -> bool {
        model.as_any().is::<T>()
    }
}
