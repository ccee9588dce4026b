use super::registry::{ObserverRecord, ObserverRegistry};
use super::traits::{HookError, Stage, call_hook};
use crate::diag;
use crate::errors::{OdmError, Result};
use crate::model::Entity;

impl ObserverRegistry {
    /// Runs every applicable observer for `stage` against `model`.
    ///
    /// Global records and `extra` (the model's own observers) are merged and ordered by
    /// descending priority; ties keep registration order with globals first. Every
    /// applicable observer runs even after a failure. Each failure goes to the error
    /// handler, and the first one is returned.
    pub fn dispatch(&self, stage: Stage, model: &dyn Entity, extra: &[ObserverRecord]) -> Result<()> {
        let mut records = self.snapshot();
        records.extend_from_slice(extra);
        if records.is_empty() {
            return Ok(());
        }
        records.sort_by_key(|r| std::cmp::Reverse(r.priority()));

        let handler = self.error_handler();
        let mut first: Option<HookError> = None;
        for record in records.iter().filter(|r| r.applies(stage, model)) {
            if let Err(e) = call_hook(record.observer(), stage, model) {
                diag!(
                    log::Level::Warn,
                    "observer {} failed at {stage} for {}: {e}",
                    record.name(),
                    model.type_name()
                );
                if let Some(h) = &handler {
                    h(&e, stage, model);
                }
                if first.is_none() {
                    first = Some(e);
                }
            }
        }

        match first {
            Some(source) => Err(OdmError::ObserverHook {
                stage,
                model: model.type_name().to_string(),
                source,
            }),
            None => Ok(()),
        }
    }
}
