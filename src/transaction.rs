//! Runs a unit of work inside a store transaction.

use std::sync::Arc;

use crate::context::ExecContext;
use crate::errors::{OdmError, Result};
use crate::logger::AUDIT_TARGET;
use crate::store::DocumentStore;

/// Session and transaction lifecycle around a closure.
///
/// Each [`run`](Self::run) opens a fresh session. Calling `run` again from inside a unit
/// of work therefore opens an independent session rather than a nested transaction.
#[derive(Clone)]
pub struct TransactionCoordinator {
    store: Arc<dyn DocumentStore>,
    base: ExecContext,
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator").field("base", &self.base).finish()
    }
}

impl TransactionCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store, base: ExecContext::default() }
    }

    /// Deadline (and any other context) applied to every call of the unit of work.
    #[must_use]
    pub fn with_context(mut self, base: ExecContext) -> Self {
        self.base = base;
        self
    }

    /// Starts a session and a transaction, runs `work` with a context bound to that
    /// session, then commits on `Ok` or aborts on `Err`.
    ///
    /// The session is released on every exit path, unwinding included.
    ///
    /// # Errors
    /// * `Execution { op: "start_session" | "start_transaction" | "commit_transaction" }`
    ///   when the store refuses a lifecycle step;
    /// * `TransactionAborted { cause, abort_error }` when `work` fails. `abort_error` is
    ///   set only if the abort failed too.
    pub fn run<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&ExecContext) -> Result<T>,
    {
        let mut session =
            self.store.start_session().map_err(|e| OdmError::execution("start_session", e))?;
        session
            .start_transaction()
            .map_err(|e| OdmError::execution("start_transaction", e))?;
        let ctx = self.base.with_session(session.id());
        log::debug!("transaction started on session {}", session.id());

        match work(&ctx) {
            Ok(value) => {
                session
                    .commit_transaction(&ctx)
                    .map_err(|e| OdmError::execution("commit_transaction", e))?;
                log::info!(target: AUDIT_TARGET, "transaction committed on session {}", session.id());
                Ok(value)
            }
            Err(cause) => {
                let abort_error = session.abort_transaction(&ctx).err();
                match &abort_error {
                    Some(ae) => log::error!(
                        target: AUDIT_TARGET,
                        "transaction on session {} failed ({cause}) and abort failed: {ae}",
                        session.id()
                    ),
                    None => log::warn!(
                        target: AUDIT_TARGET,
                        "transaction on session {} aborted: {cause}",
                        session.id()
                    ),
                }
                Err(OdmError::TransactionAborted { cause: Box::new(cause), abort_error })
            }
        }
    }
}
