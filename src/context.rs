use std::fmt;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Identifies a store session; transactions are scoped to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Deadline and session handle passed to every store call.
///
/// The default context has no deadline and no session: calls block until the store
/// answers or fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecContext {
    deadline: Option<Instant>,
    session: Option<SessionId>,
}

impl ExecContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|dl| Instant::now() > dl)
    }

    /// Time left before the deadline; `None` when no deadline is set.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|dl| dl.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_never_expires() {
        let ctx = ExecContext::new();
        assert!(!ctx.is_expired());
        assert!(ctx.remaining().is_none());
        assert!(ctx.session().is_none());
    }

    #[test]
    fn past_deadline_is_expired() {
        let ctx = ExecContext::new().with_deadline(Instant::now() - Duration::from_millis(5));
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn session_is_carried() {
        let id = SessionId::new();
        let ctx = ExecContext::new().with_session(id);
        assert_eq!(ctx.session(), Some(id));
    }
}
