use thiserror::Error;

use crate::observer::{HookError, Stage};

/// Failures reported by a document-store driver.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("command failed: {0}")]
    Command(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("transaction already in progress on session {0}")]
    TransactionInProgress(String),

    #[error("no transaction in progress on session {0}")]
    NoTransaction(String),

    #[error("write conflict on {0}")]
    WriteConflict(String),

    #[error("unsupported pipeline stage: {0}")]
    UnsupportedStage(String),

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum OdmError {
    #[error("{op} failed: {source}")]
    Execution {
        op: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("no document found in {collection}")]
    NotFound { collection: String },

    #[error("transaction aborted: {cause}")]
    TransactionAborted {
        cause: Box<OdmError>,
        /// Set when aborting the transaction failed as well.
        abort_error: Option<StoreError>,
    },

    #[error("unsupported identifier type: {0}")]
    UnsupportedIdentifierType(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("model {0} has no `_id` field of type ObjectId")]
    MissingIdentifierField(String),

    #[error("observer {stage} hook failed for {model}: {source}")]
    ObserverHook {
        stage: Stage,
        model: String,
        #[source]
        source: HookError,
    },

    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    #[error("invalid relation descriptor: {0}")]
    InvalidRelation(String),

    #[error("BSON serialization: {0}")]
    Serialization(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("unit of work failed: {0}")]
    UnitOfWork(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl OdmError {
    pub(crate) fn execution(op: &'static str, source: StoreError) -> Self {
        Self::Execution { op, source }
    }

    /// Wraps a caller-defined failure raised inside a unit of work.
    pub fn unit_of_work<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::UnitOfWork(err.into())
    }

    /// Name of the operation for `Execution` errors.
    #[must_use]
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Execution { op, .. } => Some(*op),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<bson::error::Error> for OdmError {
    fn from(e: bson::error::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for OdmError {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OdmError>;
