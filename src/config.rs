use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{OdmError, Result};

/// How `with(...)` treats relation names that have no descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationPolicy {
    /// Fail the query with `OdmError::UnknownRelation`.
    #[default]
    Strict,
    /// Skip the join and emit a warning.
    Lenient,
}

/// Logging setup consumed by `logger::configure_logging`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<PathBuf>,
    /// error|warn|info|debug|trace
    pub level: String,
    /// Number of rolled files to keep.
    pub retention: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { dir: None, level: "info".to_string(), retention: 7 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OdmConfig {
    pub database: String,
    pub relation_policy: RelationPolicy,
    /// Deadline applied to new queries and transactions; unset means no deadline.
    pub default_timeout_ms: Option<u64>,
    pub logging: LoggingConfig,
}

impl Default for OdmConfig {
    fn default() -> Self {
        Self {
            database: "app".to_string(),
            relation_policy: RelationPolicy::Strict,
            default_timeout_ms: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl OdmConfig {
    /// # Errors
    /// Returns `OdmError::Config` if the text is not valid TOML for this structure.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// # Errors
    /// Returns `OdmError::Config` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| OdmError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(OdmError::Config("database name must not be empty".into()));
        }
        Ok(())
    }
}
