//! Ledger configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings shared by every ledger component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Database file; `None` uses `LEDGER_HOME` or the platform state directory.
    pub database_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    /// Attempts at allocating the next version before giving up.
    pub max_append_attempts: u32,
    /// Base delay between append attempts, multiplied by the attempt number.
    pub retry_backoff_ms: u64,
    /// Skip appending when content equals the latest version. Off by default:
    /// every write normally produces a new version.
    pub skip_unchanged: bool,
    pub default_project_name_prefix: String,
    pub default_contact_domain: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: 5000,
            max_append_attempts: 5,
            retry_backoff_ms: 10,
            skip_unchanged: false,
            default_project_name_prefix: "Project".to_string(),
            default_contact_domain: "system.local".to_string(),
        }
    }
}

impl LedgerConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_append_attempts == 0 {
            return Err(crate::Error::config("max_append_attempts must be at least 1"));
        }
        if self.default_contact_domain.is_empty() {
            return Err(crate::Error::config("default_contact_domain must not be empty"));
        }
        Ok(())
    }

    /// The configured database path, or the default location.
    pub fn resolve_database_path(&self) -> crate::Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(ledger_local_db::Database::default_path()?),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(u64::from(attempt)))
    }

    pub fn default_contact(&self, tenant_id: &str) -> String {
        format!("{}@{}", tenant_id, self.default_contact_domain)
    }

    pub fn default_project_name(&self, project_id: &str) -> String {
        format!("{} {}", self.default_project_name_prefix, project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, r#"{"skip_unchanged": true, "max_append_attempts": 2}"#).unwrap();

        let config = LedgerConfig::load(&path).unwrap();
        assert!(config.skip_unchanged);
        assert_eq!(config.max_append_attempts, 2);
        assert_eq!(config.busy_timeout_ms, 5000);
        assert_eq!(config.default_contact("alice"), "alice@system.local");
        assert_eq!(config.default_project_name("p1"), "Project p1");
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = LedgerConfig {
            max_append_attempts: 0,
            ..LedgerConfig::default()
        };
        assert!(matches!(config.validate(), Err(crate::Error::Config { .. })));
    }

    #[test]
    fn test_backoff_grows_linearly() {
        let config = LedgerConfig::default();
        assert_eq!(config.retry_backoff(1), Duration::from_millis(10));
        assert_eq!(config.retry_backoff(3), Duration::from_millis(30));
    }
}
