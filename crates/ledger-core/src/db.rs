//! Store handle shared by the ledger components.

use crate::config::LedgerConfig;
use ledger_local_db::rusqlite::Connection;
use ledger_local_db::Database;
use std::sync::Arc;
use tracing::info;

/// Explicitly constructed database handle plus configuration.
///
/// Components receive a clone at construction time. Every call runs one
/// transaction on a blocking worker thread, so async callers never block the
/// executor on SQLite.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Database,
    config: Arc<LedgerConfig>,
}

impl LedgerDb {
    /// Open (or create) the database described by `config`.
    pub fn open(config: LedgerConfig) -> crate::Result<Self> {
        config.validate()?;
        let path = config.resolve_database_path()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::open_with_busy_timeout(&path, config.busy_timeout())?;
        info!("Ledger database opened at {}", path.display());
        Ok(Self::with_database(db, config))
    }

    /// In-memory database with default configuration, for tests and tools.
    pub fn open_in_memory() -> crate::Result<Self> {
        Self::open_in_memory_with(LedgerConfig::default())
    }

    pub fn open_in_memory_with(config: LedgerConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self::with_database(Database::open_in_memory()?, config))
    }

    /// Wrap an already opened database.
    pub fn with_database(db: Database, config: LedgerConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Get access to the underlying database for advanced operations.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Run `f` in a deferred transaction on a blocking thread.
    pub async fn transaction<F, T>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> ledger_local_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        Ok(tokio::task::spawn_blocking(move || db.transaction(f)).await??)
    }

    /// Run `f` in a transaction holding the writer lock from the start.
    pub async fn immediate_transaction<F, T>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> ledger_local_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        Ok(tokio::task::spawn_blocking(move || db.immediate_transaction(f)).await??)
    }

    /// Release this handle; the connection closes with the last clone.
    pub fn close(self) -> crate::Result<()> {
        Ok(self.db.close()?)
    }
}
