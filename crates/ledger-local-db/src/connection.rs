//! Database connection management.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How long a connection waits on another writer before reporting busy.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Database file name inside the ledger state directory.
pub const DATABASE_FILE_NAME: &str = "ledger.db";

/// Database connection handle.
///
/// Cloning is cheap: clones share one connection and every logical operation
/// runs inside its own transaction. Several handles may be opened on the same
/// file; SQLite's writer lock and the busy timeout serialize them.
#[derive(Debug, Clone)]
pub struct Database {
    connection: Arc<std::sync::Mutex<Connection>>,
}

impl Database {
    /// Get the default database path based on the LEDGER_HOME environment
    /// variable or platform defaults.
    ///
    /// Priority order:
    /// 1. `LEDGER_HOME` environment variable
    /// 2. Platform-specific defaults:
    ///    - Linux: `${XDG_STATE_HOME:-~/.local/state}/sandbox-ledger/ledger.db`
    ///    - macOS: `~/Library/Application Support/sandbox-ledger/ledger.db`
    ///    - Windows: `%LOCALAPPDATA%\sandbox-ledger\ledger.db`
    pub fn default_path() -> crate::Result<PathBuf> {
        if let Ok(home) = std::env::var("LEDGER_HOME") {
            return Ok(PathBuf::from(home).join(DATABASE_FILE_NAME));
        }

        #[cfg(target_os = "linux")]
        {
            let state_home = match std::env::var("XDG_STATE_HOME") {
                Ok(dir) => PathBuf::from(dir),
                Err(_) => home_dir()?.join(".local").join("state"),
            };
            Ok(state_home.join("sandbox-ledger").join(DATABASE_FILE_NAME))
        }

        #[cfg(target_os = "macos")]
        {
            Ok(home_dir()?
                .join("Library")
                .join("Application Support")
                .join("sandbox-ledger")
                .join(DATABASE_FILE_NAME))
        }

        #[cfg(target_os = "windows")]
        {
            let local_appdata = std::env::var("LOCALAPPDATA").map_err(|_| {
                crate::Error::generic("LOCALAPPDATA environment variable not set")
            })?;
            Ok(PathBuf::from(local_appdata).join("sandbox-ledger").join(DATABASE_FILE_NAME))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            Ok(home_dir()?.join(".sandbox-ledger").join(DATABASE_FILE_NAME))
        }
    }
}

#[allow(dead_code)]
fn home_dir() -> crate::Result<PathBuf> {
    std::env::var("HOME")
        .map(PathBuf::from)
        .map_err(|_| crate::Error::generic("HOME environment variable not set"))
}

impl Database {
    /// Open a new database connection at the specified path.
    ///
    /// If the path doesn't exist, the database will be created.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        Self::open_with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a database file with an explicit busy timeout.
    pub fn open_with_busy_timeout<P: AsRef<Path>>(
        path: P,
        busy_timeout: Duration,
    ) -> crate::Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(busy_timeout)?;
        // WAL lets readers proceed while another handle holds the writer lock
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Opened {} (journal_mode={})", path.as_ref().display(), mode);
        Self::initialize_schema(&conn)?;
        Ok(Self {
            connection: Arc::new(std::sync::Mutex::new(conn)),
        })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> crate::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            connection: Arc::new(std::sync::Mutex::new(conn)),
        })
    }

    /// Initialize the database schema.
    fn initialize_schema(conn: &Connection) -> crate::Result<()> {
        // Cascading deletes rely on enforced foreign keys
        conn.pragma_update(None, "foreign_keys", "ON")?;

        crate::migrations::MigrationManager::migrate(conn)?;

        Ok(())
    }

    /// Get a reference to the underlying connection.
    ///
    /// The caller must ensure proper locking if used concurrently.
    pub fn connection(&self) -> &std::sync::Mutex<Connection> {
        &self.connection
    }

    /// Execute a deferred transaction with automatic rollback on error.
    pub fn transaction<F, T>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> crate::Result<T>,
    {
        self.run_transaction(TransactionBehavior::Deferred, f)
    }

    /// Execute a transaction that takes the writer lock up front.
    ///
    /// Used for read-then-write sequences (version allocation) where two
    /// handles must not both read the same state before either writes.
    pub fn immediate_transaction<F, T>(&self, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> crate::Result<T>,
    {
        self.run_transaction(TransactionBehavior::Immediate, f)
    }

    fn run_transaction<F, T>(&self, behavior: TransactionBehavior, f: F) -> crate::Result<T>
    where
        F: FnOnce(&Connection) -> crate::Result<T>,
    {
        let conn = self.connection.lock().map_err(|e| {
            crate::Error::generic(format!("Failed to acquire database lock: {}", e))
        })?;

        let tx = Transaction::new_unchecked(&conn, behavior)?;
        match f(&tx) {
            Ok(result) => {
                tx.commit()?;
                Ok(result)
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }

    /// Close the handle.
    ///
    /// The underlying connection is closed once the last clone is closed or
    /// dropped; closing a handle that still has live clones only releases
    /// this reference.
    pub fn close(self) -> crate::Result<()> {
        match Arc::try_unwrap(self.connection) {
            Ok(mutex) => {
                let conn = mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
                conn.close().map_err(|(_, e)| crate::Error::Database(e))?;
                debug!("Database connection closed");
                Ok(())
            }
            Err(_shared) => Ok(()),
        }
    }
}
