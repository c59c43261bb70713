//! SQLite storage for the sandbox ledger.
//!
//! This crate owns the relational side of the ledger: tenants, projects,
//! agent sessions, the append-only file version chains and auxiliary project
//! snapshots. Stores borrow a [`rusqlite::Connection`] (usually a transaction
//! obtained from [`Database::transaction`]) and never hold state of their own.

pub mod connection;
pub mod diff;
pub mod migrations;
pub mod models;
pub mod schema;

/// Result type for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for database operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {message}")]
    Migration { message: String },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Patch error: {message}")]
    Patch { message: String },

    #[error("Generic database error: {0}")]
    Generic(String),
}

impl Error {
    /// Create a new migration error.
    pub fn migration<S: Into<String>>(message: S) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    /// Create a new decode error for a value read back from a row.
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a new patch error.
    pub fn patch<S: Into<String>>(message: S) -> Self {
        Self::Patch {
            message: message.into(),
        }
    }

    /// Create a new generic database error.
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Whether a fresh attempt may get past this error: a duplicate key or
    /// lock contention. Other constraint failures are not retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => match err.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => true,
                rusqlite::ErrorCode::ConstraintViolation => matches!(
                    err.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                ),
                _ => false,
            },
            _ => false,
        }
    }

    /// Whether this error is a foreign key failure, i.e. a referenced parent
    /// row does not exist.
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            Self::Database(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        )
    }
}

/// Database connection and management.
pub use connection::Database;

/// The SQLite driver, so callers can name `Connection` in transaction closures.
pub use rusqlite;

/// Unified diff helpers for version chains.
pub use diff::{apply_unified_diff, unified_diff};

/// Database models and operations.
pub use models::{
    now_timestamp, FileVersionRecord, FileVersionStore, NewFileVersion, ProjectRecord, ProjectStore,
    SandboxState, SessionRecord, SessionStatus, SessionStore, SnapshotRecord, SnapshotStore,
    TenantRecord, TenantStore,
};

/// Schema definitions and constants.
pub use schema::*;
