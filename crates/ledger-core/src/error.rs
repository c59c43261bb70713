//! Core error types for the ledger.

/// Core error type for all ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] ledger_local_db::Error),

    #[error("Project not found: {project_id}")]
    ProjectNotFound { project_id: String },

    #[error("Version conflict on {project_id}:{file_path} after {attempts} attempts")]
    VersionConflict {
        project_id: String,
        file_path: String,
        attempts: u32,
    },

    #[error("Sandbox write failed for {path}: {message}")]
    Sandbox { path: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    /// Create a new sandbox write error.
    pub fn sandbox<P: Into<String>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Sandbox {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error.
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_error_is_not_double_prefixed() {
        let err = Error::from(ledger_local_db::Error::generic("database is locked"));
        assert_eq!(err.to_string(), "Generic database error: database is locked");

        let err = Error::from(ledger_local_db::Error::Database(
            ledger_local_db::rusqlite::Error::QueryReturnedNoRows,
        ));
        assert_eq!(err.to_string().matches("Database error").count(), 1);
    }
}
