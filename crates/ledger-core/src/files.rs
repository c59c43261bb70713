//! Versioned file store: append-only version chains per `(project, path)`.

use crate::db::LedgerDb;
use ledger_local_db::{FileVersionRecord, FileVersionStore, NewFileVersion};
use std::sync::Arc;
use tracing::{debug, warn};

/// Append and read file version chains.
#[derive(Debug, Clone)]
pub struct VersionedFileStore {
    db: LedgerDb,
}

impl VersionedFileStore {
    pub fn new(db: LedgerDb) -> Self {
        Self { db }
    }

    /// Record `content` as the next version of `file_path`.
    ///
    /// Version numbers are allocated under the writer lock and backed by a
    /// uniqueness constraint; a conflicting or busy attempt is rolled back and
    /// retried with a freshly read latest version. When retries run out the
    /// caller gets [`crate::Error::VersionConflict`]. An unknown project is
    /// [`crate::Error::ProjectNotFound`] and is not retried.
    ///
    /// Unchanged content still creates a new version unless `skip_unchanged`
    /// is enabled in the configuration, in which case the current latest row
    /// is returned instead.
    pub async fn append_version(
        &self,
        project_id: &str,
        file_path: &str,
        content: &str,
        created_by_tool: &str,
    ) -> crate::Result<FileVersionRecord> {
        let config = self.db.config();
        let max_attempts = config.max_append_attempts.max(1);
        let skip_unchanged = config.skip_unchanged;

        let project_id: Arc<str> = Arc::from(project_id);
        let file_path: Arc<str> = Arc::from(file_path);
        let content: Arc<str> = Arc::from(content);
        let created_by_tool: Arc<str> = Arc::from(created_by_tool);

        let mut attempt = 1;
        loop {
            let (project_id_, file_path_, content_, tool_) = (
                project_id.clone(),
                file_path.clone(),
                content.clone(),
                created_by_tool.clone(),
            );
            let result = self
                .db
                .immediate_transaction(move |conn| {
                    let store = FileVersionStore::new(conn);
                    if skip_unchanged {
                        if let Some(latest) = store.get_latest(&project_id_, &file_path_)? {
                            if latest.content == *content_ {
                                return Ok(latest);
                            }
                        }
                    }
                    store.append(&NewFileVersion {
                        project_id: &project_id_,
                        file_path: &file_path_,
                        content: &content_,
                        created_by_tool: &tool_,
                    })
                })
                .await;

            match result {
                Ok(record) => {
                    debug!(
                        "Stored {} v{} ({} bytes) for project {}",
                        record.file_path, record.version, record.size_bytes, record.project_id
                    );
                    return Ok(record);
                }
                Err(crate::Error::Database(e)) if e.is_foreign_key_violation() => {
                    return Err(crate::Error::ProjectNotFound {
                        project_id: project_id.to_string(),
                    });
                }
                Err(crate::Error::Database(e)) if e.is_retryable() => {
                    if attempt >= max_attempts {
                        return Err(crate::Error::VersionConflict {
                            project_id: project_id.to_string(),
                            file_path: file_path.to_string(),
                            attempts: attempt,
                        });
                    }
                    warn!(
                        "Version allocation for {} in project {} conflicted (attempt {}/{}): {}",
                        file_path, project_id, attempt, max_attempts, e
                    );
                    tokio::time::sleep(self.db.config().retry_backoff(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// The row with the highest version for `file_path`, if any.
    pub async fn get_latest(
        &self,
        project_id: &str,
        file_path: &str,
    ) -> crate::Result<Option<FileVersionRecord>> {
        let (project_id, file_path) = (project_id.to_string(), file_path.to_string());
        self.db
            .transaction(move |conn| FileVersionStore::new(conn).get_latest(&project_id, &file_path))
            .await
    }

    /// Exact version lookup.
    pub async fn get_version(
        &self,
        project_id: &str,
        file_path: &str,
        version: i64,
    ) -> crate::Result<Option<FileVersionRecord>> {
        let (project_id, file_path) = (project_id.to_string(), file_path.to_string());
        self.db
            .transaction(move |conn| {
                FileVersionStore::new(conn).get_version(&project_id, &file_path, version)
            })
            .await
    }

    /// Every version of `file_path`, oldest first.
    pub async fn list_versions(
        &self,
        project_id: &str,
        file_path: &str,
    ) -> crate::Result<Vec<FileVersionRecord>> {
        let (project_id, file_path) = (project_id.to_string(), file_path.to_string());
        self.db
            .transaction(move |conn| {
                FileVersionStore::new(conn).list_versions(&project_id, &file_path)
            })
            .await
    }

    /// Exactly one row per tracked path: the latest version of each.
    pub async fn list_latest_per_path(
        &self,
        project_id: &str,
    ) -> crate::Result<Vec<FileVersionRecord>> {
        let project_id = project_id.to_string();
        self.db
            .transaction(move |conn| FileVersionStore::new(conn).list_latest_per_path(&project_id))
            .await
    }
}
