//! Agent conversation session lifecycle.
//!
//! Sessions move between `active` and `paused` freely; `ended` is terminal
//! and stamped with an end time. Sessions are looked up by the identifier of
//! the external conversation run they correlate with.

use crate::db::LedgerDb;
use ledger_local_db::{now_timestamp, SessionRecord, SessionStatus, SessionStore};
use tracing::info;

/// Registry of agent sessions.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    db: LedgerDb,
}

impl SessionRegistry {
    pub fn new(db: LedgerDb) -> Self {
        Self { db }
    }

    /// Generate a new session ID.
    pub fn generate_session_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Return the session for `external_session_id`, touching `last_active`,
    /// or create a new active session under `project_id`.
    ///
    /// Without an external identifier a new session is always created.
    pub async fn get_or_create_session(
        &self,
        project_id: &str,
        external_session_id: Option<&str>,
    ) -> crate::Result<String> {
        let project_id = project_id.to_string();
        let external = external_session_id.map(str::to_string);

        let (session_id, created) = self
            .db
            .immediate_transaction(move |conn| {
                let store = SessionStore::new(conn);
                if let Some(external) = external.as_deref() {
                    if let Some(existing) = store.get_by_external_id(external)? {
                        store.touch(&existing.id)?;
                        return Ok((existing.id, false));
                    }
                }

                let now = now_timestamp();
                let record = SessionRecord {
                    id: Self::generate_session_id(),
                    project_id,
                    external_session_id: external,
                    status: SessionStatus::Active,
                    started_at: now.clone(),
                    last_active: now,
                    ended_at: None,
                };
                store.insert(&record)?;
                Ok((record.id, true))
            })
            .await?;

        if created {
            info!(
                "Created session {} (external: {})",
                session_id,
                external_session_id.unwrap_or("-")
            );
        }
        Ok(session_id)
    }

    pub async fn get_session(&self, external_session_id: &str) -> crate::Result<Option<SessionRecord>> {
        let external = external_session_id.to_string();
        self.db
            .transaction(move |conn| SessionStore::new(conn).get_by_external_id(&external))
            .await
    }

    pub async fn list_sessions(&self, project_id: &str) -> crate::Result<Vec<SessionRecord>> {
        let project_id = project_id.to_string();
        self.db
            .transaction(move |conn| SessionStore::new(conn).list_by_project(&project_id))
            .await
    }

    /// Mark the session ended. Unknown sessions are logged and ignored.
    pub async fn end_session(&self, external_session_id: &str) -> crate::Result<bool> {
        let ended = self
            .transition(external_session_id, SessionStatus::Ended)
            .await?;
        match &ended {
            Some(id) => info!("Ended session {}", id),
            None => info!("Session {} not found or already ended", external_session_id),
        }
        Ok(ended.is_some())
    }

    /// Move an active session to paused. Returns false when the session is
    /// unknown or not active.
    pub async fn pause_session(&self, external_session_id: &str) -> crate::Result<bool> {
        Ok(self
            .transition(external_session_id, SessionStatus::Paused)
            .await?
            .is_some())
    }

    /// Move a paused session back to active. Returns false when the session
    /// is unknown or not paused.
    pub async fn resume_session(&self, external_session_id: &str) -> crate::Result<bool> {
        Ok(self
            .transition(external_session_id, SessionStatus::Active)
            .await?
            .is_some())
    }

    /// Apply a status change allowed from the current status, returning the
    /// internal session id when a row was updated.
    async fn transition(
        &self,
        external_session_id: &str,
        target: SessionStatus,
    ) -> crate::Result<Option<String>> {
        let external = external_session_id.to_string();
        self.db
            .immediate_transaction(move |conn| {
                let store = SessionStore::new(conn);
                let Some(session) = store.get_by_external_id(&external)? else {
                    return Ok(None);
                };
                let allowed = match target {
                    SessionStatus::Paused => session.status == SessionStatus::Active,
                    SessionStatus::Active => session.status == SessionStatus::Paused,
                    SessionStatus::Ended => session.status != SessionStatus::Ended,
                };
                if !allowed {
                    return Ok(None);
                }

                let ended_at = match target {
                    SessionStatus::Ended => Some(now_timestamp()),
                    _ => None,
                };
                store.update_status(&session.id, target, ended_at.as_deref())?;
                Ok(Some(session.id))
            })
            .await
    }
}
