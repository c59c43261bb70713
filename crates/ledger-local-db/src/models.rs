//! Database models and persistence operations.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef};
use rusqlite::{params, OptionalExtension, Row, ToSql};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current time in the format stored in every timestamp column.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Lifecycle state of a project's external execution sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SandboxState {
    /// No sandbox has been attached yet.
    #[default]
    None,
    /// A sandbox is running.
    Running,
    /// The sandbox is paused and may be resumed.
    Paused,
    /// The sandbox was terminated.
    Killed,
}

impl SandboxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxState::None => "none",
            SandboxState::Running => "running",
            SandboxState::Paused => "paused",
            SandboxState::Killed => "killed",
        }
    }
}

impl fmt::Display for SandboxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SandboxState {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SandboxState::None),
            "running" => Ok(SandboxState::Running),
            "paused" => Ok(SandboxState::Paused),
            "killed" => Ok(SandboxState::Killed),
            other => Err(crate::Error::decode(format!("Unknown sandbox state: {}", other))),
        }
    }
}

/// Status of an agent conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    /// Terminal.
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "paused" => Ok(SessionStatus::Paused),
            "ended" => Ok(SessionStatus::Ended),
            other => Err(crate::Error::decode(format!("Unknown session status: {}", other))),
        }
    }
}

macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: crate::Error| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum_sql!(SandboxState);
text_enum_sql!(SessionStatus);

/// Database model for tenants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: String,
    pub contact: String,
    pub handle: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TenantRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            contact: row.get(1)?,
            handle: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

/// Database model for projects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub active_sandbox_id: Option<String>,
    pub sandbox_state: SandboxState,
    pub created_at: String,
    pub updated_at: String,
    pub last_accessed: Option<String>,
}

impl ProjectRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            active_sandbox_id: row.get(4)?,
            sandbox_state: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            last_accessed: row.get(8)?,
        })
    }
}

/// Database model for agent sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub project_id: String,
    pub external_session_id: Option<String>,
    pub status: SessionStatus,
    pub started_at: String,
    pub last_active: String,
    pub ended_at: Option<String>,
}

impl SessionRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            external_session_id: row.get(2)?,
            status: row.get(3)?,
            started_at: row.get(4)?,
            last_active: row.get(5)?,
            ended_at: row.get(6)?,
        })
    }
}

/// One immutable entry of a `(project_id, file_path)` version chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersionRecord {
    pub id: i64,
    pub project_id: String,
    pub file_path: String,
    /// Full content at this version, never a partial write.
    pub content: String,
    /// UTF-8 byte length of `content`.
    pub size_bytes: i64,
    pub version: i64,
    /// Unified diff from the previous version; `None` for version 1.
    pub diff_from_previous: Option<String>,
    pub created_by_tool: String,
    pub created_at: String,
}

impl FileVersionRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            file_path: row.get(2)?,
            content: row.get(3)?,
            size_bytes: row.get(4)?,
            version: row.get(5)?,
            diff_from_previous: row.get(6)?,
            created_by_tool: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

/// Input for appending to a version chain.
#[derive(Debug, Clone, Copy)]
pub struct NewFileVersion<'a> {
    pub project_id: &'a str,
    pub file_path: &'a str,
    pub content: &'a str,
    pub created_by_tool: &'a str,
}

/// Database model for project snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: i64,
    pub project_id: String,
    pub snapshot_data: serde_json::Value,
    pub sandbox_id: Option<String>,
    pub snapshot_type: String,
    pub created_at: String,
}

impl SnapshotRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let raw: String = row.get(2)?;
        let snapshot_data = serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
        Ok(Self {
            id: row.get(0)?,
            project_id: row.get(1)?,
            snapshot_data,
            sandbox_id: row.get(3)?,
            snapshot_type: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

/// Database operations for tenants.
pub struct TenantStore<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> TenantStore<'a> {
    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, id: &str) -> crate::Result<Option<TenantRecord>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT id, contact, handle, created_at, updated_at
                FROM tenants WHERE id = ?
                "#,
                params![id],
                TenantRecord::from_row,
            )
            .optional()?)
    }

    /// Return the tenant with `id`, inserting it with the given contact and
    /// handle if absent. An existing row is returned unchanged.
    ///
    /// A concurrent creator of the same id is absorbed by `ON CONFLICT(id)`;
    /// a different tenant already using `contact` or `handle` is an error.
    pub fn get_or_create(&self, id: &str, contact: &str, handle: &str) -> crate::Result<TenantRecord> {
        if let Some(existing) = self.get(id)? {
            return Ok(existing);
        }

        let now = now_timestamp();
        self.conn.execute(
            r#"
            INSERT INTO tenants (id, contact, handle, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
            params![id, contact, handle, now, now],
        )?;

        self.get(id)?
            .ok_or_else(|| crate::Error::generic(format!("Tenant {} vanished after insert", id)))
    }

    /// Delete a tenant and, by cascade, everything it owns.
    pub fn delete(&self, id: &str) -> crate::Result<bool> {
        let affected = self.conn.execute("DELETE FROM tenants WHERE id = ?", params![id])?;
        Ok(affected > 0)
    }
}

/// Database operations for projects.
pub struct ProjectStore<'a> {
    conn: &'a rusqlite::Connection,
}

const PROJECT_COLUMNS: &str = "id, tenant_id, name, description, active_sandbox_id, sandbox_state, created_at, updated_at, last_accessed";

impl<'a> ProjectStore<'a> {
    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, id: &str) -> crate::Result<Option<ProjectRecord>> {
        let sql = format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], ProjectRecord::from_row)
            .optional()?)
    }

    /// Return the project with `id`, creating it under `tenant_id` with `name`
    /// if absent. An existing project keeps its name and owner.
    pub fn get_or_create(&self, tenant_id: &str, id: &str, name: &str) -> crate::Result<ProjectRecord> {
        if let Some(existing) = self.get(id)? {
            return Ok(existing);
        }

        let now = now_timestamp();
        self.conn.execute(
            r#"
            INSERT INTO projects (id, tenant_id, name, sandbox_state, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
            params![id, tenant_id, name, SandboxState::None, now, now],
        )?;

        self.get(id)?
            .ok_or_else(|| crate::Error::generic(format!("Project {} vanished after insert", id)))
    }

    pub fn list_by_tenant(&self, tenant_id: &str) -> crate::Result<Vec<ProjectRecord>> {
        let sql = format!(
            "SELECT {} FROM projects WHERE tenant_id = ? ORDER BY created_at ASC, id ASC",
            PROJECT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt.query_map(params![tenant_id], ProjectRecord::from_row)?;

        let mut projects = Vec::new();
        for record in records {
            projects.push(record?);
        }
        Ok(projects)
    }

    /// Overwrite the sandbox identifier and state in one statement.
    ///
    /// Returns false when the project does not exist.
    pub fn update_sandbox_state(
        &self,
        id: &str,
        sandbox_id: Option<&str>,
        state: SandboxState,
    ) -> crate::Result<bool> {
        let affected = self.conn.execute(
            r#"
            UPDATE projects
            SET active_sandbox_id = ?, sandbox_state = ?, updated_at = ?
            WHERE id = ?
            "#,
            params![sandbox_id, state, now_timestamp(), id],
        )?;
        Ok(affected > 0)
    }

    pub fn touch(&self, id: &str) -> crate::Result<bool> {
        let affected = self.conn.execute(
            "UPDATE projects SET last_accessed = ? WHERE id = ?",
            params![now_timestamp(), id],
        )?;
        Ok(affected > 0)
    }

    /// Delete a project and, by cascade, its sessions, versions and snapshots.
    pub fn delete(&self, id: &str) -> crate::Result<bool> {
        let affected = self.conn.execute("DELETE FROM projects WHERE id = ?", params![id])?;
        Ok(affected > 0)
    }
}

/// Database operations for sessions.
pub struct SessionStore<'a> {
    conn: &'a rusqlite::Connection,
}

const SESSION_COLUMNS: &str =
    "id, project_id, external_session_id, status, started_at, last_active, ended_at";

impl<'a> SessionStore<'a> {
    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn insert(&self, record: &SessionRecord) -> crate::Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO sessions (id, project_id, external_session_id, status, started_at, last_active, ended_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.id,
                record.project_id,
                record.external_session_id,
                record.status,
                record.started_at,
                record.last_active,
                record.ended_at
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> crate::Result<Option<SessionRecord>> {
        let sql = format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], SessionRecord::from_row)
            .optional()?)
    }

    pub fn get_by_external_id(&self, external_id: &str) -> crate::Result<Option<SessionRecord>> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE external_session_id = ?",
            SESSION_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![external_id], SessionRecord::from_row)
            .optional()?)
    }

    pub fn list_by_project(&self, project_id: &str) -> crate::Result<Vec<SessionRecord>> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE project_id = ? ORDER BY started_at ASC, id ASC",
            SESSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt.query_map(params![project_id], SessionRecord::from_row)?;

        let mut sessions = Vec::new();
        for record in records {
            sessions.push(record?);
        }
        Ok(sessions)
    }

    /// Stamp `last_active` with the current time.
    pub fn touch(&self, id: &str) -> crate::Result<()> {
        self.conn.execute(
            "UPDATE sessions SET last_active = ? WHERE id = ?",
            params![now_timestamp(), id],
        )?;
        Ok(())
    }

    pub fn update_status(
        &self,
        id: &str,
        status: SessionStatus,
        ended_at: Option<&str>,
    ) -> crate::Result<()> {
        self.conn.execute(
            r#"
            UPDATE sessions
            SET status = ?, ended_at = ?, last_active = ?
            WHERE id = ?
            "#,
            params![status, ended_at, now_timestamp(), id],
        )?;
        Ok(())
    }
}

/// Database operations for file version chains.
pub struct FileVersionStore<'a> {
    conn: &'a rusqlite::Connection,
}

const FILE_VERSION_COLUMNS: &str = "id, project_id, file_path, content, size_bytes, version, diff_from_previous, created_by_tool, created_at";

impl<'a> FileVersionStore<'a> {
    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Highest version recorded for a path, 0 when the chain is empty.
    pub fn max_version(&self, project_id: &str, file_path: &str) -> crate::Result<i64> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(version) FROM file_versions WHERE project_id = ? AND file_path = ?",
            params![project_id, file_path],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    pub fn get_version(
        &self,
        project_id: &str,
        file_path: &str,
        version: i64,
    ) -> crate::Result<Option<FileVersionRecord>> {
        let sql = format!(
            "SELECT {} FROM file_versions WHERE project_id = ? AND file_path = ? AND version = ?",
            FILE_VERSION_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![project_id, file_path, version], FileVersionRecord::from_row)
            .optional()?)
    }

    pub fn get_latest(
        &self,
        project_id: &str,
        file_path: &str,
    ) -> crate::Result<Option<FileVersionRecord>> {
        let sql = format!(
            r#"
            SELECT {} FROM file_versions
            WHERE project_id = ? AND file_path = ?
            ORDER BY version DESC
            LIMIT 1
            "#,
            FILE_VERSION_COLUMNS
        );
        Ok(self
            .conn
            .query_row(&sql, params![project_id, file_path], FileVersionRecord::from_row)
            .optional()?)
    }

    /// The whole chain for one path, oldest first.
    pub fn list_versions(
        &self,
        project_id: &str,
        file_path: &str,
    ) -> crate::Result<Vec<FileVersionRecord>> {
        let sql = format!(
            r#"
            SELECT {} FROM file_versions
            WHERE project_id = ? AND file_path = ?
            ORDER BY version ASC
            "#,
            FILE_VERSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt.query_map(params![project_id, file_path], FileVersionRecord::from_row)?;

        let mut versions = Vec::new();
        for record in records {
            versions.push(record?);
        }
        Ok(versions)
    }

    /// One row per tracked path: the row at that path's maximum version.
    pub fn list_latest_per_path(&self, project_id: &str) -> crate::Result<Vec<FileVersionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT fv.id, fv.project_id, fv.file_path, fv.content, fv.size_bytes, fv.version,
                   fv.diff_from_previous, fv.created_by_tool, fv.created_at
            FROM file_versions fv
            JOIN (
                SELECT file_path, MAX(version) AS max_version
                FROM file_versions
                WHERE project_id = ?1
                GROUP BY file_path
            ) latest
              ON fv.file_path = latest.file_path AND fv.version = latest.max_version
            WHERE fv.project_id = ?1
            ORDER BY fv.file_path ASC
            "#,
        )?;
        let records = stmt.query_map(params![project_id], FileVersionRecord::from_row)?;

        let mut latest = Vec::new();
        for record in records {
            latest.push(record?);
        }
        Ok(latest)
    }

    /// Append the next version of a path.
    ///
    /// Reads the current latest row, diffs its content against the new
    /// content and inserts `latest + 1`. Must run inside a transaction that
    /// holds the writer lock; a conflicting concurrent append surfaces as a
    /// constraint violation on `(project_id, file_path, version)`.
    pub fn append(&self, new: &NewFileVersion<'_>) -> crate::Result<FileVersionRecord> {
        let prior = self.get_latest(new.project_id, new.file_path)?;

        let (version, diff_from_previous) = match &prior {
            Some(prev) => (
                prev.version + 1,
                Some(crate::diff::unified_diff(
                    new.file_path,
                    prev.version,
                    &prev.content,
                    new.content,
                )),
            ),
            None => (1, None),
        };

        let record = FileVersionRecord {
            id: 0, // Will be set by autoincrement
            project_id: new.project_id.to_string(),
            file_path: new.file_path.to_string(),
            content: new.content.to_string(),
            size_bytes: new.content.len() as i64,
            version,
            diff_from_previous,
            created_by_tool: new.created_by_tool.to_string(),
            created_at: now_timestamp(),
        };

        self.conn.execute(
            r#"
            INSERT INTO file_versions (project_id, file_path, content, size_bytes, version, diff_from_previous, created_by_tool, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.project_id,
                record.file_path,
                record.content,
                record.size_bytes,
                record.version,
                record.diff_from_previous,
                record.created_by_tool,
                record.created_at
            ],
        )?;

        Ok(FileVersionRecord {
            id: self.conn.last_insert_rowid(),
            ..record
        })
    }
}

/// Database operations for project snapshots.
pub struct SnapshotStore<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> SnapshotStore<'a> {
    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn insert(
        &self,
        project_id: &str,
        snapshot_data: &serde_json::Value,
        sandbox_id: Option<&str>,
        snapshot_type: &str,
    ) -> crate::Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO project_snapshots (project_id, snapshot_data, sandbox_id, snapshot_type, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![
                project_id,
                serde_json::to_string(snapshot_data)?,
                sandbox_id,
                snapshot_type,
                now_timestamp()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_by_project(&self, project_id: &str) -> crate::Result<Vec<SnapshotRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, project_id, snapshot_data, sandbox_id, snapshot_type, created_at
            FROM project_snapshots
            WHERE project_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )?;

        let records = stmt.query_map(params![project_id], SnapshotRecord::from_row)?;

        let mut snapshots = Vec::new();
        for record in records {
            snapshots.push(record?);
        }
        Ok(snapshots)
    }
}
