//! Database migration management.

use rusqlite::{params, Connection};
use tracing::info;

/// Database migration manager.
pub struct MigrationManager;

impl MigrationManager {
    /// Apply all pending migrations to the database.
    pub fn migrate(conn: &Connection) -> crate::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        let current_version = Self::current_version(conn)?.unwrap_or(0);
        if current_version > crate::SCHEMA_VERSION {
            return Err(crate::Error::migration(format!(
                "database schema version {} is newer than supported version {}",
                current_version,
                crate::SCHEMA_VERSION
            )));
        }

        if current_version < 1 {
            Self::apply_migration_1(conn)?;
            info!("Applied ledger schema migration 1");
        }

        Ok(())
    }

    /// Apply migration version 1 - tenants, projects, sessions, file versions
    /// and project snapshots.
    fn apply_migration_1(conn: &Connection) -> crate::Result<()> {
        conn.execute_batch(
            r#"
            -- Owner identities; a tenant owns zero or more projects
            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                contact TEXT NOT NULL UNIQUE,
                handle TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Projects carry the sandbox lifecycle (identifier + state move together)
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT,
                active_sandbox_id TEXT,
                sandbox_state TEXT NOT NULL DEFAULT 'none',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_accessed TEXT
            );

            -- Agent conversation runs correlated by an external session identifier
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                external_session_id TEXT UNIQUE,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                last_active TEXT NOT NULL,
                ended_at TEXT
            );

            -- Append-only version chains keyed by (project_id, file_path)
            CREATE TABLE IF NOT EXISTS file_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                file_path TEXT NOT NULL,
                content TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                version INTEGER NOT NULL CHECK (version >= 1),
                diff_from_previous TEXT,
                created_by_tool TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(project_id, file_path, version)
            );

            -- Whole-environment captures beyond individual files
            CREATE TABLE IF NOT EXISTS project_snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                snapshot_data TEXT NOT NULL,
                sandbox_id TEXT,
                snapshot_type TEXT NOT NULL DEFAULT 'manual',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_projects_tenant ON projects(tenant_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_id);
            CREATE INDEX IF NOT EXISTS idx_file_versions_created ON file_versions(created_at);
            CREATE INDEX IF NOT EXISTS idx_project_snapshots_project_ts
                ON project_snapshots(project_id, created_at);

            INSERT OR REPLACE INTO schema_migrations (version) VALUES (1);
            "#,
        )?;

        Ok(())
    }

    /// Get the current schema version.
    pub fn current_version(conn: &Connection) -> crate::Result<Option<u32>> {
        let sql = format!("SELECT MAX(version) FROM {}", crate::TABLE_SCHEMA_MIGRATIONS);
        let mut stmt = conn.prepare(&sql)?;

        let version: Option<u32> = stmt.query_row(params![], |row| row.get(0))?;

        Ok(version)
    }
}
