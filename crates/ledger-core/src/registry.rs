//! Tenant and project identity, sandbox lifecycle state and snapshots.

use crate::config::LedgerConfig;
use crate::db::LedgerDb;
use ledger_local_db::{
    ProjectRecord, ProjectStore, SandboxState, SnapshotRecord, SnapshotStore, TenantRecord,
    TenantStore,
};
use tracing::{debug, info};

/// Registry of tenants and their projects.
///
/// Every mutation reads and writes under the writer lock, so handles on the
/// same database file wait on each other instead of failing on a stale read.
#[derive(Debug, Clone)]
pub struct ProjectRegistry {
    db: LedgerDb,
}

impl ProjectRegistry {
    pub fn new(db: LedgerDb) -> Self {
        Self { db }
    }

    pub fn config(&self) -> &LedgerConfig {
        self.db.config()
    }

    pub async fn get_tenant(&self, id: &str) -> crate::Result<Option<TenantRecord>> {
        let id = id.to_string();
        self.db.transaction(move |conn| TenantStore::new(conn).get(&id)).await
    }

    /// Return the tenant, inserting it with `contact` and `handle` if absent.
    pub async fn get_or_create_tenant(
        &self,
        id: &str,
        contact: &str,
        handle: &str,
    ) -> crate::Result<TenantRecord> {
        let (id, contact, handle) = (id.to_string(), contact.to_string(), handle.to_string());
        self.db
            .immediate_transaction(move |conn| {
                TenantStore::new(conn).get_or_create(&id, &contact, &handle)
            })
            .await
    }

    pub async fn get_project(&self, id: &str) -> crate::Result<Option<ProjectRecord>> {
        let id = id.to_string();
        self.db.transaction(move |conn| ProjectStore::new(conn).get(&id)).await
    }

    /// Return the project, creating it under `tenant_id` if absent.
    ///
    /// Idempotent by `project_id`: a second call with a different `name`
    /// returns the existing row unchanged.
    pub async fn get_or_create_project(
        &self,
        tenant_id: &str,
        project_id: &str,
        name: &str,
    ) -> crate::Result<ProjectRecord> {
        let (tenant_id, project_id, name) =
            (tenant_id.to_string(), project_id.to_string(), name.to_string());
        self.db
            .immediate_transaction(move |conn| {
                ProjectStore::new(conn).get_or_create(&tenant_id, &project_id, &name)
            })
            .await
    }

    pub async fn list_projects(&self, tenant_id: &str) -> crate::Result<Vec<ProjectRecord>> {
        let tenant_id = tenant_id.to_string();
        self.db
            .transaction(move |conn| ProjectStore::new(conn).list_by_tenant(&tenant_id))
            .await
    }

    /// Set the project's sandbox identifier and state together.
    ///
    /// This is the only writer of those two fields. A missing project is a
    /// silent miss and yields `Ok(false)`.
    pub async fn update_sandbox_state(
        &self,
        project_id: &str,
        sandbox_id: Option<&str>,
        state: SandboxState,
    ) -> crate::Result<bool> {
        let project = project_id.to_string();
        let sandbox_id = sandbox_id.map(str::to_string);
        let updated = self
            .db
            .immediate_transaction(move |conn| {
                ProjectStore::new(conn).update_sandbox_state(&project, sandbox_id.as_deref(), state)
            })
            .await?;

        if updated {
            debug!("Project {} sandbox state is now {}", project_id, state);
        } else {
            debug!("Sandbox state update for unknown project {} ignored", project_id);
        }
        Ok(updated)
    }

    /// Stamp the project's `last_accessed` time.
    pub async fn touch_project(&self, project_id: &str) -> crate::Result<bool> {
        let project_id = project_id.to_string();
        self.db
            .immediate_transaction(move |conn| ProjectStore::new(conn).touch(&project_id))
            .await
    }

    /// Delete a tenant together with its projects and everything they own.
    pub async fn delete_tenant(&self, id: &str) -> crate::Result<bool> {
        let tenant = id.to_string();
        let deleted = self
            .db
            .immediate_transaction(move |conn| TenantStore::new(conn).delete(&tenant))
            .await?;
        if deleted {
            info!("Deleted tenant {}", id);
        }
        Ok(deleted)
    }

    /// Delete a project together with its sessions, versions and snapshots.
    pub async fn delete_project(&self, id: &str) -> crate::Result<bool> {
        let project = id.to_string();
        let deleted = self
            .db
            .immediate_transaction(move |conn| ProjectStore::new(conn).delete(&project))
            .await?;
        if deleted {
            info!("Deleted project {}", id);
        }
        Ok(deleted)
    }

    /// Record an opaque whole-environment snapshot for a project.
    pub async fn record_snapshot(
        &self,
        project_id: &str,
        snapshot_data: serde_json::Value,
        sandbox_id: Option<&str>,
        snapshot_type: &str,
    ) -> crate::Result<i64> {
        let (project_id, sandbox_id, snapshot_type) = (
            project_id.to_string(),
            sandbox_id.map(str::to_string),
            snapshot_type.to_string(),
        );
        self.db
            .immediate_transaction(move |conn| {
                SnapshotStore::new(conn).insert(
                    &project_id,
                    &snapshot_data,
                    sandbox_id.as_deref(),
                    &snapshot_type,
                )
            })
            .await
    }

    pub async fn list_snapshots(&self, project_id: &str) -> crate::Result<Vec<SnapshotRecord>> {
        let project_id = project_id.to_string();
        self.db
            .transaction(move |conn| SnapshotStore::new(conn).list_by_project(&project_id))
            .await
    }
}
