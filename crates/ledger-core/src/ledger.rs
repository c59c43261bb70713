//! The ledger surface exposed to the agent tooling layer.

use crate::bootstrap::TenantBootstrap;
use crate::config::LedgerConfig;
use crate::db::LedgerDb;
use crate::files::VersionedFileStore;
use crate::registry::ProjectRegistry;
use crate::restore::RestoreService;
use crate::sandbox::SandboxWriter;
use crate::session::SessionRegistry;
use crate::tracker::WriteThroughTracker;
use ledger_local_db::SandboxState;
use std::collections::BTreeMap;

/// All ledger components wired to one store handle.
///
/// Every entry point tolerates tenant and project identifiers that do not
/// exist yet; they are created on demand.
#[derive(Debug, Clone)]
pub struct Ledger {
    db: LedgerDb,
    files: VersionedFileStore,
    projects: ProjectRegistry,
    sessions: SessionRegistry,
    bootstrap: TenantBootstrap,
    tracker: WriteThroughTracker,
    restore: RestoreService,
}

impl Ledger {
    pub fn new(db: LedgerDb) -> Self {
        let files = VersionedFileStore::new(db.clone());
        let projects = ProjectRegistry::new(db.clone());
        let sessions = SessionRegistry::new(db.clone());
        let bootstrap = TenantBootstrap::new(projects.clone());
        let tracker = WriteThroughTracker::new(bootstrap.clone(), files.clone(), projects.clone());
        let restore = RestoreService::new(files.clone(), projects.clone());
        Self {
            db,
            files,
            projects,
            sessions,
            bootstrap,
            tracker,
            restore,
        }
    }

    /// Open the database described by `config` and wire the components.
    pub fn open(config: LedgerConfig) -> crate::Result<Self> {
        Ok(Self::new(LedgerDb::open(config)?))
    }

    pub fn files(&self) -> &VersionedFileStore {
        &self.files
    }

    pub fn projects(&self) -> &ProjectRegistry {
        &self.projects
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn bootstrap(&self) -> &TenantBootstrap {
        &self.bootstrap
    }

    pub fn tracker(&self) -> &WriteThroughTracker {
        &self.tracker
    }

    pub fn restorer(&self) -> &RestoreService {
        &self.restore
    }

    pub async fn on_file_written(
        &self,
        tenant_id: &str,
        project_id: &str,
        path: &str,
        content: &str,
        tool_name: &str,
    ) -> bool {
        self.tracker
            .on_file_written(tenant_id, project_id, path, content, tool_name)
            .await
    }

    pub async fn on_sandbox_state_changed(
        &self,
        project_id: &str,
        sandbox_id: Option<&str>,
        state: SandboxState,
    ) -> bool {
        self.tracker
            .on_sandbox_state_changed(project_id, sandbox_id, state)
            .await
    }

    /// Ensure the tenant and project, then get or create the session.
    pub async fn get_or_create_session(
        &self,
        tenant_id: &str,
        project_id: &str,
        external_session_id: Option<&str>,
    ) -> crate::Result<String> {
        self.bootstrap.ensure(tenant_id, project_id).await?;
        self.sessions
            .get_or_create_session(project_id, external_session_id)
            .await
    }

    pub async fn end_session(&self, external_session_id: &str) -> crate::Result<bool> {
        self.sessions.end_session(external_session_id).await
    }

    pub async fn restore_project(
        &self,
        project_id: &str,
        writer: &dyn SandboxWriter,
    ) -> crate::Result<BTreeMap<String, i64>> {
        self.restore.restore_project(project_id, writer).await
    }

    /// Drop every component and close the store handle.
    pub fn close(self) -> crate::Result<()> {
        let Self {
            db,
            files,
            projects,
            sessions,
            bootstrap,
            tracker,
            restore,
        } = self;
        drop((files, projects, sessions, bootstrap, tracker, restore));
        db.close()
    }
}
