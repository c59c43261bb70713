//! Write-through tracking of sandbox file writes.
//!
//! The live sandbox is authoritative for whether a file was written. The
//! ledger is a best-effort trail on top of it: tracking failures are logged
//! and reported as `false`, never turned into a failed write.

use crate::bootstrap::TenantBootstrap;
use crate::files::VersionedFileStore;
use crate::registry::ProjectRegistry;
use crate::sandbox::SandboxWriter;
use async_trait::async_trait;
use ledger_local_db::SandboxState;
use tracing::{debug, error};

/// Mirrors completed sandbox writes into the versioned file store.
#[derive(Debug, Clone)]
pub struct WriteThroughTracker {
    bootstrap: TenantBootstrap,
    files: VersionedFileStore,
    projects: ProjectRegistry,
}

impl WriteThroughTracker {
    pub fn new(
        bootstrap: TenantBootstrap,
        files: VersionedFileStore,
        projects: ProjectRegistry,
    ) -> Self {
        Self {
            bootstrap,
            files,
            projects,
        }
    }

    /// Record a write that already succeeded in the sandbox.
    ///
    /// Returns whether the version was stored. Errors are logged, not raised.
    pub async fn on_file_written(
        &self,
        tenant_id: &str,
        project_id: &str,
        path: &str,
        content: &str,
        tool_name: &str,
    ) -> bool {
        match self
            .track(tenant_id, project_id, path, content, tool_name)
            .await
        {
            Ok(version) => {
                debug!("Tracked file: {} v{} (project: {})", path, version, project_id);
                true
            }
            Err(e) => {
                error!(
                    "Failed to track file write {} (project: {}): {}",
                    path, project_id, e
                );
                false
            }
        }
    }

    async fn track(
        &self,
        tenant_id: &str,
        project_id: &str,
        path: &str,
        content: &str,
        tool_name: &str,
    ) -> crate::Result<i64> {
        self.bootstrap.ensure(tenant_id, project_id).await?;
        let record = self
            .files
            .append_version(project_id, path, content, tool_name)
            .await?;
        Ok(record.version)
    }

    /// Forward a sandbox lifecycle change to the project registry.
    ///
    /// Returns whether a project row was updated. Errors are logged, not
    /// raised; an unknown project is a silent miss.
    pub async fn on_sandbox_state_changed(
        &self,
        project_id: &str,
        sandbox_id: Option<&str>,
        state: SandboxState,
    ) -> bool {
        match self
            .projects
            .update_sandbox_state(project_id, sandbox_id, state)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                error!(
                    "Failed to update sandbox state for project {}: {}",
                    project_id, e
                );
                false
            }
        }
    }
}

/// A [`SandboxWriter`] that records every successful write through a
/// [`WriteThroughTracker`].
///
/// The inner write decides the outcome; tracking runs only after it succeeds
/// and cannot fail the call.
pub struct TrackedWriter<W> {
    inner: W,
    tracker: WriteThroughTracker,
    tenant_id: String,
    project_id: String,
    tool_name: String,
}

impl<W: SandboxWriter> TrackedWriter<W> {
    pub fn new(
        inner: W,
        tracker: WriteThroughTracker,
        tenant_id: impl Into<String>,
        project_id: impl Into<String>,
        tool_name: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            tracker,
            tenant_id: tenant_id.into(),
            project_id: project_id.into(),
            tool_name: tool_name.into(),
        }
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }
}

#[async_trait]
impl<W: SandboxWriter> SandboxWriter for TrackedWriter<W> {
    async fn write(&self, path: &str, content: &str) -> crate::Result<()> {
        self.inner.write(path, content).await?;
        self.tracker
            .on_file_written(
                &self.tenant_id,
                &self.project_id,
                path,
                content,
                &self.tool_name,
            )
            .await;
        Ok(())
    }
}
