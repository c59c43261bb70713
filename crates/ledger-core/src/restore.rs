//! Rebuild a sandbox file tree from the latest stored versions.

use crate::files::VersionedFileStore;
use crate::registry::ProjectRegistry;
use crate::sandbox::SandboxWriter;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Replays a project's latest file versions into a sandbox.
#[derive(Debug, Clone)]
pub struct RestoreService {
    files: VersionedFileStore,
    projects: ProjectRegistry,
}

impl RestoreService {
    pub fn new(files: VersionedFileStore, projects: ProjectRegistry) -> Self {
        Self { files, projects }
    }

    /// Write the latest version of every tracked path through `writer`.
    ///
    /// Returns `{path: version}` for the files that were written. A failing
    /// file is logged and skipped; the rest of the restore continues. Only a
    /// failure to read the version list itself is returned as an error.
    pub async fn restore_project(
        &self,
        project_id: &str,
        writer: &dyn SandboxWriter,
    ) -> crate::Result<BTreeMap<String, i64>> {
        let latest = self.files.list_latest_per_path(project_id).await?;
        let total = latest.len();

        let mut restored = BTreeMap::new();
        for file in latest {
            match writer.write(&file.file_path, &file.content).await {
                Ok(()) => {
                    info!("Restored {} (v{})", file.file_path, file.version);
                    restored.insert(file.file_path, file.version);
                }
                Err(e) => error!("Failed to restore {}: {}", file.file_path, e),
            }
        }

        if let Err(e) = self.projects.touch_project(project_id).await {
            warn!("Could not stamp last access for project {}: {}", project_id, e);
        }
        info!(
            "Restored {}/{} files for project {}",
            restored.len(),
            total,
            project_id
        );
        Ok(restored)
    }
}
