//! Lazy creation of tenants and projects on first reference.

use crate::registry::ProjectRegistry;
use ledger_local_db::ProjectRecord;
use tracing::{info, warn};

/// Idempotent "ensure tenant and project exist" entry point used by every
/// write path into the store.
///
/// When both rows already exist this costs two primary-key lookups. Racing
/// callers converge on the same rows: inserts are `ON CONFLICT DO NOTHING`
/// followed by a read.
#[derive(Debug, Clone)]
pub struct TenantBootstrap {
    registry: ProjectRegistry,
}

impl TenantBootstrap {
    pub fn new(registry: ProjectRegistry) -> Self {
        Self { registry }
    }

    pub async fn ensure(&self, tenant_id: &str, project_id: &str) -> crate::Result<ProjectRecord> {
        let config = self.registry.config();

        if self.registry.get_tenant(tenant_id).await?.is_none() {
            let contact = config.default_contact(tenant_id);
            self.registry
                .get_or_create_tenant(tenant_id, &contact, tenant_id)
                .await?;
            info!("Created tenant: {}", tenant_id);
        }

        let name = config.default_project_name(project_id);
        let project = self
            .registry
            .get_or_create_project(tenant_id, project_id, &name)
            .await?;
        if project.tenant_id != tenant_id {
            warn!(
                "Project {} belongs to tenant {}, not {}",
                project_id, project.tenant_id, tenant_id
            );
        }
        Ok(project)
    }
}
