use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::{
    error::Result,
    mapping::MappingState,
    ports::RepoConfigStore,
    repo::{ConnectRepoRequest, RepositoryConfig},
    value_objects::{ProjectId, RepoId},
};

/// Repository-configuration management: connect a project to a git remote,
/// list its configuration, and disconnect (which drops the mapping blob
/// with the row).
pub struct RepoConfigService {
    store: Arc<dyn RepoConfigStore>,
}

impl RepoConfigService {
    pub fn new(store: Arc<dyn RepoConfigStore>) -> Self {
        Self { store }
    }

    /// Upsert the single config for the request's project. A reconnect
    /// starts from an empty mapping; the first pull rebuilds it.
    #[instrument(skip(self, request), fields(project = %request.project_id))]
    pub async fn connect(&self, request: ConnectRepoRequest) -> Result<RepositoryConfig> {
        let config = RepositoryConfig {
            id: RepoId(Uuid::new_v4().to_string()),
            project_id: request.project_id,
            remote_url: request.remote_url,
            branch: request.branch,
            ssh_private_key: request.ssh_private_key,
            slug: request.slug,
            mapping: MappingState::new(),
        };
        let stored = self.store.upsert(config).await?;
        info!(repo = %stored.id, "connected project to repository");
        Ok(stored)
    }

    pub async fn list(&self, project_id: &ProjectId) -> Result<Vec<RepositoryConfig>> {
        self.store.list_for_project(project_id).await
    }

    #[instrument(skip(self))]
    pub async fn disconnect(&self, id: &RepoId) -> Result<()> {
        self.store.delete(id).await?;
        info!(repo = %id, "disconnected repository");
        Ok(())
    }
}
