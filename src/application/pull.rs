use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::application::locks::ProjectLocks;
use crate::domain::{
    error::Result,
    fingerprint::fingerprint,
    flow::{DbFlow, FlowStatus},
    plan::{ProjectSyncError, PullReport, SyncOperation, SyncPlan},
    ports::{FlowRecordRepository, Planner, RepoConfigStore, SyncWorkspace},
    repo::RepositoryConfig,
    value_objects::RepoId,
};

// ─── Pull Service ────────────────────────────────────────────────────────────

/// Pull orchestrator: git is the source of truth, the database converges.
///
/// One pull walks a fixed sequence — prepare workspace, read both
/// snapshots, clean the mapping, plan, then (unless `dry_run`) apply each
/// operation in plan order, persist the mapping, and republish every
/// enabled flow that was created or updated. A dry-run halts after
/// planning and touches nothing.
pub struct PullService {
    repos: Arc<dyn RepoConfigStore>,
    flows: Arc<dyn FlowRecordRepository>,
    workspace: Arc<dyn SyncWorkspace>,
    planner: Arc<dyn Planner>,
    locks: ProjectLocks,
}

impl PullService {
    pub fn new(
        repos: Arc<dyn RepoConfigStore>,
        flows: Arc<dyn FlowRecordRepository>,
        workspace: Arc<dyn SyncWorkspace>,
        planner: Arc<dyn Planner>,
        locks: ProjectLocks,
    ) -> Self {
        Self {
            repos,
            flows,
            workspace,
            planner,
            locks,
        }
    }

    #[instrument(skip(self), fields(repo = %repo_id, dry_run))]
    pub async fn pull(&self, repo_id: &RepoId, dry_run: bool) -> Result<PullReport> {
        let config = self.repos.get(repo_id).await?;

        // Serialize all sync work per project: the workspace directory and
        // the mapping blob are shared resources.
        let lock = self.locks.for_project(&config.project_id);
        let _guard = lock.lock().await;

        let result = self.execute(repo_id, &config, dry_run).await;
        if let Err(err) = self.workspace.cleanup(&config).await {
            warn!(%err, "workspace cleanup failed");
        }
        result
    }

    async fn execute(
        &self,
        repo_id: &RepoId,
        config: &RepositoryConfig,
        dry_run: bool,
    ) -> Result<PullReport> {
        self.workspace.prepare(config).await?;
        let git_flows = self.workspace.read_flows(config).await?;
        let db_flows = self.flows.list_for_project(&config.project_id).await?;

        // Stale entries corrupt the diff, so prune before planning.
        let mapping = config
            .mapping
            .clone()
            .clean(&git_flows, &db_flows);

        let operations = self.planner.plan(&git_flows, &db_flows, &mapping);
        let plan = SyncPlan::new(
            operations,
            fingerprint(git_flows.iter().map(|f| &f.definition)),
            fingerprint(db_flows.iter().map(|f| &f.definition)),
        );
        info!(
            deletes = plan.summary.deletes,
            creates = plan.summary.creates,
            updates = plan.summary.updates,
            "computed sync plan"
        );

        if dry_run {
            return Ok(PullReport {
                plan,
                dry_run: true,
                errors: Vec::new(),
            });
        }

        // Apply in plan order. The pruned table is persisted up front and
        // again after every applied operation, so a failure mid-pass (or a
        // crash) never forgets a create that already reached the database;
        // the retry then plans only the remaining operations.
        self.repos.save_mapping(repo_id, &mapping).await?;
        let mut mapping = mapping;
        let mut republish: Vec<DbFlow> = Vec::new();
        for op in &plan.operations {
            match op {
                SyncOperation::Delete { target_flow } => {
                    self.flows.delete(&target_flow.target_id).await?;
                    mapping = mapping.delete_flow(&target_flow.target_id);
                }
                SyncOperation::Create { git_flow } => {
                    let created = self
                        .flows
                        .create(&config.project_id, &git_flow.definition)
                        .await?;
                    mapping =
                        mapping.map_flow(git_flow.source_id.clone(), created.target_id.clone());
                    if created.status == FlowStatus::Enabled {
                        republish.push(created);
                    }
                }
                SyncOperation::Update {
                    git_flow,
                    target_flow,
                } => {
                    let updated = self
                        .flows
                        .update(&target_flow.target_id, &git_flow.definition)
                        .await?;
                    mapping =
                        mapping.map_flow(git_flow.source_id.clone(), updated.target_id.clone());
                    if updated.status == FlowStatus::Enabled {
                        republish.push(updated);
                    }
                }
            }
            self.repos.save_mapping(repo_id, &mapping).await?;
        }

        let errors = self.republish_all(republish).await;
        Ok(PullReport {
            plan,
            dry_run: false,
            errors,
        })
    }

    /// Republish enabled flows as independent concurrent tasks, joined
    /// before reporting. A failure for one flow becomes a
    /// [`ProjectSyncError`] and never blocks the others.
    async fn republish_all(&self, flows: Vec<DbFlow>) -> Vec<ProjectSyncError> {
        let mut handles = Vec::with_capacity(flows.len());
        for flow in flows {
            let repo = Arc::clone(&self.flows);
            let target_id = flow.target_id.clone();
            handles.push((
                flow.target_id,
                tokio::spawn(async move { repo.lock_and_publish(&target_id).await }),
            ));
        }

        let mut errors = Vec::new();
        for (target_id, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    info!(flow = %target_id, %err, "republish failed");
                    errors.push(ProjectSyncError {
                        flow_id: target_id.0,
                        message: err.to_string(),
                    });
                }
                Err(join_err) => {
                    errors.push(ProjectSyncError {
                        flow_id: target_id.0,
                        message: format!("republish task failed: {join_err}"),
                    });
                }
            }
        }
        errors
    }
}
