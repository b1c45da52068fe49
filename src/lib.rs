use std::sync::Arc;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of flowsync's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                            |
/// |---------|-----------------|----------------------------------------|
/// | `Error` | `error`         | `--quiet` / CI scripting               |
/// | `Info`  | `info`          | Default — shows plan and push progress |
/// | `Debug` | `debug`         | `--verbose` — shows git invocations    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

/// Initialise the global `tracing` subscriber for flowsync.
///
/// This is a convenience wrapper around `tracing_subscriber`. It respects
/// `RUST_LOG` when set, falling back to `level` otherwise.
///
/// Call this **once** at application startup, before any flowsync async
/// function. Library consumers who manage their own subscriber should skip
/// this and configure tracing themselves.
///
/// Only available when the `cli` feature is enabled (pulls in
/// `tracing-subscriber`).
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let default_filter = match level {
        LogLevel::Error => "flowsync=error",
        LogLevel::Info => "flowsync=info",
        LogLevel::Debug => "flowsync=debug",
    };

    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use application::diff::FlowPlanner;
pub use application::locks::ProjectLocks;
pub use application::pull::PullService;
pub use application::push::PushService;
pub use application::repos::RepoConfigService;
pub use domain::error::SyncError;
pub use domain::fingerprint::fingerprint;
pub use domain::flow::{DbFlow, FlowDefinition, FlowStatus, GitFlow};
pub use domain::mapping::{FlowMapping, MappingState};
pub use domain::plan::{ProjectSyncError, PullReport, SyncOperation, SyncPlan};
pub use domain::ports::{FlowRecordRepository, Planner, RepoConfigStore, SyncWorkspace};
pub use domain::repo::{ConnectRepoRequest, RepositoryConfig};
pub use domain::value_objects::{Fingerprint, ProjectId, RepoId, SourceId, TargetId};
pub use infrastructure::config::{AppConfig, DbConfig, GitConfig};
pub use infrastructure::git::GitWorkspaceManager;
pub use presentation::pull_view::PullView;

use crate::infrastructure::db::flow_repository::SqlxFlowRepository;
use crate::infrastructure::db::repo_config_store::SqlxRepoConfigStore;

// ─── Engine ──────────────────────────────────────────────────────────────────

/// All sync services wired together over one set of ports.
///
/// Construct once per process (via [`SyncEngine::connect`] for the sqlx/git
/// stack, or [`SyncEngine::from_parts`] with custom port implementations)
/// so the per-project locks actually serialize concurrent callers.
pub struct SyncEngine {
    pub repos: RepoConfigService,
    pub push: PushService,
    pub pull: PullService,
}

impl SyncEngine {
    /// Connect to the configured database and wire the production stack:
    /// sqlx-backed stores and the external-git workspace adapter.
    pub async fn connect(cfg: &AppConfig) -> anyhow::Result<Self> {
        let pool = infrastructure::db::connect(&cfg.database).await?;
        let repo_store: Arc<dyn RepoConfigStore> = Arc::new(SqlxRepoConfigStore::new(
            pool.clone(),
            cfg.database.driver.clone(),
        ));
        let flow_repo: Arc<dyn FlowRecordRepository> = Arc::new(SqlxFlowRepository::new(
            pool,
            cfg.database.driver.clone(),
        ));
        let workspace: Arc<dyn SyncWorkspace> = Arc::new(GitWorkspaceManager::new(
            cfg.git.workspace_root.clone(),
            cfg.git.command_timeout_secs,
        ));
        Ok(Self::from_parts(repo_store, flow_repo, workspace))
    }

    /// Wire the services over caller-provided port implementations.
    pub fn from_parts(
        repo_store: Arc<dyn RepoConfigStore>,
        flow_repo: Arc<dyn FlowRecordRepository>,
        workspace: Arc<dyn SyncWorkspace>,
    ) -> Self {
        let locks = ProjectLocks::new();
        let planner: Arc<dyn Planner> = Arc::new(FlowPlanner::new());
        Self {
            repos: RepoConfigService::new(Arc::clone(&repo_store)),
            push: PushService::new(
                Arc::clone(&repo_store),
                Arc::clone(&flow_repo),
                Arc::clone(&workspace),
                locks.clone(),
            ),
            pull: PullService::new(repo_store, flow_repo, workspace, planner, locks),
        }
    }
}
