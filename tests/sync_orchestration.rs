//! End-to-end push/pull orchestration over in-memory port implementations.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use flowsync::{
    ConnectRepoRequest, DbFlow, FlowDefinition, FlowRecordRepository, FlowStatus, GitFlow,
    MappingState, ProjectId, PullReport, RepoConfigStore, RepoId, RepositoryConfig, SourceId,
    SyncEngine, SyncError, SyncWorkspace, TargetId,
};

type Result<T> = std::result::Result<T, SyncError>;

// ─── In-memory flow CRUD service ─────────────────────────────────────────────

#[derive(Default)]
struct InMemoryFlows {
    flows: Mutex<BTreeMap<String, DbFlow>>,
    next_id: AtomicUsize,
    published: Mutex<Vec<String>>,
    fail_publish_for: Mutex<HashSet<String>>,
    fail_create_for: Mutex<HashSet<String>>,
}

impl InMemoryFlows {
    fn seed(&self, id: &str, name: &str, trigger: Value, status: FlowStatus) {
        self.flows.lock().unwrap().insert(
            id.to_string(),
            DbFlow {
                target_id: TargetId(id.to_string()),
                definition: FlowDefinition {
                    display_name: name.to_string(),
                    trigger,
                },
                status,
            },
        );
    }

    fn ids(&self) -> Vec<String> {
        self.flows.lock().unwrap().keys().cloned().collect()
    }

    fn display_name(&self, id: &str) -> Option<String> {
        self.flows
            .lock()
            .unwrap()
            .get(id)
            .map(|f| f.definition.display_name.clone())
    }

    fn published_ids(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlowRecordRepository for InMemoryFlows {
    async fn list_for_project(&self, _project_id: &ProjectId) -> Result<Vec<DbFlow>> {
        Ok(self.flows.lock().unwrap().values().cloned().collect())
    }

    async fn get_one_populated(&self, target_id: &TargetId) -> Result<DbFlow> {
        self.flows
            .lock()
            .unwrap()
            .get(&target_id.0)
            .cloned()
            .ok_or_else(|| SyncError::FlowNotFound(target_id.clone()))
    }

    async fn create(&self, _project_id: &ProjectId, definition: &FlowDefinition) -> Result<DbFlow> {
        if self
            .fail_create_for
            .lock()
            .unwrap()
            .contains(&definition.display_name)
        {
            return Err(SyncError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "insert failed",
            )));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let flow = DbFlow {
            target_id: TargetId(format!("f{n}")),
            definition: definition.clone(),
            // Newly created flows start disabled until published.
            status: FlowStatus::Disabled,
        };
        self.flows
            .lock()
            .unwrap()
            .insert(flow.target_id.0.clone(), flow.clone());
        Ok(flow)
    }

    async fn update(&self, target_id: &TargetId, definition: &FlowDefinition) -> Result<DbFlow> {
        let mut flows = self.flows.lock().unwrap();
        let flow = flows
            .get_mut(&target_id.0)
            .ok_or_else(|| SyncError::FlowNotFound(target_id.clone()))?;
        flow.definition = definition.clone();
        Ok(flow.clone())
    }

    async fn delete(&self, target_id: &TargetId) -> Result<()> {
        self.flows.lock().unwrap().remove(&target_id.0);
        Ok(())
    }

    async fn lock_and_publish(&self, target_id: &TargetId) -> Result<()> {
        if self.fail_publish_for.lock().unwrap().contains(&target_id.0) {
            return Err(SyncError::FlowNotFound(target_id.clone()));
        }
        self.published.lock().unwrap().push(target_id.0.clone());
        Ok(())
    }
}

// ─── In-memory repo config store ─────────────────────────────────────────────

#[derive(Default)]
struct InMemoryRepoStore {
    configs: Mutex<BTreeMap<String, RepositoryConfig>>,
    mapping_saves: AtomicUsize,
}

#[async_trait]
impl RepoConfigStore for InMemoryRepoStore {
    async fn get(&self, id: &RepoId) -> Result<RepositoryConfig> {
        self.configs
            .lock()
            .unwrap()
            .get(&id.0)
            .cloned()
            .ok_or_else(|| SyncError::RepoNotFound(id.clone()))
    }

    async fn list_for_project(&self, project_id: &ProjectId) -> Result<Vec<RepositoryConfig>> {
        Ok(self
            .configs
            .lock()
            .unwrap()
            .values()
            .filter(|c| &c.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn upsert(&self, config: RepositoryConfig) -> Result<RepositoryConfig> {
        let mut configs = self.configs.lock().unwrap();
        configs.retain(|_, c| c.project_id != config.project_id);
        configs.insert(config.id.0.clone(), config.clone());
        Ok(config)
    }

    async fn delete(&self, id: &RepoId) -> Result<()> {
        self.configs
            .lock()
            .unwrap()
            .remove(&id.0)
            .map(|_| ())
            .ok_or_else(|| SyncError::RepoNotFound(id.clone()))
    }

    async fn save_mapping(&self, id: &RepoId, mapping: &MappingState) -> Result<()> {
        self.mapping_saves.fetch_add(1, Ordering::SeqCst);
        let mut configs = self.configs.lock().unwrap();
        let config = configs
            .get_mut(&id.0)
            .ok_or_else(|| SyncError::RepoNotFound(id.clone()))?;
        config.mapping = mapping.clone();
        Ok(())
    }
}

// ─── In-memory workspace ─────────────────────────────────────────────────────

#[derive(Default)]
struct FakeWorkspace {
    git_files: Mutex<BTreeMap<String, FlowDefinition>>,
    commits: Mutex<Vec<String>>,
    prepares: AtomicUsize,
    fail_push: Mutex<bool>,
}

impl FakeWorkspace {
    fn seed(&self, source_id: &str, name: &str, trigger: Value) {
        self.git_files.lock().unwrap().insert(
            source_id.to_string(),
            FlowDefinition {
                display_name: name.to_string(),
                trigger,
            },
        );
    }

    fn file_names(&self) -> Vec<String> {
        self.git_files.lock().unwrap().keys().cloned().collect()
    }

    fn commit_messages(&self) -> Vec<String> {
        self.commits.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncWorkspace for FakeWorkspace {
    async fn prepare(&self, _config: &RepositoryConfig) -> Result<()> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_flows(&self, _config: &RepositoryConfig) -> Result<Vec<GitFlow>> {
        Ok(self
            .git_files
            .lock()
            .unwrap()
            .iter()
            .map(|(source_id, definition)| GitFlow {
                source_id: SourceId(source_id.clone()),
                definition: definition.clone(),
            })
            .collect())
    }

    async fn write_flow(&self, _config: &RepositoryConfig, flow: &GitFlow) -> Result<()> {
        self.git_files
            .lock()
            .unwrap()
            .insert(flow.source_id.0.clone(), flow.definition.clone());
        Ok(())
    }

    async fn delete_flow(&self, _config: &RepositoryConfig, source_id: &SourceId) -> Result<()> {
        self.git_files.lock().unwrap().remove(&source_id.0);
        Ok(())
    }

    async fn write_state(&self, _config: &RepositoryConfig, _mapping: &MappingState) -> Result<()> {
        Ok(())
    }

    async fn commit_and_push(&self, _config: &RepositoryConfig, message: &str) -> Result<()> {
        if *self.fail_push.lock().unwrap() {
            return Err(SyncError::Git {
                op: "push",
                stderr: "remote rejected".to_string(),
            });
        }
        self.commits.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

// ─── Fixture ─────────────────────────────────────────────────────────────────

struct Fixture {
    engine: SyncEngine,
    flows: Arc<InMemoryFlows>,
    store: Arc<InMemoryRepoStore>,
    workspace: Arc<FakeWorkspace>,
    repo_id: RepoId,
}

async fn fixture() -> Fixture {
    let flows = Arc::new(InMemoryFlows::default());
    let store = Arc::new(InMemoryRepoStore::default());
    let workspace = Arc::new(FakeWorkspace::default());
    let engine = SyncEngine::from_parts(
        Arc::clone(&store) as Arc<dyn RepoConfigStore>,
        Arc::clone(&flows) as Arc<dyn FlowRecordRepository>,
        Arc::clone(&workspace) as Arc<dyn SyncWorkspace>,
    );
    let config = engine
        .repos
        .connect(ConnectRepoRequest {
            project_id: ProjectId("p1".into()),
            remote_url: "git@example.com:acme/flows.git".into(),
            branch: "main".into(),
            ssh_private_key: String::new(),
            slug: "acme".into(),
        })
        .await
        .unwrap();
    Fixture {
        engine,
        flows,
        store,
        workspace,
        repo_id: config.id,
    }
}

fn kinds(report: &PullReport) -> Vec<&'static str> {
    report.plan.operations.iter().map(|op| op.kind()).collect()
}

fn svec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn webhook() -> Value {
    json!({"type": "WEBHOOK", "next": null})
}

// ─── Pull ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pull_creates_missing_flow_and_second_pull_is_empty() {
    let fx = fixture().await;
    fx.workspace.seed("invoice", "Invoice Flow", webhook());

    let report = fx.engine.pull.pull(&fx.repo_id, false).await.unwrap();
    assert_eq!(kinds(&report), vec!["CREATE"]);
    assert!(report.errors.is_empty());
    assert_eq!(fx.flows.ids(), svec(&["f1"]));

    // The mapping entry was recorded and persisted.
    let config = fx.store.get(&fx.repo_id).await.unwrap();
    assert_eq!(
        config.mapping.find_source_id(&TargetId("f1".into())),
        Some(&SourceId("invoice".into()))
    );

    // Idempotence: nothing changed, so the next pull plans nothing.
    let report = fx.engine.pull.pull(&fx.repo_id, false).await.unwrap();
    assert!(report.plan.is_empty());
}

#[tokio::test]
async fn dry_run_is_side_effect_free_and_stable() {
    let fx = fixture().await;
    fx.workspace.seed("a", "A", webhook());
    fx.flows.seed("f9", "Orphan", webhook(), FlowStatus::Disabled);

    let first = fx.engine.pull.pull(&fx.repo_id, true).await.unwrap();
    assert!(first.dry_run);
    assert_eq!(kinds(&first), vec!["DELETE", "CREATE"]);

    // Nothing was mutated: db unchanged, mapping never persisted.
    assert_eq!(fx.flows.ids(), svec(&["f9"]));
    assert_eq!(fx.store.mapping_saves.load(Ordering::SeqCst), 0);

    // Same plan on a repeated dry run.
    let second = fx.engine.pull.pull(&fx.repo_id, true).await.unwrap();
    assert_eq!(kinds(&second), kinds(&first));
}

#[tokio::test]
async fn pull_applies_rename_as_single_update() {
    let fx = fixture().await;
    fx.workspace.seed("invoice", "New Name", webhook());
    fx.flows.seed("f1", "Old Name", webhook(), FlowStatus::Disabled);
    let config = fx.store.get(&fx.repo_id).await.unwrap();
    fx.store
        .save_mapping(
            &fx.repo_id,
            &config
                .mapping
                .map_flow(SourceId("invoice".into()), TargetId("f1".into())),
        )
        .await
        .unwrap();

    let report = fx.engine.pull.pull(&fx.repo_id, false).await.unwrap();
    assert_eq!(kinds(&report), vec!["UPDATE"]);
    assert_eq!(fx.flows.ids(), svec(&["f1"]), "no create+delete pair");
    assert_eq!(fx.flows.display_name("f1").unwrap(), "New Name");
}

#[tokio::test]
async fn pull_deletes_db_flow_whose_git_file_was_removed() {
    let fx = fixture().await;
    fx.flows.seed("f1", "Flow", webhook(), FlowStatus::Disabled);
    let config = fx.store.get(&fx.repo_id).await.unwrap();
    fx.store
        .save_mapping(
            &fx.repo_id,
            &config
                .mapping
                .map_flow(SourceId("gone".into()), TargetId("f1".into())),
        )
        .await
        .unwrap();

    let report = fx.engine.pull.pull(&fx.repo_id, false).await.unwrap();
    assert_eq!(kinds(&report), vec!["DELETE"]);
    assert!(fx.flows.ids().is_empty());

    // The dangling mapping entry was pruned and the pruned state persisted.
    let config = fx.store.get(&fx.repo_id).await.unwrap();
    assert!(config.mapping.flows.is_empty());
}

#[tokio::test]
async fn enabled_flows_are_republished_after_pull() {
    let fx = fixture().await;
    fx.workspace.seed("a", "A v2", webhook());
    fx.flows.seed("f1", "A v1", webhook(), FlowStatus::Enabled);
    let config = fx.store.get(&fx.repo_id).await.unwrap();
    fx.store
        .save_mapping(
            &fx.repo_id,
            &config
                .mapping
                .map_flow(SourceId("a".into()), TargetId("f1".into())),
        )
        .await
        .unwrap();

    let report = fx.engine.pull.pull(&fx.repo_id, false).await.unwrap();
    assert!(report.errors.is_empty());
    assert_eq!(fx.flows.published_ids(), svec(&["f1"]));
}

#[tokio::test]
async fn republish_failure_is_isolated_per_flow() {
    let fx = fixture().await;
    fx.workspace.seed("a", "A v2", webhook());
    fx.workspace.seed("b", "B v2", webhook());
    fx.flows.seed("f1", "A v1", webhook(), FlowStatus::Enabled);
    fx.flows.seed("f2", "B v1", webhook(), FlowStatus::Enabled);
    let config = fx.store.get(&fx.repo_id).await.unwrap();
    fx.store
        .save_mapping(
            &fx.repo_id,
            &config
                .mapping
                .map_flow(SourceId("a".into()), TargetId("f1".into()))
                .map_flow(SourceId("b".into()), TargetId("f2".into())),
        )
        .await
        .unwrap();
    fx.flows
        .fail_publish_for
        .lock()
        .unwrap()
        .insert("f1".to_string());

    let report = fx.engine.pull.pull(&fx.repo_id, false).await.unwrap();

    // Both structural updates applied; one republish failed, as data.
    assert_eq!(kinds(&report), vec!["UPDATE", "UPDATE"]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].flow_id, "f1");
    assert_eq!(fx.flows.published_ids(), svec(&["f2"]));
    assert_eq!(fx.flows.display_name("f1").unwrap(), "A v2");
}

#[tokio::test]
async fn failed_create_mid_pull_keeps_earlier_mappings() {
    let fx = fixture().await;
    fx.workspace.seed("a", "A", webhook());
    fx.workspace.seed("b", "B", webhook());
    fx.flows
        .fail_create_for
        .lock()
        .unwrap()
        .insert("B".to_string());

    let err = fx.engine.pull.pull(&fx.repo_id, false).await.unwrap_err();
    assert!(matches!(err, SyncError::Io(_)));

    // The create for "a" applied before the failure, and its mapping entry
    // was persisted rather than lost with the aborted pass.
    assert_eq!(fx.flows.ids(), svec(&["f1"]));
    let config = fx.store.get(&fx.repo_id).await.unwrap();
    assert_eq!(
        config.mapping.find_target_id(&SourceId("a".into())),
        Some(&TargetId("f1".into()))
    );

    // The retry sees a consistent table: only "b" still needs creating, no
    // delete+create churn for the already-synced flow.
    fx.flows.fail_create_for.lock().unwrap().clear();
    let report = fx.engine.pull.pull(&fx.repo_id, true).await.unwrap();
    assert_eq!(kinds(&report), vec!["CREATE"]);
}

#[tokio::test]
async fn pull_unknown_repo_is_typed_not_found() {
    let fx = fixture().await;
    let err = fx
        .engine
        .pull
        .pull(&RepoId("missing".into()), true)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::RepoNotFound(_)));
}

// ─── Push ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn push_unmapped_flow_uses_own_id_and_persists_mapping() {
    let fx = fixture().await;
    fx.flows.seed("f1", "Invoice Flow", webhook(), FlowStatus::Enabled);

    fx.engine
        .push
        .push_flow(&fx.repo_id, &TargetId("f1".into()), None)
        .await
        .unwrap();

    assert_eq!(fx.workspace.file_names(), svec(&["f1"]));
    assert_eq!(
        fx.workspace.commit_messages(),
        svec(&["chore: updated flow f1"])
    );
    let config = fx.store.get(&fx.repo_id).await.unwrap();
    assert_eq!(
        config.mapping.find_source_id(&TargetId("f1".into())),
        Some(&SourceId("f1".into()))
    );
}

#[tokio::test]
async fn push_mapped_flow_reuses_source_id() {
    let fx = fixture().await;
    fx.flows.seed("f1", "Renamed In Db", webhook(), FlowStatus::Enabled);
    let config = fx.store.get(&fx.repo_id).await.unwrap();
    fx.store
        .save_mapping(
            &fx.repo_id,
            &config
                .mapping
                .map_flow(SourceId("invoice".into()), TargetId("f1".into())),
        )
        .await
        .unwrap();

    fx.engine
        .push
        .push_flow(&fx.repo_id, &TargetId("f1".into()), Some("update invoice"))
        .await
        .unwrap();

    // Db-side rename does not move the file.
    assert_eq!(fx.workspace.file_names(), svec(&["invoice"]));
    assert_eq!(fx.workspace.commit_messages(), svec(&["update invoice"]));
}

#[tokio::test]
async fn failed_push_leaves_mapping_unpersisted() {
    let fx = fixture().await;
    fx.flows.seed("f1", "Flow", webhook(), FlowStatus::Enabled);
    *fx.workspace.fail_push.lock().unwrap() = true;

    let err = fx
        .engine
        .push
        .push_flow(&fx.repo_id, &TargetId("f1".into()), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Git { .. }));

    // Mapping/git drift avoided: nothing was persisted.
    assert_eq!(fx.store.mapping_saves.load(Ordering::SeqCst), 0);
    let config = fx.store.get(&fx.repo_id).await.unwrap();
    assert!(config.mapping.flows.is_empty());
}

#[tokio::test]
async fn delete_flow_drops_file_and_mapping_entry() {
    let fx = fixture().await;
    fx.workspace.seed("invoice", "Invoice Flow", webhook());
    let config = fx.store.get(&fx.repo_id).await.unwrap();
    fx.store
        .save_mapping(
            &fx.repo_id,
            &config
                .mapping
                .map_flow(SourceId("invoice".into()), TargetId("f1".into())),
        )
        .await
        .unwrap();

    fx.engine
        .push
        .delete_flow(&fx.repo_id, &TargetId("f1".into()), None)
        .await
        .unwrap();

    assert!(fx.workspace.file_names().is_empty());
    let config = fx.store.get(&fx.repo_id).await.unwrap();
    assert!(config.mapping.flows.is_empty());
    assert_eq!(
        fx.workspace.commit_messages(),
        svec(&["chore: deleted flow invoice"])
    );
}

#[tokio::test]
async fn disconnect_removes_config() {
    let fx = fixture().await;
    fx.engine.repos.disconnect(&fx.repo_id).await.unwrap();
    let err = fx.engine.pull.pull(&fx.repo_id, true).await.unwrap_err();
    assert!(matches!(err, SyncError::RepoNotFound(_)));
}
