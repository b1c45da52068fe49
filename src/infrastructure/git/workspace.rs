use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::domain::error::{Result, SyncError};
use crate::domain::flow::{FlowDefinition, GitFlow};
use crate::domain::mapping::MappingState;
use crate::domain::ports::SyncWorkspace;
use crate::domain::repo::RepositoryConfig;
use crate::domain::value_objects::{ProjectId, SourceId};

const COMMIT_AUTHOR_NAME: &str = "flowsync";
const COMMIT_AUTHOR_EMAIL: &str = "flowsync@localhost";

// ─── Git Workspace Manager ───────────────────────────────────────────────────

/// Adapter over the external `git` binary.
///
/// Each project gets a throwaway working tree under the workspace root,
/// rebuilt from the remote on every `prepare` — a crashed prior run leaves
/// nothing a fresh run can trip over. Every invocation is bounded by the
/// configured timeout; any failure (auth, network, conflict, timeout) is
/// fatal for the current sync attempt and is never retried here.
pub struct GitWorkspaceManager {
    root: PathBuf,
    timeout: Duration,
}

impl GitWorkspaceManager {
    pub fn new(root: PathBuf, command_timeout_secs: u64) -> Self {
        Self {
            root,
            timeout: Duration::from_secs(command_timeout_secs),
        }
    }

    fn workdir(&self, project_id: &ProjectId) -> PathBuf {
        self.root.join(&project_id.0)
    }

    fn flows_dir(&self, config: &RepositoryConfig) -> PathBuf {
        self.workdir(&config.project_id)
            .join("projects")
            .join(&config.slug)
            .join("flows")
    }

    fn state_dir(&self, config: &RepositoryConfig) -> PathBuf {
        self.workdir(&config.project_id)
            .join("projects")
            .join(&config.slug)
            .join("state")
    }

    fn key_path(&self, project_id: &ProjectId) -> PathBuf {
        self.root.join(format!("{}.key", project_id.0))
    }

    /// Run one git command in `workdir`, bounded by the timeout.
    /// Non-zero exit becomes `SyncError::Git` carrying stderr.
    async fn run_git(
        &self,
        workdir: &Path,
        op: &'static str,
        args: &[&str],
        ssh_command: Option<&str>,
    ) -> Result<Output> {
        let output = self.run_git_unchecked(workdir, op, args, ssh_command).await?;
        if !output.status.success() {
            return Err(SyncError::Git {
                op,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Same as `run_git`, but hands the raw output back so the caller can
    /// interpret non-zero exit codes (`git diff --cached --quiet` uses exit
    /// code 1 to mean "there are staged changes").
    async fn run_git_unchecked(
        &self,
        workdir: &Path,
        op: &'static str,
        args: &[&str],
        ssh_command: Option<&str>,
    ) -> Result<Output> {
        debug!(?workdir, ?args, "git {}", op);
        let mut cmd = Command::new("git");
        cmd.current_dir(workdir).args(args);
        if let Some(ssh) = ssh_command {
            cmd.env("GIT_SSH_COMMAND", ssh);
        }
        let secs = self.timeout.as_secs();
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => Err(SyncError::GitTimeout { op, secs }),
            Ok(result) => Ok(result?),
        }
    }

    /// Provision the SSH key file (mode 0600) and build the
    /// `GIT_SSH_COMMAND` value. An empty key means the remote needs no SSH
    /// (local `file://` remotes in tests) and no command is set.
    fn provision_ssh(&self, config: &RepositoryConfig) -> Result<Option<String>> {
        if config.ssh_private_key.is_empty() {
            return Ok(None);
        }
        let key_path = self.key_path(&config.project_id);
        std::fs::write(&key_path, &config.ssh_private_key)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(Some(format!(
            "ssh -i {} -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null",
            key_path.display()
        )))
    }

    fn flow_path(&self, config: &RepositoryConfig, source_id: &SourceId) -> PathBuf {
        self.flows_dir(config).join(format!("{}.json", source_id.0))
    }
}

/// Parse a list of flow file paths into snapshots, rejecting empty and
/// duplicate source identifiers regardless of where the list came from.
fn flows_from_paths(paths: Vec<PathBuf>) -> Result<Vec<GitFlow>> {
    let mut seen = BTreeSet::new();
    let mut flows = Vec::with_capacity(paths.len());
    for path in paths {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if stem.is_empty() {
            return Err(SyncError::EmptySourceId(path));
        }
        let source_id = SourceId(stem.to_string());
        if !seen.insert(source_id.clone()) {
            return Err(SyncError::DuplicateSourceId(source_id));
        }

        // A malformed file fails the whole read: the tree was checked
        // out moments ago, so inconsistency means a broken remote.
        let content = std::fs::read_to_string(&path)?;
        let definition: FlowDefinition =
            serde_json::from_str(&content).map_err(|err| SyncError::MalformedFlowFile {
                path: path.clone(),
                reason: err.to_string(),
            })?;
        flows.push(GitFlow {
            source_id,
            definition,
        });
    }
    Ok(flows)
}

#[async_trait]
impl SyncWorkspace for GitWorkspaceManager {
    #[instrument(skip(self, config), fields(project = %config.project_id))]
    async fn prepare(&self, config: &RepositoryConfig) -> Result<()> {
        let workdir = self.workdir(&config.project_id);

        // Idempotent cleanup: a crashed prior run must not corrupt this one.
        match std::fs::remove_dir_all(&workdir) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        std::fs::create_dir_all(self.flows_dir(config))?;
        std::fs::create_dir_all(self.state_dir(config))?;

        let ssh = self.provision_ssh(config)?;
        let ssh = ssh.as_deref();

        self.run_git(&workdir, "init", &["init"], ssh).await?;
        self.run_git(
            &workdir,
            "remote add",
            &["remote", "add", "origin", &config.remote_url],
            ssh,
        )
        .await?;
        self.run_git(&workdir, "branch", &["branch", "-M", &config.branch], ssh)
            .await?;
        self.run_git(
            &workdir,
            "pull",
            &["pull", "origin", &config.branch],
            ssh,
        )
        .await?;
        info!(workdir = %workdir.display(), branch = %config.branch, "workspace ready");
        Ok(())
    }

    async fn read_flows(&self, config: &RepositoryConfig) -> Result<Vec<GitFlow>> {
        let flows_dir = self.flows_dir(config);
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&flows_dir)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        // Filename order keeps diff output deterministic.
        paths.sort();

        let flows = flows_from_paths(paths)?;
        debug!(count = flows.len(), dir = %flows_dir.display(), "read git flows");
        Ok(flows)
    }

    async fn write_flow(&self, config: &RepositoryConfig, flow: &GitFlow) -> Result<()> {
        let path = self.flow_path(config, &flow.source_id);
        let content = serde_json::to_string_pretty(&flow.definition)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    async fn delete_flow(&self, config: &RepositoryConfig, source_id: &SourceId) -> Result<()> {
        match std::fs::remove_file(self.flow_path(config, source_id)) {
            Ok(()) => Ok(()),
            // Already absent remotely: deleting twice must stay idempotent.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_state(&self, config: &RepositoryConfig, mapping: &MappingState) -> Result<()> {
        let path = self
            .state_dir(config)
            .join(format!("{}.json", config.project_id.0));
        std::fs::write(path, serde_json::to_string_pretty(mapping)?)?;
        Ok(())
    }

    #[instrument(skip(self, config, message), fields(project = %config.project_id))]
    async fn commit_and_push(&self, config: &RepositoryConfig, message: &str) -> Result<()> {
        let workdir = self.workdir(&config.project_id);
        let ssh = self.provision_ssh(config)?;
        let ssh = ssh.as_deref();

        self.run_git(&workdir, "add", &["add", "-A"], ssh).await?;

        // `diff --cached --quiet` exits 0 when the index matches HEAD; a
        // push that changed nothing is a no-op, not an error.
        let staged = self
            .run_git_unchecked(&workdir, "diff", &["diff", "--cached", "--quiet"], ssh)
            .await?;
        if staged.status.success() {
            info!("nothing to commit, skipping push");
            return Ok(());
        }

        self.run_git(
            &workdir,
            "commit",
            &[
                "-c",
                &format!("user.name={COMMIT_AUTHOR_NAME}"),
                "-c",
                &format!("user.email={COMMIT_AUTHOR_EMAIL}"),
                "commit",
                "-m",
                message,
            ],
            ssh,
        )
        .await?;
        self.run_git(
            &workdir,
            "push",
            &["push", "origin", &config.branch],
            ssh,
        )
        .await?;
        info!(branch = %config.branch, "pushed");
        Ok(())
    }

    async fn cleanup(&self, config: &RepositoryConfig) -> Result<()> {
        for path in [
            self.workdir(&config.project_id),
            self.key_path(&config.project_id),
        ] {
            match std::fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(&path)?,
                Ok(_) => std::fs::remove_file(&path)?,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        debug!(project = %config.project_id, "workspace discarded");
        Ok(())
    }
}
