use std::path::PathBuf;

use thiserror::Error;

use crate::domain::value_objects::{RepoId, SourceId, TargetId};

/// Error taxonomy of the sync engine.
///
/// Fatal variants abort the whole push/pull attempt and surface to the
/// caller. Per-flow republish failures during a pull are *not* represented
/// here — they are collected as [`crate::domain::plan::ProjectSyncError`]
/// data on the report so the remaining flows still sync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("repository configuration {0} not found")]
    RepoNotFound(RepoId),

    #[error("flow {0} not found")]
    FlowNotFound(TargetId),

    #[error("malformed flow file {}: {reason}", .path.display())]
    MalformedFlowFile { path: PathBuf, reason: String },

    #[error("flow file {} has an empty source identifier", .0.display())]
    EmptySourceId(PathBuf),

    #[error("duplicate source identifier {0} in flows directory")]
    DuplicateSourceId(SourceId),

    #[error("git {op} failed: {stderr}")]
    Git { op: &'static str, stderr: String },

    #[error("git {op} timed out after {secs}s")]
    GitTimeout { op: &'static str, secs: u64 },

    #[error("workspace i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, SyncError>;
