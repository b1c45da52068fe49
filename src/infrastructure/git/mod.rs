pub mod workspace;

pub use workspace::GitWorkspaceManager;
