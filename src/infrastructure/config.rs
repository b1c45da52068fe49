use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub database: DbConfig,
    #[serde(default)]
    pub git: GitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Database driver: "postgres" (default), "mysql", "mariadb", or "sqlite".
    #[serde(default = "default_driver")]
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

fn default_driver() -> String {
    "postgres".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitConfig {
    /// Root directory for per-project git workspaces. Defaults to
    /// `<tmp>/flowsync`.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// Upper bound for any single git invocation. A timeout is fatal for
    /// that sync attempt.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("flowsync")
}

fn default_command_timeout() -> u64 {
    30
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl DbConfig {
    /// Build a sqlx-compatible connection URL from this config.
    pub fn url(&self) -> String {
        match self.driver.as_str() {
            "mysql" | "mariadb" => format!(
                "mysql://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.dbname
            ),
            "sqlite" => format!("sqlite://{}", self.dbname),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.dbname
            ),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, with `FLOWSYNC_*` environment overrides
    /// (e.g. `FLOWSYNC_DATABASE__PASSWORD`).
    pub fn load(path: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("FLOWSYNC").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config file: {}", path))?;
        cfg.try_deserialize()
            .with_context(|| "Failed to parse config")
    }

    /// Default config location: `<user config dir>/flowsync/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flowsync")
            .join("config.toml")
    }
}
