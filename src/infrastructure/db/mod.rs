use anyhow::{Context, Result};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::debug;

use crate::infrastructure::config::DbConfig;

pub mod flow_repository;
pub mod repo_config_store;

/// Connect to the database described in `cfg`.
pub async fn connect(cfg: &DbConfig) -> Result<AnyPool> {
    sqlx::any::install_default_drivers();

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.url())
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {} (driver: {})",
                cfg.dbname, cfg.driver
            )
        })?;

    debug!(
        "Connected to {}/{} via {} driver",
        cfg.host, cfg.dbname, cfg.driver
    );

    Ok(pool)
}

/// Positional bind marker for the configured driver. The Any driver does
/// not translate placeholder syntax, so queries are built per dialect:
/// `$n` for Postgres, `?` for MySQL/MariaDB/SQLite.
pub(crate) fn marker(driver: &str, n: usize) -> String {
    match driver {
        "postgres" => format!("${n}"),
        _ => "?".to_string(),
    }
}
