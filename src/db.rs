use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;

use crosslink_core::Engine;

use crate::config::Config;
use crate::connector_fs::FsContentSource;
use crate::sqlite_store::SqliteStore;

/// The engine as wired by the CLI.
pub type AppEngine = Engine<SqliteStore, FsContentSource>;

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Connect to the database and build an engine over the configured
/// content root.
pub async fn open_engine(config: &Config) -> Result<(SqlitePool, AppEngine)> {
    let pool = connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let source = Arc::new(FsContentSource::from_config(&config.content)?);
    let engine = Engine::new(store, source, config.engine())?;
    Ok((pool, engine))
}
