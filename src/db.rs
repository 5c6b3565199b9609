//! SQLite connection management.
//!
//! One pool serves both the vector index (`chunk_records`) and the document
//! registry (`documents`). The database file and its parent directories are
//! created on first connect.
//!
//! Connections run in WAL mode so `ask` can read while an `ingest` writes,
//! and wait up to [`BUSY_TIMEOUT`] for a competing writer instead of failing
//! with `SQLITE_BUSY`.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a pool on the configured index database.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    connect_path(&config.index.path).await
}

/// Open a pool on an explicit database path.
pub async fn connect_path(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;

    Ok(pool)
}
