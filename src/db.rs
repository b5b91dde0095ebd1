//! SQLite connection pool shared by the document store and the payload sink.
//!
//! The ingestion scheduler and HTTP handlers write through the same pool,
//! so every connection runs in WAL mode with a busy timeout instead of
//! failing immediately on `SQLITE_BUSY`.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::config::{Config, StoreConfig};

/// Open the pool described by `[store]`.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    open(&config.store.path, &config.store).await
}

/// Open a pool at `db_path` with the default `[store]` settings.
pub async fn connect_path(db_path: &Path) -> Result<SqlitePool> {
    open(db_path, &StoreConfig::default()).await
}

async fn open(db_path: &Path, store: &StoreConfig) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(store.max_connections)
        .connect_with(connect_options(db_path, store.busy_timeout()))
        .await
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    Ok(pool)
}

fn connect_options(db_path: &Path, busy_timeout: Duration) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        // NORMAL is durable under WAL except across power loss.
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(busy_timeout)
}
