//! Database schema migrations (idempotent).
//!
//! | Table | Holds |
//! |-------|-------|
//! | `kv_entries` | JSON documents and strings, with optional expiry |
//! | `kv_list_items` | list items, ordered by position |
//! | `raw_payloads` | every fetched payload, for the relational sink |

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an open pool.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // `kind` is 'json', 'string' or 'list'; list values live in kv_list_items
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_entries (
            key TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            value TEXT,
            expires_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_list_items (
            key TEXT NOT NULL,
            position INTEGER NOT NULL,
            item TEXT NOT NULL,
            PRIMARY KEY (key, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_payloads (
            id TEXT PRIMARY KEY,
            received_at INTEGER NOT NULL,
            record_count INTEGER NOT NULL,
            payload TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_kv_entries_expires_at ON kv_entries(expires_at)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_raw_payloads_received_at ON raw_payloads(received_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
