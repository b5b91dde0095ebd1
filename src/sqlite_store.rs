//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Maps each store operation onto the `kv_entries` / `kv_list_items`
//! tables created by [`migrate`](crate::migrate). Expiry is stored as a
//! UNIX-millisecond deadline and filtered on every read; expired rows are
//! purged whenever a document is written.
//!
//! Structured-path reads are compiled into SQLite JSON1 queries
//! (`json_each` over the array, `json_extract` per clause), so filtering
//! happens inside the database and only matching records are returned,
//! as a flat array.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use skycache_core::path::JsonPath;
use skycache_core::store::{compile_pattern, DocumentStore};

const KIND_JSON: &str = "json";
const KIND_STRING: &str = "string";
const KIND_LIST: &str = "list";

const LIVE: &str = "(expires_at IS NULL OR expires_at > ?)";

/// SQLite implementation of the [`DocumentStore`] trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Kind of the live entry at `key`, if any.
    async fn live_kind(&self, key: &str) -> Result<Option<String>> {
        let kind: Option<String> = sqlx::query_scalar(&format!(
            "SELECT kind FROM kv_entries WHERE key = ? AND {}",
            LIVE
        ))
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await?;
        Ok(kind)
    }

    async fn get_kind(&self, key: &str, kind: &str) -> Result<Option<String>> {
        let row = sqlx::query(&format!(
            "SELECT kind, value FROM kv_entries WHERE key = ? AND {}",
            LIVE
        ))
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(row) => {
                let found: String = row.get("kind");
                if found != kind {
                    bail!("key '{}' holds a {}, not a {}", key, found, kind);
                }
                Ok(row.get("value"))
            }
        }
    }

    async fn put(&self, key: &str, kind: &str, value: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        purge_expired(&mut tx).await?;

        sqlx::query("DELETE FROM kv_list_items WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, kind, value, expires_at) VALUES (?, ?, ?, NULL)
            ON CONFLICT(key) DO UPDATE SET
                kind = excluded.kind,
                value = excluded.value,
                expires_at = NULL
            "#,
        )
        .bind(key)
        .bind(kind)
        .bind(value)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

async fn purge_expired(tx: &mut Transaction<'_, Sqlite>) -> Result<()> {
    sqlx::query("DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?")
        .bind(now_millis())
        .execute(&mut **tx)
        .await?;
    sqlx::query("DELETE FROM kv_list_items WHERE key NOT IN (SELECT key FROM kv_entries)")
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn json_get(&self, key: &str) -> Result<Option<String>> {
        self.get_kind(key, KIND_JSON).await
    }

    async fn json_get_path(&self, key: &str, path: &JsonPath) -> Result<Option<String>> {
        let array_path = format!("$.{}", path.array());

        let array_type: Option<Option<String>> = sqlx::query_scalar(&format!(
            "SELECT json_type(value, ?) FROM kv_entries WHERE key = ? AND kind = ? AND {}",
            LIVE
        ))
        .bind(&array_path)
        .bind(key)
        .bind(KIND_JSON)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await?;

        match array_type {
            Some(Some(t)) if t == "array" => {}
            _ => return Ok(None),
        }

        let predicate = if path.clauses().is_empty() {
            "1 = 1".to_string()
        } else {
            path.clauses()
                .iter()
                .map(|_| "json_extract(je.value, ?) = ?")
                .collect::<Vec<_>>()
                .join(" OR ")
        };

        let sql = format!(
            r#"
            SELECT json_quote(je.value) AS item
            FROM kv_entries kv, json_each(kv.value, ?) je
            WHERE kv.key = ? AND ({})
            ORDER BY je.key
            "#,
            predicate
        );

        let mut query = sqlx::query(&sql).bind(&array_path).bind(key);
        for clause in path.clauses() {
            query = query.bind(clause.sqlite_path()).bind(clause.value.clone());
        }
        let rows = query.fetch_all(&self.pool).await?;

        let items: Vec<String> = rows.iter().map(|row| row.get("item")).collect();
        Ok(Some(format!("[{}]", items.join(","))))
    }

    async fn json_set(&self, key: &str, json: &str) -> Result<()> {
        serde_json::from_str::<serde_json::Value>(json)?;
        self.put(key, KIND_JSON, json).await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        self.get_kind(key, KIND_STRING).await
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, KIND_STRING, value).await
    }

    async fn list_push(&self, key: &str, item: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        purge_expired(&mut tx).await?;

        let kind: Option<String> = sqlx::query_scalar("SELECT kind FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;

        match kind.as_deref() {
            Some(KIND_LIST) => {}
            Some(other) => bail!("key '{}' holds a {}, not a list", key, other),
            None => {
                sqlx::query(
                    "INSERT INTO kv_entries (key, kind, value, expires_at) VALUES (?, ?, NULL, NULL)",
                )
                .bind(key)
                .bind(KIND_LIST)
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query(
            r#"
            INSERT INTO kv_list_items (key, position, item)
            VALUES (?, (SELECT COALESCE(MAX(position) + 1, 0) FROM kv_list_items WHERE key = ?), ?)
            "#,
        )
        .bind(key)
        .bind(key)
        .bind(item)
        .execute(&mut *tx)
        .await?;

        let len: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_list_items WHERE key = ?")
            .bind(key)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(len as u64)
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        match self.live_kind(key).await?.as_deref() {
            None => return Ok(Vec::new()),
            Some(KIND_LIST) => {}
            Some(other) => bail!("key '{}' holds a {}, not a list", key, other),
        }

        let items: Vec<String> =
            sqlx::query_scalar("SELECT item FROM kv_list_items WHERE key = ? ORDER BY position")
                .bind(key)
                .fetch_all(&self.pool)
                .await?;
        Ok(items)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = now_millis();
        let deadline = now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));
        let result = sqlx::query(&format!(
            "UPDATE kv_entries SET expires_at = ? WHERE key = ? AND {}",
            LIVE
        ))
        .bind(deadline)
        .bind(key)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = compile_pattern(pattern)?;
        let all: Vec<String> = sqlx::query_scalar(&format!(
            "SELECT key FROM kv_entries WHERE {} ORDER BY key",
            LIVE
        ))
        .bind(now_millis())
        .fetch_all(&self.pool)
        .await?;
        Ok(all.into_iter().filter(|k| matcher.is_match(k)).collect())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let existed = self.live_kind(key).await?.is_some();
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM kv_list_items WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(existed)
    }
}
