//! Snapshot history: the daily index lists and the snapshots they reference.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::Value;

use skycache_core::keys::KeySpace;
use skycache_core::store::DocumentStore;

pub struct SnapshotHistory {
    store: Arc<dyn DocumentStore>,
    keys: KeySpace,
}

impl SnapshotHistory {
    pub fn new(store: Arc<dyn DocumentStore>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Snapshot keys published on `date`, oldest first.
    ///
    /// Keys whose snapshot has already expired are still listed until the
    /// index itself expires.
    pub async fn list(&self, date: NaiveDate) -> Result<Vec<String>> {
        self.store.list_range(&self.keys.index(date)).await
    }

    /// A stored snapshot, if it has not expired.
    pub async fn load(&self, snapshot_key: &str) -> Result<Option<Value>> {
        let Some(text) = self.store.json_get(snapshot_key).await? else {
            return Ok(None);
        };
        let doc = serde_json::from_str(&text)
            .with_context(|| format!("snapshot '{}' is not valid JSON", snapshot_key))?;
        Ok(Some(doc))
    }
}
