//! Raw key access for operational inspection and manual seeding.
//!
//! Not part of the query protocol: reads and writes whole values with no
//! filtering. `list_keys` scans the whole keyspace and is meant for
//! low-volume use with a scoped pattern.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;

use skycache_core::store::DocumentStore;

pub struct KeyAccess {
    store: Arc<dyn DocumentStore>,
}

impl KeyAccess {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Value at `key`, or `None` if absent.
    ///
    /// JSON documents are returned parsed; string keys (such as the version
    /// marker) come back as JSON strings and lists as arrays of strings.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        if let Ok(found) = self.store.json_get(key).await {
            return match found {
                Some(text) => Ok(Some(
                    serde_json::from_str(&text)
                        .with_context(|| format!("stored value at '{}' is not JSON", key))?,
                )),
                None => Ok(None),
            };
        }
        if let Ok(Some(text)) = self.store.get_string(key).await {
            return Ok(Some(Value::String(text)));
        }
        let items = self
            .store
            .list_range(key)
            .await
            .with_context(|| format!("failed to read key '{}'", key))?;
        Ok(Some(Value::Array(
            items.into_iter().map(Value::String).collect(),
        )))
    }

    /// Store `value` as a JSON document at `key`.
    pub async fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.store
            .json_set(key, &value.to_string())
            .await
            .with_context(|| format!("failed to write key '{}'", key))
    }

    pub async fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.store.keys(pattern).await
    }
}
