//! In-memory [`DocumentStore`] implementation for tests and single-process use.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Expiry deadlines are
//! checked lazily: an expired entry is invisible and dropped on the next
//! write to the map. Structured-path reads are evaluated in process and
//! returned as a singly-wrapped array, the shape JSONPath engines produce.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::path::JsonPath;

use super::{compile_pattern, DocumentStore};

#[derive(Debug, Clone)]
enum Stored {
    Json(String),
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Stored,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Stored) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

/// In-memory store for tests and single-process deployments.
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    /// Per-key document read counts, only kept by [`InMemoryStore::counting`].
    reads: Option<Mutex<HashMap<String, u64>>>,
    path_support: bool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            reads: None,
            path_support: true,
        }
    }

    /// A store that records document reads per key, for [`read_count`](Self::read_count).
    ///
    /// Counters follow their key: deleting or expiring the key drops it.
    pub fn counting() -> Self {
        Self {
            reads: Some(Mutex::new(HashMap::new())),
            ..Self::new()
        }
    }

    /// A store that rejects structured-path reads.
    pub fn without_path_support() -> Self {
        Self {
            path_support: false,
            ..Self::new()
        }
    }

    /// Number of document reads (`json_get` and `json_get_path`) served for
    /// `key`. Always 0 unless the store was built with [`counting`](Self::counting).
    pub fn read_count(&self, key: &str) -> u64 {
        self.reads
            .as_ref()
            .and_then(|reads| reads.lock().ok().map(|r| r.get(key).copied().unwrap_or(0)))
            .unwrap_or(0)
    }

    /// Number of keys holding a read counter.
    pub fn counted_keys(&self) -> usize {
        self.reads
            .as_ref()
            .and_then(|reads| reads.lock().ok().map(|r| r.len()))
            .unwrap_or(0)
    }

    /// Remaining time-to-live of `key`, if it is live and has one.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let entries = self.entries.read().ok()?;
        let now = Instant::now();
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    fn count_read(&self, key: &str) {
        if let Some(Ok(mut reads)) = self.reads.as_ref().map(Mutex::lock) {
            *reads.entry(key.to_string()).or_insert(0) += 1;
        }
    }

    fn forget_reads<'a>(&self, keys: impl IntoIterator<Item = &'a String>) {
        if let Some(Ok(mut reads)) = self.reads.as_ref().map(Mutex::lock) {
            for key in keys {
                reads.remove(key);
            }
        }
    }

    fn live(&self, key: &str) -> Result<Option<Stored>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value.clone()))
    }

    fn write<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> T) -> Result<T> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let now = Instant::now();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| !e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        self.forget_reads(&expired);
        Ok(f(&mut entries))
    }

    fn read_json(&self, key: &str) -> Result<Option<String>> {
        self.count_read(key);
        match self.live(key)? {
            Some(Stored::Json(json)) => Ok(Some(json)),
            Some(_) => bail!("key '{}' does not hold a JSON document", key),
            None => Ok(None),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn json_get(&self, key: &str) -> Result<Option<String>> {
        self.read_json(key)
    }

    async fn json_get_path(&self, key: &str, path: &JsonPath) -> Result<Option<String>> {
        if !self.path_support {
            bail!("structured path reads are disabled for this store");
        }
        let Some(json) = self.read_json(key)? else {
            return Ok(None);
        };
        let document: serde_json::Value = serde_json::from_str(&json)?;
        let wrapped = path.select(&document).map(|hits| {
            serde_json::Value::Array(vec![serde_json::Value::Array(hits)]).to_string()
        });
        Ok(wrapped)
    }

    async fn json_set(&self, key: &str, json: &str) -> Result<()> {
        serde_json::from_str::<serde_json::Value>(json)?;
        self.write(|entries| {
            entries.insert(key.to_string(), Entry::new(Stored::Json(json.to_string())));
        })
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.live(key)? {
            Some(Stored::Text(text)) => Ok(Some(text)),
            Some(_) => bail!("key '{}' does not hold a string", key),
            None => Ok(None),
        }
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.write(|entries| {
            entries.insert(key.to_string(), Entry::new(Stored::Text(value.to_string())));
        })
    }

    async fn list_push(&self, key: &str, item: &str) -> Result<u64> {
        self.write(|entries| {
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::new(Stored::List(Vec::new())));
            match &mut entry.value {
                Stored::List(items) => {
                    items.push(item.to_string());
                    Ok(items.len() as u64)
                }
                _ => Err(anyhow!("key '{}' does not hold a list", key)),
            }
        })?
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        match self.live(key)? {
            Some(Stored::List(items)) => Ok(items),
            Some(_) => bail!("key '{}' does not hold a list", key),
            None => Ok(Vec::new()),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.write(|entries| match entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                true
            }
            None => false,
        })
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = compile_pattern(pattern)?;
        let entries = self.entries.read().map_err(|_| poisoned())?;
        let now = Instant::now();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(k, e)| e.is_live(now) && matcher.is_match(k.as_str()))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let existed = self.write(|entries| entries.remove(key).is_some())?;
        self.forget_reads([&key.to_string()]);
        Ok(existed)
    }
}
