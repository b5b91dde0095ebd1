//! Filtered query resolution with version-scoped result caching.
//!
//! A query key embeds the current version token, so publishing a new
//! snapshot makes every earlier cache entry unreachable; nothing is ever
//! invalidated explicitly. Resolution order:
//!
//! 1. cache hit on `{prefix}:q:{airline}:{airport}:{version}:{fingerprint}`,
//! 2. structured-path read against the canonical document,
//! 3. full canonical read plus in-memory filtering.
//!
//! Computed results are written back with the query TTL. Store errors on
//! the read paths only move resolution to the next path; the caller sees
//! either a result (possibly empty) or [`Resolution::NotFound`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use skycache_core::filter::FlightFilter;
use skycache_core::keys::{KeySpace, VERSION_SENTINEL};
use skycache_core::normalize::normalize;
use skycache_core::path::JsonPath;
use skycache_core::store::DocumentStore;

/// Result of resolving a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Matching records, possibly none.
    Found(Value),
    /// No canonical dataset is available.
    NotFound,
}

impl Resolution {
    pub fn into_found(self) -> Option<Value> {
        match self {
            Resolution::Found(v) => Some(v),
            Resolution::NotFound => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Resolution::NotFound)
    }
}

/// Which read path produced a freshly computed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Path,
    Document,
}

pub struct QueryResolver {
    store: Arc<dyn DocumentStore>,
    keys: KeySpace,
    ttl: Duration,
}

impl QueryResolver {
    pub fn new(store: Arc<dyn DocumentStore>, keys: KeySpace, ttl: Duration) -> Self {
        Self { store, keys, ttl }
    }

    /// Current version token, or the sentinel when none is readable.
    pub async fn current_version(&self) -> String {
        match self.store.get_string(&self.keys.version()).await {
            Ok(Some(v)) => v,
            Ok(None) => VERSION_SENTINEL.to_string(),
            Err(e) => {
                warn!(error = %e, "version read failed, using sentinel");
                VERSION_SENTINEL.to_string()
            }
        }
    }

    /// Cache key for `filter` under the current version.
    pub async fn cache_key(&self, filter: &FlightFilter) -> String {
        let version = self.current_version().await;
        self.keys.query(filter, &version)
    }

    pub async fn resolve(&self, filter: &FlightFilter) -> Resolution {
        let cache_key = self.cache_key(filter).await;

        if let Some(hit) = self.cached(&cache_key).await {
            debug!(key = %cache_key, "query cache hit");
            return Resolution::Found(hit);
        }

        let computed = match self.read_by_path(filter).await {
            Some(result) => Some((result, Source::Path)),
            None => self
                .read_whole_document(filter)
                .await
                .map(|result| (result, Source::Document)),
        };

        let Some((result, source)) = computed else {
            debug!(key = %cache_key, "no canonical dataset");
            return Resolution::NotFound;
        };
        debug!(key = %cache_key, ?source, "query resolved");

        self.store_result(&cache_key, &result).await;
        Resolution::Found(result)
    }

    /// Delete query cache entries that belong to an older version.
    ///
    /// Stale entries are unreachable anyway and expire on their own; this
    /// only reclaims store memory sooner. Returns the number deleted.
    pub async fn sweep_stale_queries(&self) -> anyhow::Result<usize> {
        let version = self.current_version().await;
        let mut removed = 0;
        for key in self.store.keys(&self.keys.query_pattern()).await? {
            let stale = match self.keys.query_key_version(&key) {
                Some(v) => v != version,
                None => false,
            };
            if stale && self.store.delete(&key).await? {
                removed += 1;
            }
        }
        debug!(removed, version = %version, "swept stale query cache entries");
        Ok(removed)
    }

    async fn cached(&self, cache_key: &str) -> Option<Value> {
        match self.store.json_get(cache_key).await {
            Ok(Some(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(value) => Some(normalize(value)),
                Err(e) => {
                    warn!(key = %cache_key, error = %e, "unreadable cache entry, recomputing");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %cache_key, error = %e, "cache read failed");
                None
            }
        }
    }

    async fn read_by_path(&self, filter: &FlightFilter) -> Option<Value> {
        let path = JsonPath::for_filter(filter);
        let canonical = self.keys.canonical();
        match self.store.json_get_path(&canonical, &path).await {
            Ok(Some(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Null) => None,
                Ok(value) => Some(normalize(value)),
                Err(e) => {
                    debug!(error = %e, "structured read returned invalid JSON");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(path = %path, error = %e, "structured read unavailable, falling back");
                None
            }
        }
    }

    async fn read_whole_document(&self, filter: &FlightFilter) -> Option<Value> {
        let canonical = self.keys.canonical();
        let text = match self.store.json_get(&canonical).await {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %canonical, error = %e, "canonical read failed");
                return None;
            }
        };
        let document: Value = match serde_json::from_str(&text) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(key = %canonical, error = %e, "canonical document is not valid JSON");
                return None;
            }
        };
        filter.apply_to_document(&document).map(Value::Array)
    }

    async fn store_result(&self, cache_key: &str, result: &Value) {
        let text = result.to_string();
        if let Err(e) = self.store.json_set(cache_key, &text).await {
            warn!(key = %cache_key, error = %e, "cache write failed");
            return;
        }
        if let Err(e) = self.store.expire(cache_key, self.ttl).await {
            warn!(key = %cache_key, error = %e, "cache expiry failed");
        }
    }
}
