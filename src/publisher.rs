//! Snapshot publishing.
//!
//! One publish per ingestion cycle writes, in order:
//!
//! 1. the canonical document `{prefix}:last` (expires after the canonical TTL),
//! 2. an immutable snapshot `{prefix}:snapshot:{ts}` (expires after the retention horizon),
//! 3. the snapshot key appended to `{prefix}:index:{date}` (same horizon),
//! 4. a fresh version token at `{prefix}:version` (never expires).
//!
//! The dataset is serialized once and the same bytes are written to the
//! canonical and snapshot keys. Each store operation is independent: a
//! failing step is logged and recorded in the [`PublishResult`] and the
//! remaining steps still run. The next cycle is the retry.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use skycache_core::keys::{self, KeySpace};
use skycache_core::models::Dataset;
use skycache_core::store::DocumentStore;

use crate::config::TtlConfig;

/// A store operation that failed during a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: &'static str,
    pub key: String,
    pub message: String,
}

/// Outcome of one publish.
#[derive(Debug, Clone)]
pub struct PublishResult {
    pub canonical_key: String,
    pub snapshot_key: String,
    pub index_key: String,
    pub version: String,
    pub records: usize,
    pub failures: Vec<StepFailure>,
}

impl PublishResult {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// TTLs applied by the publisher.
#[derive(Debug, Clone, Copy)]
pub struct PublishTtls {
    pub canonical: Duration,
    pub snapshot: Duration,
    pub index: Duration,
}

impl From<&TtlConfig> for PublishTtls {
    fn from(ttl: &TtlConfig) -> Self {
        Self {
            canonical: ttl.canonical(),
            snapshot: ttl.snapshot(),
            index: ttl.index(),
        }
    }
}

/// Writes datasets as canonical document, snapshot, index entry and version.
pub struct SnapshotPublisher {
    store: Arc<dyn DocumentStore>,
    keys: KeySpace,
    ttls: PublishTtls,
}

impl SnapshotPublisher {
    pub fn new(store: Arc<dyn DocumentStore>, keys: KeySpace, ttls: PublishTtls) -> Self {
        Self { store, keys, ttls }
    }

    /// Publish `dataset` stamped with the current time.
    pub async fn publish(&self, dataset: Dataset) -> PublishResult {
        self.publish_at(dataset, Utc::now()).await
    }

    /// Publish `dataset` as of `now`. Keys and the version token derive from `now`.
    pub async fn publish_at(&self, mut dataset: Dataset, now: DateTime<Utc>) -> PublishResult {
        dataset.ingested_at = Some(now);

        let canonical_key = self.keys.canonical();
        let snapshot_key = self.keys.snapshot(now);
        let index_key = self.keys.index_at(now);
        let version_key = self.keys.version();
        let version = keys::version_token(now);

        let mut result = PublishResult {
            canonical_key: canonical_key.clone(),
            snapshot_key: snapshot_key.clone(),
            index_key: index_key.clone(),
            version: version.clone(),
            records: dataset.data.len(),
            failures: Vec::new(),
        };

        let serialized = match serde_json::to_string(&dataset) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to serialize dataset, skipping document writes");
                result.failures.push(StepFailure {
                    step: "serialize",
                    key: canonical_key.clone(),
                    message: e.to_string(),
                });
                String::new()
            }
        };
        let store = self.store.as_ref();

        if !serialized.is_empty() {
            step(
                &mut result,
                "canonical_set",
                &canonical_key,
                store.json_set(&canonical_key, &serialized),
            )
            .await;
            step(
                &mut result,
                "canonical_expire",
                &canonical_key,
                store.expire(&canonical_key, self.ttls.canonical),
            )
            .await;

            step(
                &mut result,
                "snapshot_set",
                &snapshot_key,
                store.json_set(&snapshot_key, &serialized),
            )
            .await;
            step(
                &mut result,
                "snapshot_expire",
                &snapshot_key,
                store.expire(&snapshot_key, self.ttls.snapshot),
            )
            .await;

            step(
                &mut result,
                "index_push",
                &index_key,
                store.list_push(&index_key, &snapshot_key),
            )
            .await;
            step(
                &mut result,
                "index_expire",
                &index_key,
                store.expire(&index_key, self.ttls.index),
            )
            .await;
        }

        step(
            &mut result,
            "version_set",
            &version_key,
            store.set_string(&version_key, &version),
        )
        .await;

        if result.is_clean() {
            info!(
                snapshot = %result.snapshot_key,
                version = %result.version,
                records = result.records,
                "published snapshot"
            );
        } else {
            warn!(
                snapshot = %result.snapshot_key,
                version = %result.version,
                failed_steps = result.failures.len(),
                "published snapshot with failures"
            );
        }
        result
    }
}

async fn step<T>(
    result: &mut PublishResult,
    name: &'static str,
    key: &str,
    op: impl Future<Output = Result<T>>,
) {
    match op.await {
        Ok(_) => debug!(step = name, key = %key, "publish step ok"),
        Err(e) => {
            warn!(step = name, key = %key, error = %e, "publish step failed");
            result.failures.push(StepFailure {
                step: name,
                key: key.to_string(),
                message: e.to_string(),
            });
        }
    }
}
