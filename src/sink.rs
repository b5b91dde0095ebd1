//! Relational sink for raw payloads.
//!
//! Every fetched payload is recorded in `raw_payloads` for durable
//! storage. The ingestion cycle never waits on or depends on the sink;
//! writes run in the background through a [`SinkWriter`], which
//! [`App::close`](crate::app::App::close) drains before the pool closes.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::task::JoinSet;
use tracing::warn;
use uuid::Uuid;

#[async_trait]
pub trait PayloadSink: Send + Sync {
    /// Record one serialized dataset containing `record_count` flights.
    async fn record(&self, payload: &str, record_count: usize) -> Result<()>;
}

/// Sink that discards everything.
pub struct NullSink;

#[async_trait]
impl PayloadSink for NullSink {
    async fn record(&self, _payload: &str, _record_count: usize) -> Result<()> {
        Ok(())
    }
}

pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM raw_payloads")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl PayloadSink for SqliteSink {
    async fn record(&self, payload: &str, record_count: usize) -> Result<()> {
        sqlx::query(
            "INSERT INTO raw_payloads (id, received_at, record_count, payload) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(chrono::Utc::now().timestamp())
        .bind(record_count as i64)
        .bind(payload)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Background writer in front of a [`PayloadSink`].
///
/// Writes are spawned onto the runtime and tracked so that shutdown can
/// wait for them instead of losing them with the runtime.
pub struct SinkWriter {
    sink: Arc<dyn PayloadSink>,
    tasks: Mutex<JoinSet<()>>,
}

impl SinkWriter {
    pub fn new(sink: Arc<dyn PayloadSink>) -> Self {
        Self {
            sink,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Start recording `payload` without waiting for it.
    pub fn submit(&self, payload: String, record_count: usize) {
        let sink = self.sink.clone();
        let mut tasks = match self.tasks.lock() {
            Ok(tasks) => tasks,
            Err(poisoned) => poisoned.into_inner(),
        };
        while let Some(done) = tasks.try_join_next() {
            log_join_error(done);
        }
        tasks.spawn(async move {
            if let Err(e) = sink.record(&payload, record_count).await {
                warn!(error = %e, "sink write failed");
            }
        });
    }

    /// Writes started and not yet reaped.
    pub fn pending(&self) -> usize {
        match self.tasks.lock() {
            Ok(tasks) => tasks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Wait for every write submitted so far.
    pub async fn drain(&self) {
        let mut tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        while let Some(done) = tasks.join_next().await {
            log_join_error(done);
        }
    }
}

fn log_join_error(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        warn!(error = %e, "sink task did not complete");
    }
}
