//! Ingestion cycle and scheduler.
//!
//! One cycle fetches from the upstream source, hands the raw payload to
//! the relational sink, and publishes a snapshot. A failed fetch still
//! publishes (an empty dataset), so the version token always advances
//! once per cycle. The scheduler runs cycles on a fixed interval until
//! told to stop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use skycache_core::models::Dataset;

use crate::publisher::{PublishResult, SnapshotPublisher};
use crate::sink::SinkWriter;
use crate::upstream::FlightSource;

/// Run one fetch-and-publish cycle.
pub async fn run_cycle(
    source: &dyn FlightSource,
    publisher: &SnapshotPublisher,
    sink: &SinkWriter,
) -> PublishResult {
    let dataset = fetch_dataset(source).await;
    publish_dataset(publisher, sink, dataset).await
}

/// Fetch from `source`, substituting an empty dataset on failure.
async fn fetch_dataset(source: &dyn FlightSource) -> Dataset {
    match source.fetch().await {
        Ok(ds) => {
            info!(source = source.name(), records = ds.data.len(), "fetched dataset");
            ds
        }
        Err(e) => {
            warn!(source = source.name(), error = %e, "fetch failed, publishing empty dataset");
            Dataset::empty()
        }
    }
}

/// Hand the payload to the sink in the background, then publish.
async fn publish_dataset(
    publisher: &SnapshotPublisher,
    sink: &SinkWriter,
    dataset: Dataset,
) -> PublishResult {
    match serde_json::to_string(&dataset) {
        Ok(payload) => sink.submit(payload, dataset.data.len()),
        Err(e) => warn!(error = %e, "could not serialize payload for sink"),
    }
    publisher.publish(dataset).await
}

/// Run cycles every `interval`, starting immediately, until `shutdown`
/// becomes `true` or its sender is dropped. Returns the number of
/// completed cycles.
///
/// Shutdown abandons a cycle only while it is still fetching. Once
/// publishing has started the cycle runs to the end.
pub async fn run_scheduler(
    source: Arc<dyn FlightSource>,
    publisher: Arc<SnapshotPublisher>,
    sink: Arc<SinkWriter>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cycles = 0u64;

    info!(interval_secs = interval.as_secs(), "ingestion scheduler started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let Some(dataset) = fetch_or_stop(source.as_ref(), &mut shutdown).await else {
            warn!("shutdown during fetch, abandoning the cycle");
            break;
        };
        publish_dataset(&publisher, &sink, dataset).await;
        cycles += 1;
    }
    info!(cycles, "ingestion scheduler stopped");
    cycles
}

/// The fetched dataset, or `None` if shutdown arrived first.
async fn fetch_or_stop(
    source: &dyn FlightSource,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<Dataset> {
    let fetch = fetch_dataset(source);
    tokio::pin!(fetch);
    loop {
        tokio::select! {
            dataset = &mut fetch => return Some(dataset),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return None;
                }
            }
        }
    }
}
