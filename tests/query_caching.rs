//! End-to-end behavior of publishing and filtered query resolution over the
//! in-memory store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use skycache::config::TtlConfig;
use skycache::publisher::{PublishTtls, SnapshotPublisher};
use skycache::resolver::{QueryResolver, Resolution};
use skycache_core::filter::FlightFilter;
use skycache_core::keys::KeySpace;
use skycache_core::models::{Dataset, FlightRecord};
use skycache_core::store::memory::InMemoryStore;
use skycache_core::store::DocumentStore;

fn sample() -> Dataset {
    Dataset::with_records(vec![
        FlightRecord::route("MU", "PVG", "CDG"),
        FlightRecord::route("FR", "DUB", "STN"),
        FlightRecord::route("AF", "CDG", "OTP"),
        FlightRecord::route("RO", "OTP", "LHR"),
    ])
}

fn wire(store: Arc<InMemoryStore>) -> (SnapshotPublisher, QueryResolver) {
    let ttl = TtlConfig::default();
    let publisher = SnapshotPublisher::new(
        store.clone(),
        KeySpace::default(),
        PublishTtls::from(&ttl),
    );
    let resolver = QueryResolver::new(store, KeySpace::default(), ttl.query());
    (publisher, resolver)
}

fn airlines(found: &Value) -> Vec<String> {
    found
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["airline"]["iata"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_repeat_query_is_served_from_cache() {
    let store = Arc::new(InMemoryStore::counting());
    let (publisher, resolver) = wire(store.clone());
    publisher.publish(sample()).await;

    let filter = FlightFilter::new(Some("MU"), None);
    let first = resolver.resolve(&filter).await;
    let reads_after_first = store.read_count("flights:last");
    assert!(reads_after_first > 0);

    let second = resolver.resolve(&filter).await;
    assert_eq!(first, second);
    assert_eq!(store.read_count("flights:last"), reads_after_first);
}

#[tokio::test]
async fn test_cached_result_carries_query_ttl() {
    let store = Arc::new(InMemoryStore::new());
    let (publisher, resolver) = wire(store.clone());
    publisher.publish(sample()).await;

    let filter = FlightFilter::new(None, Some("CDG"));
    resolver.resolve(&filter).await;
    let key = resolver.cache_key(&filter).await;
    let ttl = store.ttl(&key).unwrap();
    assert!(ttl <= Duration::from_secs(1800));
    assert!(ttl > Duration::from_secs(1700));
}

#[tokio::test]
async fn test_new_publish_rolls_the_version() {
    let store = Arc::new(InMemoryStore::new());
    let (publisher, resolver) = wire(store.clone());
    let filter = FlightFilter::new(Some("MU"), None);

    let t1 = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
    publisher.publish_at(sample(), t1).await;
    let old_key = resolver.cache_key(&filter).await;
    let old = resolver.resolve(&filter).await.into_found().unwrap();
    assert_eq!(old.as_array().unwrap().len(), 1);

    let t2 = Utc.with_ymd_and_hms(2025, 6, 1, 10, 50, 0).unwrap();
    let mut next = sample();
    next.data.push(FlightRecord::route("MU", "PEK", "FRA"));
    publisher.publish_at(next, t2).await;

    let new_key = resolver.cache_key(&filter).await;
    assert_ne!(old_key, new_key);
    assert!(new_key.contains(&t2.timestamp().to_string()));
    let fresh = resolver.resolve(&filter).await.into_found().unwrap();
    assert_eq!(fresh.as_array().unwrap().len(), 2);

    // The old entry is unreachable but untouched.
    assert!(store.json_get(&old_key).await.unwrap().is_some());
}

#[tokio::test]
async fn test_airline_and_airport_are_or_combined() {
    let store = Arc::new(InMemoryStore::new());
    let (publisher, resolver) = wire(store);
    publisher.publish(sample()).await;

    let found = resolver
        .resolve(&FlightFilter::new(Some("MU"), Some("OTP")))
        .await
        .into_found()
        .unwrap();
    assert_eq!(airlines(&found), vec!["MU", "AF", "RO"]);
}

#[tokio::test]
async fn test_unfiltered_query_returns_everything_in_order() {
    let store = Arc::new(InMemoryStore::new());
    let (publisher, resolver) = wire(store);
    publisher.publish(sample()).await;

    let found = resolver
        .resolve(&FlightFilter::all())
        .await
        .into_found()
        .unwrap();
    assert_eq!(airlines(&found), vec!["MU", "FR", "AF", "RO"]);
}

#[tokio::test]
async fn test_codes_are_normalized_before_keying() {
    let store = Arc::new(InMemoryStore::new());
    let (publisher, resolver) = wire(store);
    publisher.publish(sample()).await;

    let loose = FlightFilter::new(Some(" mu "), Some("cdg"));
    let strict = FlightFilter::new(Some("MU"), Some("CDG"));
    assert_eq!(
        resolver.cache_key(&loose).await,
        resolver.cache_key(&strict).await
    );
    assert_eq!(
        resolver.resolve(&loose).await,
        resolver.resolve(&strict).await
    );
}

#[tokio::test]
async fn test_unmatched_code_is_empty_not_missing() {
    let store = Arc::new(InMemoryStore::new());
    let (publisher, resolver) = wire(store.clone());
    let filter = FlightFilter::new(Some("ZZ"), None);

    assert_eq!(resolver.resolve(&filter).await, Resolution::NotFound);

    publisher.publish(sample()).await;
    assert_eq!(resolver.resolve(&filter).await, Resolution::Found(json!([])));
}

#[tokio::test]
async fn test_document_fallback_matches_path_reads() {
    let with_path = Arc::new(InMemoryStore::new());
    let without_path = Arc::new(InMemoryStore::without_path_support());
    let (pub_a, res_a) = wire(with_path);
    let (pub_b, res_b) = wire(without_path);
    let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    pub_a.publish_at(sample(), at).await;
    pub_b.publish_at(sample(), at).await;

    for (airline, airport) in [
        (None, None),
        (Some("MU"), None),
        (None, Some("OTP")),
        (Some("FR"), Some("CDG")),
        (Some("ZZ"), None),
    ] {
        let filter = FlightFilter::new(airline, airport);
        assert_eq!(
            res_a.resolve(&filter).await,
            res_b.resolve(&filter).await,
            "airline={:?} airport={:?}",
            airline,
            airport
        );
    }
}

#[tokio::test]
async fn test_sweep_removes_only_stale_entries() {
    let store = Arc::new(InMemoryStore::new());
    let (publisher, resolver) = wire(store.clone());

    publisher
        .publish_at(sample(), Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
        .await;
    resolver.resolve(&FlightFilter::new(Some("MU"), None)).await;
    resolver.resolve(&FlightFilter::all()).await;

    publisher
        .publish_at(sample(), Utc.with_ymd_and_hms(2025, 6, 1, 1, 0, 0).unwrap())
        .await;
    resolver.resolve(&FlightFilter::all()).await;

    assert_eq!(store.keys("flights:q:*").await.unwrap().len(), 3);
    assert_eq!(resolver.sweep_stale_queries().await.unwrap(), 2);
    let remaining = store.keys("flights:q:*").await.unwrap();
    assert_eq!(remaining, vec![resolver.cache_key(&FlightFilter::all()).await]);
}

#[tokio::test]
async fn test_sweep_handles_codes_containing_separator() {
    let store = Arc::new(InMemoryStore::new());
    let (publisher, resolver) = wire(store.clone());
    let odd = FlightFilter::new(Some("A:B"), None);

    publisher
        .publish_at(sample(), Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
        .await;
    assert_eq!(resolver.resolve(&odd).await, Resolution::Found(json!([])));
    let stale = resolver.cache_key(&odd).await;

    publisher
        .publish_at(sample(), Utc.with_ymd_and_hms(2025, 6, 1, 1, 0, 0).unwrap())
        .await;
    assert_eq!(resolver.sweep_stale_queries().await.unwrap(), 1);
    assert!(store.json_get(&stale).await.unwrap().is_none());
}
