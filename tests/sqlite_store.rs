//! SQLite-backed document store against a temporary database file.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

use skycache::config::TtlConfig;
use skycache::db;
use skycache::migrate;
use skycache::publisher::{PublishTtls, SnapshotPublisher};
use skycache::resolver::QueryResolver;
use skycache::sink::{PayloadSink, SqliteSink};
use skycache::sqlite_store::SqliteStore;
use skycache_core::filter::FlightFilter;
use skycache_core::keys::KeySpace;
use skycache_core::models::{Dataset, FlightRecord};
use skycache_core::path::JsonPath;
use skycache_core::store::DocumentStore;

async fn open() -> (TempDir, SqliteStore) {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect_path(&tmp.path().join("store.sqlite"))
        .await
        .unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    (tmp, SqliteStore::new(pool))
}

fn document() -> String {
    json!({
        "pagination": {"limit": 3, "offset": 0, "count": 3, "total": 3},
        "data": [
            {"airline": {"iata": "MU"}, "departure": {"iata": "PVG"}, "arrival": {"iata": "CDG"}},
            {"airline": {"iata": "FR"}, "departure": {"iata": "DUB"}, "arrival": {"iata": "STN"}},
            {"airline": {"iata": "AF"}, "departure": {"iata": "CDG"}, "arrival": {"iata": "OTP"}}
        ]
    })
    .to_string()
}

#[tokio::test]
async fn test_json_roundtrip_and_missing_key() {
    let (_tmp, store) = open().await;
    assert_eq!(store.json_get("flights:last").await.unwrap(), None);

    store.json_set("flights:last", &document()).await.unwrap();
    let back: Value = serde_json::from_str(&store.json_get("flights:last").await.unwrap().unwrap())
        .unwrap();
    assert_eq!(back["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_json_set_rejects_invalid_json() {
    let (_tmp, store) = open().await;
    assert!(store.json_set("k", "{not json").await.is_err());
}

#[tokio::test]
async fn test_path_read_filters_with_or() {
    let (_tmp, store) = open().await;
    store.json_set("flights:last", &document()).await.unwrap();

    let path = JsonPath::for_filter(&FlightFilter::new(Some("FR"), Some("OTP")));
    let text = store
        .json_get_path("flights:last", &path)
        .await
        .unwrap()
        .unwrap();
    let hits: Value = serde_json::from_str(&text).unwrap();
    let airlines: Vec<&str> = hits
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["airline"]["iata"].as_str().unwrap())
        .collect();
    assert_eq!(airlines, vec!["FR", "AF"]);
}

#[tokio::test]
async fn test_path_read_without_data_array() {
    let (_tmp, store) = open().await;
    store.json_set("doc", r#"{"other": 1}"#).await.unwrap();
    let path = JsonPath::for_filter(&FlightFilter::all());
    assert_eq!(store.json_get_path("doc", &path).await.unwrap(), None);
    assert_eq!(store.json_get_path("missing", &path).await.unwrap(), None);
}

#[tokio::test]
async fn test_strings_lists_and_kind_mismatch() {
    let (_tmp, store) = open().await;
    store.set_string("flights:version", "1700000000").await.unwrap();
    assert_eq!(
        store.get_string("flights:version").await.unwrap().as_deref(),
        Some("1700000000")
    );
    assert!(store.json_get("flights:version").await.is_err());

    assert_eq!(store.list_push("idx", "a").await.unwrap(), 1);
    assert_eq!(store.list_push("idx", "b").await.unwrap(), 2);
    assert_eq!(store.list_range("idx").await.unwrap(), vec!["a", "b"]);
    assert!(store.list_range("nothing").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_keys_disappear() {
    let (_tmp, store) = open().await;
    store.json_set("short", "{}").await.unwrap();
    assert!(store.expire("short", Duration::from_millis(50)).await.unwrap());
    assert!(!store.expire("absent", Duration::from_secs(5)).await.unwrap());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(store.json_get("short").await.unwrap(), None);
    assert!(store.keys("*").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_set_clears_expiry() {
    let (_tmp, store) = open().await;
    store.json_set("k", "{}").await.unwrap();
    store.expire("k", Duration::from_millis(50)).await.unwrap();
    store.json_set("k", "[]").await.unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(store.json_get("k").await.unwrap().as_deref(), Some("[]"));
}

#[tokio::test]
async fn test_keys_and_delete() {
    let (_tmp, store) = open().await;
    store.json_set("flights:last", "{}").await.unwrap();
    store.set_string("flights:version", "1").await.unwrap();
    store.list_push("flights:index:2025-01-01", "x").await.unwrap();
    store.json_set("other", "{}").await.unwrap();

    assert_eq!(
        store.keys("flights:*").await.unwrap(),
        vec![
            "flights:index:2025-01-01".to_string(),
            "flights:last".to_string(),
            "flights:version".to_string(),
        ]
    );
    assert!(store.delete("flights:index:2025-01-01").await.unwrap());
    assert!(!store.delete("flights:index:2025-01-01").await.unwrap());
    assert!(store.list_range("flights:index:2025-01-01").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_publish_and_resolve_over_sqlite() {
    let (_tmp, store) = open().await;
    let store: Arc<dyn DocumentStore> = Arc::new(store);
    let ttl = TtlConfig::default();
    let publisher = SnapshotPublisher::new(
        store.clone(),
        KeySpace::default(),
        PublishTtls::from(&ttl),
    );
    let resolver = QueryResolver::new(store.clone(), KeySpace::default(), ttl.query());

    let result = publisher
        .publish(Dataset::with_records(vec![
            FlightRecord::route("MU", "PVG", "CDG"),
            FlightRecord::route("FR", "DUB", "STN"),
        ]))
        .await;
    assert!(result.is_clean());

    let found = resolver
        .resolve(&FlightFilter::new(None, Some("stn")))
        .await
        .into_found()
        .unwrap();
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["airline"]["iata"], "FR");

    let cached = store
        .json_get(&resolver.cache_key(&FlightFilter::new(None, Some("STN"))).await)
        .await
        .unwrap();
    assert!(cached.is_some());
}

#[tokio::test]
async fn test_sink_records_payloads() {
    let (_tmp, store) = open().await;
    let sink = SqliteSink::new(store.pool().clone());
    sink.record(&document(), 3).await.unwrap();
    sink.record(r#"{"data":[]}"#, 0).await.unwrap();
    assert_eq!(sink.count().await.unwrap(), 2);
}
