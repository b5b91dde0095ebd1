//! Runs the `skycache` binary against a temporary SQLite database.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("config")).unwrap();

    fs::write(
        root.join("flights.json"),
        r#"{
  "pagination": {"limit": 3, "offset": 0, "count": 3, "total": 3},
  "data": [
    {"flight_date": "2025-06-01", "airline": {"name": "China Eastern", "iata": "MU"},
     "departure": {"iata": "PVG"}, "arrival": {"iata": "CDG"}},
    {"flight_date": "2025-06-01", "airline": {"name": "Ryanair", "iata": "FR"},
     "departure": {"iata": "DUB"}, "arrival": {"iata": "STN"}},
    {"flight_date": "2025-06-01", "airline": {"name": "TAROM", "iata": "RO"},
     "departure": {"iata": "OTP"}, "arrival": {"iata": "CDG"}}
  ]
}"#,
    )
    .unwrap();

    let config_path = root.join("config").join("skycache.toml");
    fs::write(
        &config_path,
        format!(
            r#"[store]
backend = "sqlite"
path = "{}/data/skycache.sqlite"

[keys]
prefix = "flights"

[sink]
enabled = true
"#,
            root.display()
        ),
    )
    .unwrap();

    (tmp, config_path)
}

fn run(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_skycache"))
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("SKYCACHE_ACCESS_KEY")
        .env_remove("SKYCACHE_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run skycache: {}", e));

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_init_is_idempotent() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, stderr, ok) = run(&config_path, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("initialized"));
    assert!(run(&config_path, &["init"]).2);
}

#[test]
fn test_query_before_ingest_fails() {
    let (_tmp, config_path) = setup_test_env();
    run(&config_path, &["init"]);
    let (_, stderr, ok) = run(&config_path, &["query", "--airline", "MU"]);
    assert!(!ok);
    assert!(stderr.contains("no flight dataset"));
}

#[test]
fn test_ingest_from_file_then_query() {
    let (tmp, config_path) = setup_test_env();
    let dataset = tmp.path().join("flights.json");

    let (stdout, stderr, ok) = run(
        &config_path,
        &["ingest", "--from", dataset.to_str().unwrap()],
    );
    assert!(ok, "ingest failed: {}", stderr);
    assert!(stdout.contains("records: 3"));

    let (stdout, stderr, ok) = run(&config_path, &["query", "--airport", "cdg"]);
    assert!(ok, "query failed: {}", stderr);
    let found: Value = serde_json::from_str(&stdout).unwrap();
    let airlines: Vec<&str> = found
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["airline"]["iata"].as_str().unwrap())
        .collect();
    assert_eq!(airlines, vec!["MU", "RO"]);

    let (stdout, _, ok) = run(&config_path, &["keys", "flights:q:*"]);
    assert!(ok);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.starts_with("flights:q:_:CDG:"));

    let (stdout, _, ok) = run(&config_path, &["snapshots"]);
    assert!(ok);
    assert!(stdout.starts_with("flights:snapshot:"));
}

#[test]
fn test_set_then_get() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, ok) = run(&config_path, &["set", "manual:seed", r#"{"data":[]}"#]);
    assert!(ok, "set failed: {}", stderr);

    let (stdout, _, ok) = run(&config_path, &["get", "manual:seed"]);
    assert!(ok);
    let value: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["data"], serde_json::json!([]));

    let (_, _, ok) = run(&config_path, &["get", "manual:absent"]);
    assert!(!ok);
}

#[test]
fn test_set_rejects_invalid_json() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, ok) = run(&config_path, &["set", "k", "{oops"]);
    assert!(!ok);
    assert!(stderr.contains("valid JSON"));
}

#[test]
fn test_ingest_without_access_key_fails() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, ok) = run(&config_path, &["ingest"]);
    assert!(!ok);
    assert!(stderr.contains("access_key"));
}

#[test]
fn test_sweep_reports_count() {
    let (tmp, config_path) = setup_test_env();
    let dataset = tmp.path().join("flights.json");
    run(&config_path, &["ingest", "--from", dataset.to_str().unwrap()]);
    run(&config_path, &["query"]);

    let (stdout, _, ok) = run(&config_path, &["sweep"]);
    assert!(ok);
    assert!(stdout.contains("removed 0"));
}

#[tokio::test]
async fn test_every_ingest_records_its_payload() {
    let (tmp, config_path) = setup_test_env();
    let dataset = tmp.path().join("flights.json");
    for _ in 0..5 {
        let (_, stderr, ok) = run(&config_path, &["ingest", "--from", dataset.to_str().unwrap()]);
        assert!(ok, "ingest failed: {}", stderr);
    }

    let pool = skycache::db::connect_path(&tmp.path().join("data").join("skycache.sqlite"))
        .await
        .unwrap();
    let counts: Vec<i64> = sqlx::query_scalar("SELECT record_count FROM raw_payloads")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(counts, vec![3; 5]);
    pool.close().await;
}
