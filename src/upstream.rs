//! Upstream flight data sources.
//!
//! A [`FlightSource`] produces one [`Dataset`] per ingestion cycle. The
//! production source is the AviationStack-style REST API; [`StaticSource`]
//! serves a fixed dataset for tests and offline seeding.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use skycache_core::models::Dataset;

use crate::config::IngestConfig;

#[async_trait]
pub trait FlightSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Fetch a complete dataset.
    async fn fetch(&self) -> Result<Dataset>;
}

/// `GET {endpoint}?access_key=..&limit=..` returning the paginated envelope.
pub struct AviationStackSource {
    client: reqwest::Client,
    endpoint: String,
    access_key: String,
    limit: u32,
}

impl AviationStackSource {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let access_key = config.resolved_access_key().ok_or_else(|| {
            anyhow::anyhow!(
                "ingest.access_key is not set (or export {})",
                crate::config::ACCESS_KEY_ENV
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            access_key,
            limit: config.limit,
        })
    }
}

#[async_trait]
impl FlightSource for AviationStackSource {
    fn name(&self) -> &str {
        "aviationstack"
    }

    async fn fetch(&self) -> Result<Dataset> {
        let limit = self.limit.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("access_key", self.access_key.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .context("flights API request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("flights API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_response(json)
    }
}

/// Decode an API response body, surfacing an embedded `error` object.
pub fn parse_response(json: serde_json::Value) -> Result<Dataset> {
    if let Some(err) = json.get("error") {
        let code = err.get("code").and_then(|c| c.as_str()).unwrap_or("unknown");
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("no message");
        bail!("flights API returned error '{}': {}", code, message);
    }
    serde_json::from_value(json).context("Invalid flights API response")
}

/// Serves a fixed dataset.
pub struct StaticSource {
    dataset: Dataset,
}

impl StaticSource {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }

    /// Load a dataset from a JSON file in the API envelope format.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset file: {}", path.display()))?;
        let json: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Dataset file is not JSON: {}", path.display()))?;
        Ok(Self::new(parse_response(json)?))
    }
}

#[async_trait]
impl FlightSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<Dataset> {
        Ok(self.dataset.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_envelope() {
        let ds = parse_response(json!({
            "pagination": {"limit": 1, "offset": 0, "count": 1, "total": 9},
            "data": [{"airline": {"iata": "FR"}}]
        }))
        .unwrap();
        assert_eq!(ds.data.len(), 1);
        assert_eq!(ds.pagination.total, 9);
    }

    #[test]
    fn test_parse_api_error() {
        let err = parse_response(json!({
            "error": {"code": "invalid_access_key", "message": "You have not supplied a valid API Access Key."}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("invalid_access_key"));
    }

    #[test]
    fn test_missing_access_key_is_an_error() {
        if std::env::var(crate::config::ACCESS_KEY_ENV).is_ok() {
            return;
        }
        assert!(AviationStackSource::new(&IngestConfig::default()).is_err());
    }

    #[test]
    fn test_static_source_from_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), r#"{"data":[{"airline":{"iata":"MU"}}]}"#).unwrap();
        let source = StaticSource::from_file(tmp.path()).unwrap();
        let ds = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(source.fetch())
            .unwrap();
        assert_eq!(ds.data[0].airline.iata.as_deref(), Some("MU"));
    }
}
