//! Snapshot fetcher: download the published dataset with bounded retries and
//! stage the raw body in object storage.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use patient_common::ServiceClock;
use storage::ObjectStorage;

use crate::error::{IngestionError, Result};

/// National open-data endpoint for per-prefecture cumulative counts.
pub const DEFAULT_SOURCE_URL: &str = "https://opendata.corona.go.jp/api/Covid19JapanAll";

/// Configuration for the snapshot fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Source URL
    pub url: String,
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Wait after the first failure (doubles each retry)
    pub initial_wait: Duration,
    /// Upper bound on the wait between attempts
    pub max_wait: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            max_attempts: 3,
            initial_wait: Duration::from_secs(5),
            max_wait: Duration::from_secs(20),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// A snapshot written to object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedSnapshot {
    pub object_key: String,
    pub size: usize,
}

/// Downloads the dataset and stages it under a timestamp key.
pub struct SnapshotFetcher {
    client: Client,
    config: FetchConfig,
    storage: Arc<ObjectStorage>,
    clock: ServiceClock,
}

impl SnapshotFetcher {
    pub fn new(
        config: FetchConfig,
        storage: Arc<ObjectStorage>,
        clock: ServiceClock,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| IngestionError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            config,
            storage,
            clock,
        })
    }

    /// Fetch the body, retrying any transport failure or non-200 status.
    #[instrument(skip(self), fields(url = %self.config.url))]
    pub async fn fetch_body(&self) -> Result<Bytes> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.initial_wait;
        let mut attempt = 0;

        loop {
            attempt += 1;
            metrics::counter!("snapshot_fetch_attempts_total").increment(1);

            let last_error = match self.try_fetch().await {
                Ok(body) => {
                    info!(attempt, size = body.len(), "Fetched snapshot");
                    return Ok(body);
                }
                Err(e) => e,
            };

            if attempt >= max_attempts {
                return Err(IngestionError::Fetch {
                    attempts: attempt,
                    last_error,
                });
            }

            warn!(
                error = %last_error,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Fetch failed, retrying"
            );

            tokio::time::sleep(delay).await;
            delay = std::cmp::min(delay * 2, self.config.max_wait);
        }
    }

    async fn try_fetch(&self) -> std::result::Result<Bytes, String> {
        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(format!("HTTP {}", status));
        }

        response.bytes().await.map_err(|e| e.to_string())
    }

    /// Fetch the body and write it, unmodified, under the current timestamp.
    pub async fn fetch_snapshot(&self) -> Result<StagedSnapshot> {
        let body = self.fetch_body().await?;
        let object_key = self.clock.snapshot_key();
        let size = body.len();

        self.storage
            .put(&object_key, body)
            .await
            .map_err(|e| IngestionError::Staging(e.to_string()))?;

        info!(
            bucket = %self.storage.bucket(),
            object_key = %object_key,
            size,
            "Staged snapshot"
        );
        Ok(StagedSnapshot { object_key, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_policy() {
        let config = FetchConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_wait, Duration::from_secs(5));
        assert_eq!(config.max_wait, Duration::from_secs(20));
        assert_eq!(config.url, DEFAULT_SOURCE_URL);
    }

    #[test]
    fn test_staged_snapshot_serializes_object_key() {
        let staged = StagedSnapshot {
            object_key: "20230102030405".into(),
            size: 2,
        };
        let value = serde_json::to_value(&staged).unwrap();
        assert_eq!(value["objectKey"], "20230102030405");
    }
}
