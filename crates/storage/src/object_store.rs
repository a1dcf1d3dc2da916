//! Object storage interface for staged snapshots (S3 compatible).

use bytes::Bytes;
use object_store::{aws::AmazonS3Builder, memory::InMemory, path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use patient_common::{PatientError, PatientResult};

/// Configuration for object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// Custom endpoint (MinIO, LocalStack); `None` for AWS itself
    pub endpoint: Option<String>,
    /// Bucket name
    pub bucket: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// AWS region
    pub region: String,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
}

impl ObjectStorageConfig {
    /// Bucket holding staged snapshots for a deployment environment.
    pub fn bucket_for_env(env: &str) -> String {
        format!("patient-details-file-{}", env)
    }

    /// Load from `S3_*` and `ENV` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let env = lookup("ENV").unwrap_or_else(|| "dev".to_string());

        Self {
            endpoint: lookup("S3_ENDPOINT").filter(|v| !v.is_empty()),
            bucket: lookup("S3_BUCKET").unwrap_or_else(|| Self::bucket_for_env(&env)),
            access_key_id: lookup("S3_ACCESS_KEY").unwrap_or_default(),
            secret_access_key: lookup("S3_SECRET_KEY").unwrap_or_default(),
            region: lookup("S3_REGION").unwrap_or(defaults.region),
            allow_http: lookup("S3_ALLOW_HTTP")
                .map(|v| v == "true")
                .unwrap_or(false),
        }
    }
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bucket: Self::bucket_for_env("dev"),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            region: "ap-northeast-1".to_string(),
            allow_http: false,
        }
    }
}

/// Object storage client for snapshot files.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Create a new object storage client from config.
    pub fn new(config: &ObjectStorageConfig) -> PatientResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if !config.access_key_id.is_empty() {
            builder = builder
                .with_access_key_id(&config.access_key_id)
                .with_secret_access_key(&config.secret_access_key);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| PatientError::Storage(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    /// Process-local storage, for tests and local runs.
    pub fn in_memory(bucket: &str) -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            bucket: bucket.to_string(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Write bytes to a path in the bucket.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> PatientResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| PatientError::Storage(format!("Failed to write {}: {}", path, e)))?;

        Ok(())
    }

    /// Read bytes from a path.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn get(&self, path: &str) -> PatientResult<Bytes> {
        let location = Path::from(path);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| PatientError::Storage(format!("Failed to read {}: {}", path, e)))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| PatientError::Storage(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// List object keys, optionally under a prefix.
    pub async fn list(&self, prefix: Option<&str>) -> PatientResult<Vec<String>> {
        use futures::TryStreamExt;

        let prefix_path = prefix.map(Path::from);
        let mut paths = Vec::new();

        let mut stream = self.store.list(prefix_path.as_ref());
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| PatientError::Storage(format!("List failed: {}", e)))?
        {
            paths.push(meta.location.to_string());
        }

        Ok(paths)
    }

    /// Most recent snapshot key. Keys are fixed-width timestamps, so the
    /// lexicographic maximum is the newest.
    pub async fn latest_key(&self) -> PatientResult<Option<String>> {
        Ok(self.list(None).await?.into_iter().max())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_bucket_for_env() {
        assert_eq!(
            ObjectStorageConfig::bucket_for_env("prod"),
            "patient-details-file-prod"
        );
    }

    #[test]
    fn test_from_lookup_derives_bucket_from_env() {
        let vars: HashMap<&str, &str> = [("ENV", "stg"), ("S3_ENDPOINT", "http://minio:9000")]
            .into_iter()
            .collect();
        let config = ObjectStorageConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.bucket, "patient-details-file-stg");
        assert_eq!(config.endpoint.as_deref(), Some("http://minio:9000"));
        assert_eq!(config.region, "ap-northeast-1");
        assert!(!config.allow_http);
    }

    #[test]
    fn test_explicit_bucket_wins() {
        let config = ObjectStorageConfig::from_lookup(|k| match k {
            "ENV" => Some("prod".to_string()),
            "S3_BUCKET" => Some("custom".to_string()),
            _ => None,
        });
        assert_eq!(config.bucket, "custom");
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let storage = ObjectStorage::in_memory("test");
        storage
            .put("20230102030405", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        assert_eq!(storage.list(None).await.unwrap(), vec!["20230102030405"]);
        assert_eq!(storage.get("20230102030405").await.unwrap(), Bytes::from_static(b"{}"));
    }

    #[tokio::test]
    async fn test_missing_object_is_storage_error() {
        let storage = ObjectStorage::in_memory("test");
        let err = storage.get("nope").await.unwrap_err();
        assert!(matches!(err, PatientError::Storage(_)));
    }

    #[tokio::test]
    async fn test_latest_key_sorts_by_timestamp() {
        let storage = ObjectStorage::in_memory("test");
        for key in ["20230102030405", "20230201000000", "20221231235959"] {
            storage.put(key, Bytes::from_static(b"x")).await.unwrap();
        }
        assert_eq!(
            storage.latest_key().await.unwrap().as_deref(),
            Some("20230201000000")
        );
    }
}
