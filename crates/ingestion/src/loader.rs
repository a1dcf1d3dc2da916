//! Refresh loader: turn a staged snapshot into the canonical store contents.

use std::sync::Arc;

use serde::{Deserialize, Serialize, Serializer};
use tracing::{info, instrument};

use storage::{ObjectStorage, PatientRepository};

use crate::error::Result;
use crate::snapshot::SnapshotEnvelope;

/// Event asking for a staged snapshot to be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshEvent {
    #[serde(rename = "objectKey", alias = "ObjectKey")]
    pub object_key: String,
}

/// Outcome reported for a refresh or fetch run: `1` success, `0` failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Succeeded,
    Failed,
}

impl RefreshStatus {
    pub fn code(self) -> u8 {
        match self {
            RefreshStatus::Failed => 0,
            RefreshStatus::Succeeded => 1,
        }
    }
}

impl<T, E> From<&std::result::Result<T, E>> for RefreshStatus {
    fn from(result: &std::result::Result<T, E>) -> Self {
        if result.is_ok() {
            RefreshStatus::Succeeded
        } else {
            RefreshStatus::Failed
        }
    }
}

impl Serialize for RefreshStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// What a successful load did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub object_key: String,
    pub removed: u64,
    pub inserted: u64,
}

/// Loads staged snapshots into the repository.
pub struct RefreshLoader {
    storage: Arc<ObjectStorage>,
    repository: PatientRepository,
}

impl RefreshLoader {
    pub fn new(storage: Arc<ObjectStorage>, repository: PatientRepository) -> Self {
        Self {
            storage,
            repository,
        }
    }

    /// Read, validate and transform the snapshot at `object_key`, then
    /// replace the store with it. Nothing is written unless every item
    /// transforms cleanly.
    #[instrument(skip(self))]
    pub async fn load_from_snapshot(&self, object_key: &str) -> Result<LoadSummary> {
        let body = self.storage.get(object_key).await?;
        let details = SnapshotEnvelope::parse(&body)?.into_details()?;
        info!(records = details.len(), "Transformed snapshot");

        let replaced = self.repository.replace_all(&details).await?;

        Ok(LoadSummary {
            object_key: object_key.to_string(),
            removed: replaced.removed,
            inserted: replaced.inserted,
        })
    }

    /// Handle a refresh event, recording the run outcome.
    pub async fn handle(&self, event: &RefreshEvent) -> Result<LoadSummary> {
        let result = self.load_from_snapshot(&event.object_key).await;
        let status = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!("refresh_runs_total", "status" => status).increment(1);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accepts_both_key_spellings() {
        let a: RefreshEvent = serde_json::from_str(r#"{"objectKey":"20230101000000"}"#).unwrap();
        let b: RefreshEvent = serde_json::from_str(r#"{"ObjectKey":"20230101000000"}"#).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_status_serializes_as_code() {
        let ok: std::result::Result<(), ()> = Ok(());
        let err: std::result::Result<(), ()> = Err(());
        assert_eq!(
            serde_json::json!({ "status": RefreshStatus::from(&ok) }).to_string(),
            r#"{"status":1}"#
        );
        assert_eq!(
            serde_json::json!({ "status": RefreshStatus::from(&err) }).to_string(),
            r#"{"status":0}"#
        );
    }
}
