//! Error types for the ingestion crate.

use patient_common::PatientError;
use thiserror::Error;

/// Errors that can occur while fetching, staging or loading a snapshot.
#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("Fetch failed after {attempts} attempts: {last_error}")]
    Fetch { attempts: u32, last_error: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Snapshot is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Source reported an error (code {code}): {message}")]
    SourceReported { code: String, message: String },

    #[error("Snapshot contains no items")]
    EmptySnapshot,

    #[error("Item {index}: invalid {field} {value:?}: {reason}")]
    Transform {
        index: usize,
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to stage snapshot: {0}")]
    Staging(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error(transparent)]
    Store(#[from] PatientError),
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestionError>;

/// Alias used in operation signatures.
pub type IngestionResult<T> = Result<T>;
