//! Error types for patient-details services.

use thiserror::Error;

/// Result type alias using PatientError.
pub type PatientResult<T> = Result<T, PatientError>;

/// User-facing message for client-side failures.
pub const BAD_REQUEST_MESSAGE: &str = "Invalid request parameters";

/// User-facing message for server-side failures.
pub const INTERNAL_SERVER_ERROR_MESSAGE: &str =
    "A server error occurred. Please contact the administrator";

/// Primary error type for patient-details operations.
#[derive(Debug, Error)]
pub enum PatientError {
    // === Validation Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Invalid period: start_date={start}, end_date={end}: {reason}")]
    InvalidPeriod { start: u32, end: u32, reason: String },

    // === Aggregation Errors ===
    #[error("No data for area '{area}' between {start} and {end}")]
    NoData { area: String, start: u32, end: u32 },

    #[error("Area is empty")]
    EmptyArea,

    #[error("Records span more than one area: expected '{expected}', found '{found}'")]
    MixedAreas { expected: String, found: String },

    // === Storage Errors ===
    #[error("Query failed: {0}")]
    Query(String),

    #[error("Replace failed during {step}: {message}")]
    Replace { step: &'static str, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    // === Infrastructure Errors ===
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl PatientError {
    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            PatientError::MissingParameter(_)
            | PatientError::InvalidParameter { .. }
            | PatientError::InvalidPeriod { .. }
            | PatientError::EmptyArea
            | PatientError::MixedAreas { .. } => 400,

            PatientError::NoData { .. } => 404,

            _ => 500,
        }
    }

    /// Whether the caller caused this error.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status_code())
    }

    /// Generic message safe to show to API callers.
    pub fn user_message(&self) -> &'static str {
        if self.is_client_error() {
            BAD_REQUEST_MESSAGE
        } else {
            INTERNAL_SERVER_ERROR_MESSAGE
        }
    }
}

impl From<serde_json::Error> for PatientError {
    fn from(err: serde_json::Error) -> Self {
        PatientError::Internal(format!("JSON error: {}", err))
    }
}
