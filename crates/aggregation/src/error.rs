//! Error types for the aggregation crate.

use patient_common::{DateWindow, PatientError};
use thiserror::Error;

/// Errors that can occur while aggregating one area's records.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    #[error("No records to aggregate")]
    NoData,

    #[error("Area is empty")]
    EmptyArea,

    #[error("Records span more than one area: expected '{expected}', found '{found}'")]
    MixedAreas { expected: String, found: String },

    #[error("Derivation task '{task}' did not complete: {message}")]
    TaskFailed { task: &'static str, message: String },
}

impl AggregateError {
    /// Attach the request's area and window so the error can be diagnosed
    /// without re-running the query.
    pub fn with_context(self, area: &str, window: DateWindow) -> PatientError {
        match self {
            AggregateError::NoData => PatientError::NoData {
                area: area.to_string(),
                start: window.start,
                end: window.end,
            },
            AggregateError::EmptyArea => PatientError::EmptyArea,
            AggregateError::MixedAreas { expected, found } => {
                PatientError::MixedAreas { expected, found }
            }
            AggregateError::TaskFailed { task, message } => PatientError::Internal(format!(
                "aggregation of '{}' [{}, {}] failed in {}: {}",
                area, window.start, window.end, task, message
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_context() {
        let window = DateWindow { start: 20230101, end: 20230102 };
        let err = AggregateError::NoData.with_context("北海道", window);
        assert_eq!(err.http_status_code(), 404);
        assert!(err.to_string().contains("北海道"));
        assert!(err.to_string().contains("20230101"));
    }

    #[test]
    fn test_task_failure_is_server_error() {
        let window = DateWindow { start: 20230101, end: 20230102 };
        let err = AggregateError::TaskFailed {
            task: "sum",
            message: "panicked".into(),
        }
        .with_context("北海道", window);
        assert_eq!(err.http_status_code(), 500);
    }
}
