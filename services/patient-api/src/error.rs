//! HTTP rendering of service errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use patient_common::PatientError;

/// Body returned for every failed request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_message: String,
    pub http_status: u16,
}

/// A [`PatientError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub PatientError);

impl From<PatientError> for ApiError {
    fn from(err: PatientError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.http_status_code();
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Details go to the log only.
        if self.0.is_client_error() {
            warn!(error = %self.0, status = code, "Rejected request");
        } else {
            error!(error = %self.0, status = code, "Request failed");
        }

        let body = ErrorBody {
            error_message: self.0.user_message().to_string(),
            http_status: code,
        };
        (status, Json(body)).into_response()
    }
}
