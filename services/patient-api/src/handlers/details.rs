//! `GET /patient/details`: per-day counts, sum and average for one area.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    Json,
};
use tracing::{debug, instrument};

use aggregation::{aggregate, AggregateResult};
use patient_common::time::parse_date_param;
use patient_common::{DateWindow, PatientError, PatientResult};

use crate::error::ApiError;
use crate::state::AppState;

/// Validated query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailsQuery {
    pub area: String,
    pub window: DateWindow,
}

impl DetailsQuery {
    /// Validate raw parameters against `today` (`YYYYMMDD`, service timezone).
    pub fn parse(params: &HashMap<String, String>, today: u32) -> PatientResult<Self> {
        let required = |name: &str| -> PatientResult<&str> {
            params
                .get(name)
                .map(String::as_str)
                .ok_or_else(|| PatientError::MissingParameter(name.to_string()))
        };

        let area = required("area")?.trim();
        if area.is_empty() {
            return Err(PatientError::InvalidParameter {
                param: "area".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let start = parse_date_param("start_date", required("start_date")?)?;
        let end = parse_date_param("end_date", required("end_date")?)?;
        let window = DateWindow::validate(start, end, today)?;

        Ok(Self {
            area: area.to_string(),
            window,
        })
    }
}

#[instrument(skip(state))]
pub async fn details_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<AggregateResult>, ApiError> {
    let result = run(&state, &params).await;
    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!("patient_details_requests_total", "status" => status).increment(1);
    Ok(Json(result?))
}

async fn run(state: &AppState, params: &HashMap<String, String>) -> PatientResult<AggregateResult> {
    let query = DetailsQuery::parse(params, state.clock.today())?;

    let records = state
        .repository
        .fetch_range(&query.area, query.window.start, query.window.end)
        .await?;
    debug!(records = records.len(), "Loaded records");

    aggregate(records)
        .await
        .map_err(|e| e.with_context(&query.area, query.window))
}
