//! Application state shared by all handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use patient_common::{PatientResult, ServiceClock};
use storage::PatientRepository;

use crate::config::ApiConfig;

/// Shared application state.
pub struct AppState {
    pub repository: PatientRepository,
    pub clock: ServiceClock,
    /// `None` when no Prometheus recorder is installed (tests)
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Connect to the database described by `config`.
    pub async fn new(config: &ApiConfig, metrics: Option<PrometheusHandle>) -> PatientResult<Self> {
        let clock = ServiceClock::from_offset_hours(config.utc_offset_hours)?;
        let repository = PatientRepository::connect(&config.database_url).await?;

        if config.init_schema {
            repository.ensure_schema().await?;
            info!("Ensured patient_details schema");
        }

        Ok(Self::from_parts(repository, clock, metrics))
    }

    pub fn from_parts(
        repository: PatientRepository,
        clock: ServiceClock,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            repository,
            clock,
            metrics,
        }
    }
}
