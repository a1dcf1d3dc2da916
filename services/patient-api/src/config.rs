//! API server configuration.

use serde::{Deserialize, Serialize};

use patient_common::time::DEFAULT_UTC_OFFSET_HOURS;

/// Settings the API needs at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Listen address
    pub listen_addr: String,
    /// `postgres://...` or `sqlite:...`
    pub database_url: String,
    /// Offset of the dataset's timezone; decides what "today" is
    pub utc_offset_hours: i32,
    /// Create the table on startup if missing
    pub init_schema: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            database_url: "sqlite::memory:".to_string(),
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            init_schema: false,
        }
    }
}
