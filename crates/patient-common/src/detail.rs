//! The canonical per-area, per-day record.

use serde::{Deserialize, Serialize};

/// Country label assigned to every record of the national dataset.
pub const COUNTRY_LABEL: &str = "日本";

/// One area/day observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detail {
    /// Calendar day as `YYYYMMDD`
    pub date: u32,
    /// Region name
    pub area: String,
    /// New patients on that day
    pub value: u32,
    /// Country of origin
    pub country: String,
}

impl Detail {
    /// Build a record carrying the national country label.
    pub fn new(date: u32, area: impl Into<String>, value: u32) -> Self {
        Self {
            date,
            area: area.into(),
            value,
            country: COUNTRY_LABEL.to_string(),
        }
    }
}
