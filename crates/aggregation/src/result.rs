//! The aggregated response payload.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Aggregated statistics for one area over one date window.
///
/// Serializes as a flat JSON object: one `"YYYYMMDD": value` entry per day,
/// followed by `"area"`, `"sum"` and `"average"`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateResult {
    pub area: String,
    pub per_date: BTreeMap<u32, u32>,
    pub sum: u64,
    pub average: f64,
}

impl Serialize for AggregateResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.per_date.len() + 3))?;
        for (date, value) in &self.per_date {
            map.serialize_entry(&date.to_string(), value)?;
        }
        map.serialize_entry("area", &self.area)?;
        map.serialize_entry("sum", &self.sum)?;
        map.serialize_entry("average", &self.average)?;
        map.end()
    }
}
