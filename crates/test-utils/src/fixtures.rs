//! Common test fixtures for patient-details tests.
//!
//! Records and snapshot documents shaped like the real national dataset.

use patient_common::time::{date_to_int, int_to_date};
use patient_common::Detail;
use serde_json::json;

/// Area used by most fixtures.
pub const HOKKAIDO: &str = "北海道";

/// Second area, for multi-area stores.
pub const AOMORI: &str = "青森県";

/// Items of the two-day snapshot used by round-trip tests:
/// `(date, name_jp, npatients)`.
pub const ROUND_TRIP_ITEMS: [(&str, &str, &str); 2] = [
    ("2023-01-01", HOKKAIDO, "10"),
    ("2023-01-02", HOKKAIDO, "20"),
];

/// Build one record.
pub fn detail(date: u32, area: &str, value: u32) -> Detail {
    Detail::new(date, area, value)
}

/// Consecutive daily records for one area starting at `start`.
pub fn area_series(area: &str, start: u32, values: &[u32]) -> Vec<Detail> {
    let mut day = int_to_date(start).expect("fixture start must be a calendar date");
    let mut records = Vec::with_capacity(values.len());
    for value in values {
        records.push(Detail::new(date_to_int(day), area, *value));
        day = day.succ_opt().expect("fixture date overflow");
    }
    records
}

/// A snapshot document as published by the source, with the given
/// `(date, name_jp, npatients)` items.
pub fn snapshot_json(items: &[(&str, &str, &str)]) -> String {
    let item_list: Vec<_> = items
        .iter()
        .map(|(date, name, npatients)| {
            json!({ "date": date, "name_jp": name, "npatients": npatients })
        })
        .collect();

    json!({
        "errorInfo": { "errorFlag": "0", "errorCode": null, "errorMessage": null },
        "itemList": item_list,
    })
    .to_string()
}

/// A snapshot document in which the source itself reports a failure.
pub fn source_error_snapshot_json() -> String {
    json!({
        "errorInfo": {
            "errorFlag": "1",
            "errorCode": "E001",
            "errorMessage": "upstream maintenance"
        },
        "itemList": [],
    })
    .to_string()
}
