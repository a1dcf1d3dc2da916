//! The published snapshot document and its transform into records.
//!
//! ```json
//! {
//!   "errorInfo": { "errorFlag": "0", "errorCode": null, "errorMessage": null },
//!   "itemList": [ { "date": "2023-01-01", "name_jp": "北海道", "npatients": "10" } ]
//! }
//! ```

use serde::Deserialize;

use patient_common::Detail;

use crate::error::{IngestionError, Result};

/// Flag value the source uses to report its own failure.
const SOURCE_ERROR_FLAG: &str = "1";

/// Top-level snapshot document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEnvelope {
    #[serde(default)]
    pub error_info: ErrorInfo,
    #[serde(default)]
    pub item_list: Vec<SnapshotItem>,
}

/// Source-side status block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    #[serde(default)]
    pub error_flag: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ErrorInfo {
    pub fn is_error(&self) -> bool {
        self.error_flag.as_deref().map(str::trim) == Some(SOURCE_ERROR_FLAG)
    }
}

/// One `(date, area, cumulative count)` entry as published.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotItem {
    pub date: String,
    pub name_jp: String,
    pub npatients: String,
}

impl SnapshotEnvelope {
    pub fn parse(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Check the source status and convert every item.
    ///
    /// All-or-nothing: the first bad item fails the whole snapshot.
    pub fn into_details(self) -> Result<Vec<Detail>> {
        if self.error_info.is_error() {
            return Err(IngestionError::SourceReported {
                code: self.error_info.error_code.unwrap_or_default(),
                message: self.error_info.error_message.unwrap_or_default(),
            });
        }
        if self.item_list.is_empty() {
            return Err(IngestionError::EmptySnapshot);
        }

        self.item_list
            .iter()
            .enumerate()
            .map(|(index, item)| item.to_detail(index))
            .collect()
    }
}

impl SnapshotItem {
    fn to_detail(&self, index: usize) -> Result<Detail> {
        let fail = |field: &'static str, value: &str, reason: &str| IngestionError::Transform {
            index,
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let digits: String = self.date.trim().chars().filter(|c| *c != '-').collect();
        if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(fail("date", &self.date, "expected YYYY-MM-DD"));
        }
        let date: u32 = digits
            .parse()
            .map_err(|e: std::num::ParseIntError| fail("date", &self.date, &e.to_string()))?;

        let value: u32 = self
            .npatients
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| {
                fail("npatients", &self.npatients, &e.to_string())
            })?;

        let area = self.name_jp.trim();
        if area.is_empty() {
            return Err(fail("name_jp", &self.name_jp, "area name is blank"));
        }

        Ok(Detail::new(date, area, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patient_common::COUNTRY_LABEL;

    fn envelope(items: &[(&str, &str, &str)]) -> SnapshotEnvelope {
        SnapshotEnvelope {
            error_info: ErrorInfo::default(),
            item_list: items
                .iter()
                .map(|(date, name, n)| SnapshotItem {
                    date: date.to_string(),
                    name_jp: name.to_string(),
                    npatients: n.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_parse_published_shape() {
        let body = r#"{
            "errorInfo": {"errorFlag": "0", "errorCode": null, "errorMessage": null},
            "itemList": [{"date": "2023-01-01", "name_jp": "北海道", "npatients": "10"}]
        }"#;
        let env = SnapshotEnvelope::parse(body.as_bytes()).unwrap();
        assert!(!env.error_info.is_error());
        assert_eq!(env.item_list[0].name_jp, "北海道");
    }

    #[test]
    fn test_transform_item() {
        let details = envelope(&[("2023-01-01", "北海道", "10")])
            .into_details()
            .unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].date, 20230101);
        assert_eq!(details[0].value, 10);
        assert_eq!(details[0].area, "北海道");
        assert_eq!(details[0].country, COUNTRY_LABEL);
    }

    #[test]
    fn test_bad_date_reports_index_and_field() {
        let err = envelope(&[("2023-01-01", "北海道", "1"), ("2023/01/02", "北海道", "2")])
            .into_details()
            .unwrap_err();
        match err {
            IngestionError::Transform {
                index, field, value, ..
            } => {
                assert_eq!(index, 1);
                assert_eq!(field, "date");
                assert_eq!(value, "2023/01/02");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_negative_count_rejected() {
        let err = envelope(&[("2023-01-01", "北海道", "-3")])
            .into_details()
            .unwrap_err();
        assert!(matches!(
            err,
            IngestionError::Transform {
                field: "npatients",
                ..
            }
        ));
    }

    #[test]
    fn test_blank_area_rejected() {
        let err = envelope(&[("2023-01-01", "  ", "3")])
            .into_details()
            .unwrap_err();
        assert!(matches!(
            err,
            IngestionError::Transform {
                field: "name_jp",
                ..
            }
        ));
    }

    #[test]
    fn test_source_error_flag() {
        let mut env = envelope(&[("2023-01-01", "北海道", "1")]);
        env.error_info.error_flag = Some("1".into());
        env.error_info.error_message = Some("down".into());
        assert!(matches!(
            env.into_details(),
            Err(IngestionError::SourceReported { .. })
        ));
    }

    #[test]
    fn test_empty_item_list() {
        assert!(matches!(
            envelope(&[]).into_details(),
            Err(IngestionError::EmptySnapshot)
        ));
    }
}
