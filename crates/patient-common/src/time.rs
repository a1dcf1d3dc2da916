//! Date handling for `YYYYMMDD` day keys and the fixed service timezone.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PatientError, PatientResult};

/// First day the national dataset carries per-area counts.
pub const MIN_SUPPORTED_DATE: u32 = 20200509;

/// Default offset of the service timezone (JST).
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 9;

/// Format of staged snapshot object keys.
pub const SNAPSHOT_KEY_FORMAT: &str = "%Y%m%d%H%M%S";

/// Clock pinned to the fixed timezone the dataset is published in.
///
/// "Today" and snapshot keys are always computed in this zone, never in the
/// host's local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceClock {
    offset: FixedOffset,
}

impl ServiceClock {
    /// Create a clock at a whole-hour offset from UTC.
    pub fn from_offset_hours(hours: i32) -> PatientResult<Self> {
        let offset = hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                PatientError::Config(format!("UTC offset out of range: {} hours", hours))
            })?;
        Ok(Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Current instant in the service timezone.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// Today's date as `YYYYMMDD`.
    pub fn today(&self) -> u32 {
        date_to_int(self.now().date_naive())
    }

    /// Object key for a snapshot fetched right now.
    pub fn snapshot_key(&self) -> String {
        snapshot_key_at(&self.now())
    }
}

impl Default for ServiceClock {
    fn default() -> Self {
        Self::from_offset_hours(DEFAULT_UTC_OFFSET_HOURS).unwrap_or(Self { offset: Utc.fix() })
    }
}

/// Fixed-width key (`YYYYMMDDhhmmss`) that sorts by fetch time.
pub fn snapshot_key_at(at: &DateTime<FixedOffset>) -> String {
    at.format(SNAPSHOT_KEY_FORMAT).to_string()
}

/// Encode a calendar day as `YYYYMMDD`.
pub fn date_to_int(date: NaiveDate) -> u32 {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

/// Decode a `YYYYMMDD` integer, rejecting impossible calendar days.
pub fn int_to_date(value: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        (value / 10_000) as i32,
        (value / 100) % 100,
        value % 100,
    )
}

/// Parse a `YYYYMMDD` query parameter.
pub fn parse_date_param(param: &str, raw: &str) -> PatientResult<u32> {
    let invalid = |message: &str| PatientError::InvalidParameter {
        param: param.to_string(),
        message: format!("{}: '{}'", message, raw),
    };

    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("expected an 8-digit YYYYMMDD date"));
    }
    let value: u32 = raw.parse().map_err(|_| invalid("not a number"))?;
    if int_to_date(value).is_none() {
        return Err(invalid("not a calendar date"));
    }
    Ok(value)
}

/// An inclusive, validated `[start, end]` day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: u32,
    pub end: u32,
}

impl DateWindow {
    /// Validate a requested range against the supported floor and `today`.
    ///
    /// Both ends must lie in `[MIN_SUPPORTED_DATE, today)` and
    /// `start <= end`.
    pub fn validate(start: u32, end: u32, today: u32) -> PatientResult<Self> {
        let reject = |reason: String| PatientError::InvalidPeriod { start, end, reason };

        if start > end {
            return Err(reject("start_date is after end_date".to_string()));
        }
        if start < MIN_SUPPORTED_DATE || end < MIN_SUPPORTED_DATE {
            return Err(reject(format!(
                "dates before {} are not available",
                MIN_SUPPORTED_DATE
            )));
        }
        if start >= today || end >= today {
            return Err(reject(format!("dates must be before today ({})", today)));
        }

        Ok(Self { start, end })
    }
}
