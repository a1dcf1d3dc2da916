//! Common types and utilities shared across all patient-details services.

pub mod detail;
pub mod error;
pub mod time;

pub use detail::{Detail, COUNTRY_LABEL};
pub use error::{PatientError, PatientResult};
pub use time::{DateWindow, ServiceClock, MIN_SUPPORTED_DATE};
