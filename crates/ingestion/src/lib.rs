//! Patient details ingestion library.
//!
//! Write path of the pipeline:
//!
//! - [`SnapshotFetcher`] downloads the published dataset with bounded
//!   retries and stages the raw body in object storage under a timestamp key
//! - [`RefreshLoader`] reads a staged snapshot, transforms every item and
//!   atomically replaces the canonical store
//! - [`Notifier`] implementations report failed scheduled runs

pub mod error;
pub mod fetch;
pub mod loader;
pub mod notify;
pub mod snapshot;

// Re-exports
pub use error::{IngestionError, IngestionResult, Result};
pub use fetch::{FetchConfig, SnapshotFetcher, StagedSnapshot, DEFAULT_SOURCE_URL};
pub use loader::{LoadSummary, RefreshEvent, RefreshLoader, RefreshStatus};
pub use notify::{notifier_from_webhook, LogNotifier, Notifier, SlackNotifier};
pub use snapshot::{SnapshotEnvelope, SnapshotItem};
