//! Snapshot downloader.
//!
//! Fetches the published national dataset once, stages it in object storage
//! under a `YYYYMMDDhhmmss` key and prints `{"status": 0|1, "objectKey": ...}`.
//! Meant to be run by an external scheduler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use ingestion::{
    notifier_from_webhook, FetchConfig, RefreshStatus, SnapshotFetcher, DEFAULT_SOURCE_URL,
};
use patient_common::ServiceClock;
use storage::{ObjectStorage, ObjectStorageConfig};

#[derive(Parser, Debug)]
#[command(name = "downloader")]
#[command(about = "Fetch and stage the patient details snapshot")]
struct Args {
    /// Source URL
    #[arg(long, default_value = DEFAULT_SOURCE_URL, env = "SOURCE_URL")]
    source_url: String,

    /// Total fetch attempts
    #[arg(long, default_value_t = 3, env = "FETCH_MAX_ATTEMPTS")]
    max_attempts: u32,

    /// Wait after the first failed attempt, in seconds
    #[arg(long, default_value_t = 5, env = "FETCH_INITIAL_WAIT_SECS")]
    initial_wait_secs: u64,

    /// Upper bound on the wait between attempts, in seconds
    #[arg(long, default_value_t = 20, env = "FETCH_MAX_WAIT_SECS")]
    max_wait_secs: u64,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = 60, env = "FETCH_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// Offset of the dataset timezone from UTC, in hours
    #[arg(long, default_value_t = 9, env = "UTC_OFFSET_HOURS")]
    utc_offset_hours: i32,

    /// Slack incoming webhook for failure notifications
    #[arg(long, env = "SLACK_WEBHOOK_URL")]
    slack_webhook_url: Option<String>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

impl Args {
    fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            url: self.source_url.clone(),
            max_attempts: self.max_attempts,
            initial_wait: Duration::from_secs(self.initial_wait_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
            request_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Printed on stdout when the run ends.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchReport {
    status: RefreshStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    object_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .json()
        .init();

    info!(url = %args.source_url, "Starting snapshot download");

    let result = run(&args).await;
    let report = FetchReport {
        status: RefreshStatus::from(&result),
        object_key: result.as_ref().ok().cloned(),
    };
    println!("{}", serde_json::to_string(&report)?);

    if let Err(e) = result {
        error!(error = %format!("{:#}", e), "Snapshot download failed");
        let notifier = notifier_from_webhook(args.slack_webhook_url.as_deref());
        if let Err(notify_err) = notifier
            .notify(&format!("Snapshot download failed: {:#}", e))
            .await
        {
            error!(error = %notify_err, "Failed to send notification");
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: &Args) -> Result<String> {
    let clock = ServiceClock::from_offset_hours(args.utc_offset_hours)?;
    let storage_config = ObjectStorageConfig::from_env();
    let storage =
        Arc::new(ObjectStorage::new(&storage_config).context("Failed to create object storage")?);

    let fetcher = SnapshotFetcher::new(args.fetch_config(), storage, clock)?;
    let staged = fetcher.fetch_snapshot().await?;

    info!(
        object_key = %staged.object_key,
        bucket = %storage_config.bucket,
        size = staged.size,
        "Snapshot staged"
    );
    Ok(staged.object_key)
}
