//! Refresh ingester.
//!
//! Loads one staged snapshot into the canonical store and prints
//! `{"status": 0|1}`. The snapshot is chosen by `--object-key`, by a refresh
//! event (`--event '{"objectKey": "..."}'`), or `--latest`.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use ingestion::{notifier_from_webhook, RefreshEvent, RefreshLoader, RefreshStatus};
use storage::{ObjectStorage, ObjectStorageConfig, PatientRepository};

#[derive(Parser, Debug)]
#[command(name = "ingester")]
#[command(about = "Load a staged patient details snapshot into the database")]
struct Args {
    /// Object key of the staged snapshot
    #[arg(long, env = "OBJECT_KEY", conflicts_with_all = ["event", "latest"])]
    object_key: Option<String>,

    /// Refresh event JSON, e.g. {"objectKey": "20230103090000"}
    #[arg(long, conflicts_with = "latest")]
    event: Option<String>,

    /// Load the most recent staged snapshot
    #[arg(long)]
    latest: bool,

    /// Database URL (postgres:// or sqlite:)
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Create the table if missing before loading
    #[arg(long)]
    init_schema: bool,

    /// Slack incoming webhook for failure notifications
    #[arg(long, env = "SLACK_WEBHOOK_URL")]
    slack_webhook_url: Option<String>,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

/// Printed on stdout when the run ends.
#[derive(Debug, Serialize)]
struct RefreshReport {
    status: RefreshStatus,
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

    info!("Starting patient details refresh");

    let result = run(&args).await;
    let report = RefreshReport {
        status: RefreshStatus::from(&result),
    };
    println!("{}", serde_json::to_string(&report)?);

    if let Err(e) = result {
        error!(error = %format!("{:#}", e), "Refresh failed");
        let notifier = notifier_from_webhook(args.slack_webhook_url.as_deref());
        if let Err(notify_err) = notifier.notify(&format!("Refresh failed: {:#}", e)).await {
            error!(error = %notify_err, "Failed to send notification");
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(args: &Args) -> Result<()> {
    let storage = Arc::new(
        ObjectStorage::new(&ObjectStorageConfig::from_env())
            .context("Failed to create object storage")?,
    );

    let event = resolve_event(args, &storage).await?;
    info!(object_key = %event.object_key, "Loading snapshot");

    let repository = PatientRepository::connect(&args.database_url)
        .await
        .context("Failed to connect to database")?;
    if args.init_schema {
        repository.ensure_schema().await?;
    }

    let loader = RefreshLoader::new(storage, repository);
    let summary = loader.handle(&event).await?;

    info!(
        object_key = %summary.object_key,
        removed = summary.removed,
        inserted = summary.inserted,
        "Refresh complete"
    );
    Ok(())
}

async fn resolve_event(args: &Args, storage: &ObjectStorage) -> Result<RefreshEvent> {
    if let Some(key) = &args.object_key {
        return Ok(RefreshEvent {
            object_key: key.clone(),
        });
    }
    if let Some(raw) = &args.event {
        return parse_event(raw);
    }
    if args.latest {
        return match storage.latest_key().await? {
            Some(object_key) => Ok(RefreshEvent { object_key }),
            None => bail!("No staged snapshots in bucket {}", storage.bucket()),
        };
    }
    bail!("One of --object-key, --event or --latest is required")
}

fn parse_event(raw: &str) -> Result<RefreshEvent> {
    let event: RefreshEvent = serde_json::from_str(raw).context("Invalid refresh event")?;
    if event.object_key.trim().is_empty() {
        bail!("Refresh event has an empty objectKey");
    }
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["ingester", "--database-url", "sqlite::memory:"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_event() {
        let event = parse_event(r#"{"objectKey":"20230103090000"}"#).unwrap();
        assert_eq!(event.object_key, "20230103090000");
        assert!(parse_event(r#"{"objectKey":""}"#).is_err());
        assert!(parse_event("not json").is_err());
    }

    #[test]
    fn test_key_sources_conflict() {
        let result = Args::try_parse_from([
            "ingester",
            "--database-url",
            "sqlite::memory:",
            "--object-key",
            "a",
            "--latest",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resolve_latest() {
        let storage = ObjectStorage::in_memory("patient-details-file-test");
        for key in ["20230101090000", "20230102090000"] {
            storage.put(key, Bytes::from_static(b"{}")).await.unwrap();
        }

        let event = resolve_event(&args(&["--latest"]), &storage).await.unwrap();
        assert_eq!(event.object_key, "20230102090000");
    }

    #[tokio::test]
    async fn test_resolve_requires_a_source() {
        let storage = ObjectStorage::in_memory("patient-details-file-test");
        assert!(resolve_event(&args(&[]), &storage).await.is_err());
    }

    #[test]
    fn test_report_shape() {
        let report = RefreshReport {
            status: RefreshStatus::Succeeded,
        };
        assert_eq!(serde_json::to_string(&report).unwrap(), r#"{"status":1}"#);

        let failed = RefreshReport {
            status: RefreshStatus::Failed,
        };
        assert_eq!(serde_json::to_string(&failed).unwrap(), r#"{"status":0}"#);
    }
}
