//! Patient details API server.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use patient_api::config::ApiConfig;
use patient_api::state::AppState;

/// Patient details API server
#[derive(Parser, Debug)]
#[command(name = "patient-api")]
#[command(about = "Per-area patient count API")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080", env = "LISTEN_ADDR")]
    listen: String,

    /// Database URL (postgres:// or sqlite:)
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Offset of the dataset timezone from UTC, in hours
    #[arg(long, default_value_t = 9, env = "UTC_OFFSET_HOURS")]
    utc_offset_hours: i32,

    /// Create the table on startup if missing
    #[arg(long)]
    init_schema: bool,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

impl From<&Args> for ApiConfig {
    fn from(args: &Args) -> Self {
        Self {
            listen_addr: args.listen.clone(),
            database_url: args.database_url.clone(),
            utc_offset_hours: args.utc_offset_hours,
            init_schema: args.init_schema,
        }
    }
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
        .with_level(true)
        .json()
        .init();

    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    let config = ApiConfig::from(&args);
    let state = AppState::new(&config, Some(prometheus_handle))
        .await
        .context("Failed to initialize application state")?;

    let app = patient_api::router(Arc::new(state));

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen_addr))?;

    info!("Patient details API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server failed")?;

    Ok(())
}
