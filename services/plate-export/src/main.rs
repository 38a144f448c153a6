//! Export plate detections read from a JSON array (file argument or stdin)
//! to a CSV blob.

use anyhow::{bail, Context, Result};
use plate_export::{Config, Exporter, PlateDetectionRecord};
use tokio::io::AsyncReadExt;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        container = %config.storage.container_name,
        "Starting plate export"
    );

    if let Some(port) = config.service.metrics_port {
        init_metrics(port)?;
    }

    let records = read_records(std::env::args().nth(1).as_deref())
        .await
        .context("Failed to read plate detection records")?;

    let exporter = Exporter::from_config(&config.storage)
        .await
        .context("Failed to initialize exporter")?;

    if !exporter.export_and_upload(&records).await {
        bail!("CSV export to container {} failed", exporter.container());
    }

    info!(records = records.len(), "Plate export finished");

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

/// Read a JSON array of records from `path`, or stdin when absent or `-`
async fn read_records(path: Option<&str>) -> Result<Vec<PlateDetectionRecord>> {
    let raw = match path {
        Some(path) if path != "-" => tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {path}"))?,
        _ => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read stdin")?;
            buf
        }
    };

    serde_json::from_slice(&raw).context("Records must be a JSON array of plate detections")
}
