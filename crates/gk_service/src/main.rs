//! GK inference service entry point

use anyhow::{Context, Result};
use gk_service::{start_server, PredictionService, ServiceConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::load().context("Failed to load configuration")?;

    init_logging(&config.log_level);

    info!("Starting GK service v{}", env!("CARGO_PKG_VERSION"));
    info!(
        bind_addr = %config.bind_addr,
        artifacts_dir = %config.artifacts_dir.display(),
        model_variant = ?config.model_variant,
        "configuration loaded"
    );

    let service = PredictionService::load(&config);
    start_server(service, &config.bind_addr).await
}

fn init_logging(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
