//! marauders-map - Marker Service Entry Point
//!
//! Starts the HTTP server that classifies uploaded photos into map markers.

use marauders_map::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marauders_map=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, markers={}",
        config.classifier.model,
        config.markers_path.display()
    );

    api::serve(config).await?;

    Ok(())
}
