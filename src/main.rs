use anyhow::{Context, Result};
use restapi_config::document::{ConfigDocument, DEBUG};
use restapi_config::{load_app_config, server, validation};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "config/config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; a readable DEBUG flag raises the default level.
    // Load errors are reported by `load_app_config` below.
    let debug = ConfigDocument::load(CONFIG_PATH)
        .await
        .ok()
        .and_then(|doc| doc.get(DEBUG).and_then(|v| v.as_bool()))
        .unwrap_or(false);
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("Starting REST API...");

    // Load configuration
    let config = load_app_config(CONFIG_PATH)
        .await
        .with_context(|| format!("Failed to load configuration from {}", CONFIG_PATH))?;

    for key in validation::plaintext_secrets(&config) {
        warn!(key = %key, "Credential stored in plaintext configuration");
    }

    info!(
        sql = %config.sqldb.display_url(),
        mongo = %config.mongodb.display_url(),
        "Database targets"
    );

    // Start web server
    server::start_server(config).await?;

    Ok(())
}
