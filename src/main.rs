use std::sync::Arc;

use tokio::signal;

use edge_gateway::config::{BasicConfigManager, ConfigManager, GatewayConfig};
use edge_gateway::error::{ConfigError, GatewayError};
use edge_gateway::middleware::logging::init_tracing;
use edge_gateway::{ApiGateway, Gateway, GatewayPipeline};

/// Environment variable naming the configuration file
const CONFIG_ENV: &str = "GATEWAY_CONFIG";

fn read_config(path: Option<&str>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::LoadError(format!("{}: {}", path, e)))?;
            GatewayConfig::parse_toml(&content)?
        }
        None => GatewayConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    let config_path = std::env::args().nth(1).or_else(|| std::env::var(CONFIG_ENV).ok());

    let config_manager = Arc::new(BasicConfigManager::new());
    config_manager
        .update_config(read_config(config_path.as_deref())?)
        .await?;
    let config = config_manager.get_config().await;

    init_tracing(&config.logging)?;
    tracing::info!(
        config = config_path.as_deref().unwrap_or("<defaults>"),
        routes = config.routes.len(),
        "Configuration loaded"
    );

    let pipeline = Arc::new(GatewayPipeline::from_config(&config)?);
    let gateway = ApiGateway::new(pipeline, config.server.clone());

    gateway.start().await?;

    // Wait for Ctrl+C
    signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping API Gateway");

    gateway.stop().await?;
    tracing::info!("API Gateway stopped successfully");

    Ok(())
}
