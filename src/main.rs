//! tax-engine server.
//!
//! Reads config from env vars:
//!   TAX_ENGINE_CONFIG - configuration directory (default: ./config/fbr_individual)
//!   TAX_ENGINE_ADDR   - listen address (default: 0.0.0.0:3000)

use std::process::ExitCode;

use tax_engine::api::{AppState, create_router};
use tax_engine::config::ConfigLoader;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tax_engine=info".into()),
        )
        .init();

    let config_dir =
        std::env::var("TAX_ENGINE_CONFIG").unwrap_or_else(|_| "./config/fbr_individual".into());
    let bind_addr = std::env::var("TAX_ENGINE_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let config = match ConfigLoader::load(&config_dir) {
        Ok(config) => config,
        Err(err) => {
            error!(config_dir = %config_dir, error = %err, "Failed to load tax configuration");
            return ExitCode::FAILURE;
        }
    };

    let router = create_router(AppState::new(config));

    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(addr = %bind_addr, error = %err, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    info!(addr = %bind_addr, "tax-engine listening");

    if let Err(err) = axum::serve(listener, router).await {
        error!(error = %err, "Server error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
