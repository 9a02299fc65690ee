//! Trade ingester.
//!
//! This binary polls the configured venue listings for new trades under a
//! shared request budget and records them until interrupted.

mod config;
mod error;
mod ingester;

use clap::Parser;
use std::process::exit;
use tracing::error;

use config::{CliConfig, EnvConfig};
use ingester::TradeIngester;

#[tokio::main]
async fn main() {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    // Parse environment configuration
    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse environment configuration: {}", e);
            exit(1);
        }
    };

    // Parse CLI arguments
    let cli_config = CliConfig::parse();

    let ingest_config = match cli_config.to_ingest_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            exit(1);
        }
    };

    // Set up logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let ingester = match TradeIngester::try_new(&env_config, ingest_config) {
        Ok(ingester) => ingester,
        Err(e) => {
            eprintln!("Failed to create trade ingester: {}", e);
            exit(1);
        }
    };

    if let Err(e) = ingester.run().await {
        error!(%e, "Trade ingester encountered an error, shutting down");
        exit(1);
    }
}
