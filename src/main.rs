//! CCV Provider Node
//!
//! Runs a provider chain in-process: produces blocks at a fixed interval,
//! launches the configured consumer chains and serves the query API.

use anyhow::Result;
use tracing::{error, info};

use ccv_provider::api::ApiServer;
use ccv_provider::config::Config;
use ccv_provider::node::ProviderNode;

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

/// Main application entry point.
///
/// This function:
/// 1. Initializes logging and tracing
/// 2. Loads configuration from TOML file
/// 3. Starts the API server in the background
/// 4. Runs the provider node until a fatal error
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    info!("Starting CCV Provider Node");

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("CCV Provider Node");
        println!();
        println!("Usage: ccv-provider [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --config <path>   Use custom config file path");
        println!("  --help, -h        Show this help message");
        println!();
        println!("Environment variables:");
        println!("  CCV_PROVIDER_CONFIG_PATH    Path to config file (default: config/provider.toml)");
        return Ok(());
    }

    let mut config_path = None;
    let mut i = 1;
    while i < args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            config_path = Some(args[i + 1].clone());
            i += 1;
        }
        i += 1;
    }

    if let Some(path) = config_path {
        std::env::set_var("CCV_PROVIDER_CONFIG_PATH", &path);
        info!("Using custom config: {}", path);
    }

    let config = Config::load()?;
    info!("Configuration loaded successfully");

    let node = ProviderNode::new(config.clone())?;
    let api_server = ApiServer::new(config, node.keeper());

    tokio::spawn(async move {
        if let Err(e) = api_server.run().await {
            error!("API server error: {}", e);
        }
    });

    node.run().await
}
