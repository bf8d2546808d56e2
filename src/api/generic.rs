//! Generic API structures and handlers
//!
//! Response envelope, warp filter helpers, CORS, rejection handling and the
//! server that wires the query routes together.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use warp::{
    http::{Method, StatusCode},
    Filter, Rejection, Reply,
};

use super::queries;
use crate::config::Config;
use crate::keeper::ProviderKeeper;

// ============================================================================
// SHARED REQUEST/RESPONSE STRUCTURES
// ============================================================================

/// Standardized response structure for all API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Error message (if failed)
    pub error: Option<String>,
}

// ============================================================================
// WARP FILTER HELPERS
// ============================================================================

/// Creates a warp filter that injects the shared keeper into handlers.
pub fn with_keeper(
    keeper: Arc<RwLock<ProviderKeeper>>,
) -> impl Filter<Extract = (Arc<RwLock<ProviderKeeper>>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || keeper.clone())
}

// ============================================================================
// CORS CONFIGURATION
// ============================================================================

/// Creates a CORS filter based on the configured allowed origins.
fn create_cors_filter(allowed_origins: &[String]) -> warp::cors::Builder {
    let methods = vec![Method::GET, Method::OPTIONS];

    if allowed_origins.iter().any(|o| o == "*") {
        warp::cors()
            .allow_any_origin()
            .allow_methods(methods)
            .allow_headers(vec!["content-type"])
    } else {
        let origins: Vec<&str> = allowed_origins.iter().map(|s| s.as_str()).collect();
        warp::cors()
            .allow_origins(origins)
            .allow_methods(methods)
            .allow_headers(vec!["content-type"])
    }
}

// ============================================================================
// REJECTION HANDLER
// ============================================================================

/// Global rejection handler for all API routes.
///
/// Converts warp rejections into `ApiResponse` errors with the matching
/// HTTP status code.
pub async fn handle_rejection(rej: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "Endpoint not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", rej);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
        status,
    ))
}

// ============================================================================
// API SERVER IMPLEMENTATION
// ============================================================================

/// REST API server exposing the provider queries.
pub struct ApiServer {
    config: Arc<Config>,
    keeper: Arc<RwLock<ProviderKeeper>>,
}

impl ApiServer {
    /// Creates an API server reading from `keeper`.
    ///
    /// # Arguments
    ///
    /// * `config` - Service configuration
    /// * `keeper` - Keeper shared with the block-producing node
    pub fn new(config: Config, keeper: Arc<RwLock<ProviderKeeper>>) -> Self {
        Self {
            config: Arc::new(config),
            keeper,
        }
    }

    /// Starts the API server and serves requests until the process exits.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Server stopped
    /// * `Err(anyhow::Error)` - The configured address is invalid
    pub async fn run(&self) -> Result<()> {
        info!(
            "Starting API server on {}:{}",
            self.config.api.host, self.config.api.port
        );

        let routes = self.create_routes();

        let addr: std::net::SocketAddr = format!("{}:{}", self.config.api.host, self.config.api.port)
            .parse()
            .context("Failed to parse API server address")?;

        warp::serve(routes).run(addr).await;

        Ok(())
    }

    /// Creates all API routes for the server.
    pub(crate) fn create_routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        let keeper = self.keeper.clone();
        let chain_id = self.config.provider.chain_id.clone();

        // Health check endpoint - returns service status
        let health = warp::path("health").and(warp::get()).map(move || {
            warp::reply::json(&ApiResponse::<String> {
                success: true,
                data: Some(format!("CCV provider {} is running", chain_id)),
                error: None,
            })
        });

        // ------------------------------ consumer chains ------------------------------

        let consumer_genesis = warp::path!("consumer_genesis" / String)
            .and(warp::get())
            .and(with_keeper(keeper.clone()))
            .and_then(queries::consumer_genesis_handler);

        let consumer_chains = warp::path!("consumer_chains")
            .and(warp::get())
            .and(with_keeper(keeper.clone()))
            .and_then(queries::consumer_chains_handler);

        let consumer_chain_starts = warp::path!("consumer_chain_starts")
            .and(warp::get())
            .and(with_keeper(keeper.clone()))
            .and_then(queries::consumer_chain_starts_handler);

        let consumer_chain_stops = warp::path!("consumer_chain_stops")
            .and(warp::get())
            .and(with_keeper(keeper.clone()))
            .and_then(queries::consumer_chain_stops_handler);

        let proposed_chains = warp::path!("proposed_consumer_chains")
            .and(warp::get())
            .and(with_keeper(keeper.clone()))
            .and_then(queries::proposed_consumer_chains_handler);

        let chain_status = warp::path!("consumer_chain_status" / String)
            .and(warp::get())
            .and(with_keeper(keeper.clone()))
            .and_then(queries::consumer_chain_status_handler);

        let consumer_validators = warp::path!("consumer_validators" / String)
            .and(warp::get())
            .and(with_keeper(keeper.clone()))
            .and_then(queries::consumer_validators_handler);

        // ------------------------------ key assignment -------------------------------

        let consumer_addr = warp::path!("validator_consumer_addr" / String / String)
            .and(warp::get())
            .and(with_keeper(keeper.clone()))
            .and_then(queries::validator_consumer_addr_handler);

        let provider_addr = warp::path!("validator_provider_addr" / String / String)
            .and(warp::get())
            .and(with_keeper(keeper.clone()))
            .and_then(queries::validator_provider_addr_handler);

        let address_pairs = warp::path!("address_pairs" / String)
            .and(warp::get())
            .and(with_keeper(keeper.clone()))
            .and_then(queries::address_pairs_handler);

        // ------------------------------- module state --------------------------------

        let throttle_state = warp::path!("throttle_state")
            .and(warp::get())
            .and(with_keeper(keeper.clone()))
            .and_then(queries::throttle_state_handler);

        let reward_denoms = warp::path!("registered_consumer_reward_denoms")
            .and(warp::get())
            .and(with_keeper(keeper.clone()))
            .and_then(queries::reward_denoms_handler);

        let params = warp::path!("params")
            .and(warp::get())
            .and(with_keeper(keeper))
            .and_then(queries::params_handler);

        health
            .or(consumer_genesis)
            .or(consumer_chains)
            .or(consumer_chain_starts)
            .or(consumer_chain_stops)
            .or(proposed_chains)
            .or(chain_status)
            .or(consumer_validators)
            .or(consumer_addr)
            .or(provider_addr)
            .or(address_pairs)
            .or(throttle_state)
            .or(reward_denoms)
            .or(params)
            .with(create_cors_filter(&self.config.api.cors_origins))
            .recover(handle_rejection)
    }

    /// Public method for testing - exposes routes for integration tests
    #[allow(dead_code)]
    pub fn test_routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        self.create_routes()
    }
}
