//! Query handlers
//!
//! Each handler takes a read lock on the keeper, runs one query and wraps the
//! outcome in an `ApiResponse`. Query errors map to 400, 404 or 500.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error};
use warp::http::StatusCode;

use super::generic::ApiResponse;
use crate::error::QueryError;
use crate::keeper::ProviderKeeper;

type SharedKeeper = Arc<RwLock<ProviderKeeper>>;

/// Converts a query outcome into a JSON reply with the matching status code.
pub(crate) fn query_reply<T: Serialize>(result: Result<T, QueryError>) -> warp::reply::WithStatus<warp::reply::Json> {
    match result {
        Ok(data) => warp::reply::with_status(
            warp::reply::json(&ApiResponse {
                success: true,
                data: Some(data),
                error: None,
            }),
            StatusCode::OK,
        ),
        Err(err) => {
            let status = match &err {
                QueryError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                QueryError::NotFound(_) => StatusCode::NOT_FOUND,
                QueryError::Internal(msg) => {
                    error!("Query failed: {}", msg);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            debug!("Query rejected with {}: {}", status, err);
            warp::reply::with_status(
                warp::reply::json(&ApiResponse::<()> {
                    success: false,
                    data: None,
                    error: Some(err.to_string()),
                }),
                status,
            )
        }
    }
}

// ============================================================================
// CONSUMER CHAINS
// ============================================================================

pub async fn consumer_genesis_handler(
    chain_id: String,
    keeper: SharedKeeper,
) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_consumer_genesis(&chain_id)))
}

pub async fn consumer_chains_handler(keeper: SharedKeeper) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_consumer_chains()))
}

pub async fn consumer_chain_starts_handler(keeper: SharedKeeper) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_consumer_chain_starts()))
}

pub async fn consumer_chain_stops_handler(keeper: SharedKeeper) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_consumer_chain_stops()))
}

pub async fn proposed_consumer_chains_handler(keeper: SharedKeeper) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_proposed_consumer_chain_ids()))
}

pub async fn consumer_chain_status_handler(
    chain_id: String,
    keeper: SharedKeeper,
) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_consumer_chain_status(&chain_id)))
}

pub async fn consumer_validators_handler(
    chain_id: String,
    keeper: SharedKeeper,
) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_consumer_validators(&chain_id)))
}

// ============================================================================
// KEY ASSIGNMENT
// ============================================================================

pub async fn validator_consumer_addr_handler(
    chain_id: String,
    provider_address: String,
    keeper: SharedKeeper,
) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_validator_consumer_addr(&chain_id, &provider_address)))
}

pub async fn validator_provider_addr_handler(
    chain_id: String,
    consumer_address: String,
    keeper: SharedKeeper,
) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_validator_provider_addr(&chain_id, &consumer_address)))
}

pub async fn address_pairs_handler(
    chain_id: String,
    keeper: SharedKeeper,
) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_all_pairs_val_con_addr(&chain_id)))
}

// ============================================================================
// MODULE STATE
// ============================================================================

pub async fn throttle_state_handler(keeper: SharedKeeper) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_throttle_state()))
}

pub async fn reward_denoms_handler(keeper: SharedKeeper) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_registered_consumer_reward_denoms()))
}

pub async fn params_handler(keeper: SharedKeeper) -> Result<impl warp::Reply, warp::Rejection> {
    let keeper = keeper.read().await;
    Ok(query_reply(keeper.query_params()))
}
