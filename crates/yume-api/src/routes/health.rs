//! Health and fullnode status endpoints

use axum::{extract::State, Json};

use crate::dto::{HealthResponse, RpcStatusResponse};
use crate::AppState;

/// GET /health - Check API health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// GET /status - Fullnode reachability
pub async fn rpc_status(State(state): State<AppState>) -> Json<RpcStatusResponse> {
    let config = state.config().await;

    let chain_identifier = match state.rpc_client() {
        Some(client) => match client.chain_identifier().await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(url = %config.rpc.url, error = %e, "Fullnode status check failed");
                None
            }
        },
        None => None,
    };

    Json(RpcStatusResponse {
        connected: chain_identifier.is_some(),
        url: config.rpc.url,
        network: config.network.as_str().to_string(),
        chain_identifier,
    })
}
