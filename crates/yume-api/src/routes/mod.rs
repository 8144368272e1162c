//! API route handlers

pub mod build;
pub mod health;
pub mod markets;
pub mod preview;

use axum::{http::StatusCode, routing::get, Json, Router};
use yume::BuildError;
use yume_core::{MarketDescriptor, ProtocolError, TxError};

use crate::dto::ApiError;
use crate::state::StateError;
use crate::AppState;

/// Error half of every handler result
pub(crate) type ApiFailure = (StatusCode, Json<ApiError>);

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/status", get(health::rpc_status))
        .merge(markets::router())
        .merge(build::router())
        .nest("/preview", preview::router())
        .with_state(state)
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

pub(crate) fn protocol_error(error: ProtocolError) -> ApiFailure {
    (
        status(error.status_code()),
        Json(ApiError::new(error.error_code(), error.to_string())),
    )
}

pub(crate) fn tx_error(error: TxError) -> ApiFailure {
    (
        status(error.status_code()),
        Json(ApiError::new(error.error_code(), error.to_string())),
    )
}

pub(crate) fn build_error(error: BuildError) -> ApiFailure {
    match error {
        BuildError::SelfMatch { .. } => protocol_error(ProtocolError::ActionNotAllowed {
            reason: error.to_string(),
        }),
        other => tx_error(other.into()),
    }
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiFailure {
    (StatusCode::BAD_REQUEST, Json(ApiError::bad_request(message)))
}

/// Look up a configured market or answer 404
pub(crate) async fn require_market(
    state: &AppState,
    market_id: &str,
) -> Result<MarketDescriptor, ApiFailure> {
    state.market(market_id).await.map_err(|e| match e {
        StateError::UnknownMarket { .. } => (
            StatusCode::NOT_FOUND,
            Json(ApiError::new("market_not_found", e.to_string())),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::internal(other.to_string())),
        ),
    })
}

pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
