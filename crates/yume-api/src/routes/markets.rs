//! Market, order book, pool and position endpoints
//!
//! Snapshots come from the market's background readers when they run, and
//! from a direct fetch otherwise.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use yume::calculator::cumulative_depth;
use yume::{fetch_order_book, fetch_pool, fetch_positions, LoanPosition, OrderBookSnapshot, ReaderState};
use yume_core::MarketDescriptor;

use super::{now_ms, protocol_error, require_market, ApiFailure};
use crate::dto::{ApiError, DepthLevel, DepthResponse, MarketInfo, PoolInfo, PositionInfo, PositionsQuery};
use crate::AppState;

/// Create market routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/markets", get(list_markets))
        .route("/markets/:id", get(get_market))
        .route("/markets/:id/orderbook", get(get_order_book))
        .route("/markets/:id/orderbook/refresh", post(refresh_order_book))
        .route("/markets/:id/depth", get(get_depth))
        .route("/markets/:id/pool", get(get_pool))
        .route("/markets/:id/positions/:owner", get(get_positions))
        .route("/markets/:id/submitted", post(after_submission))
}

fn fresh<T>(data: T) -> ReaderState<T> {
    ReaderState {
        data: Some(data),
        last_updated_ms: Some(now_ms()),
        generation: 1,
        ..ReaderState::default()
    }
}

fn readers_not_running(market_id: &str) -> ApiFailure {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new(
            "readers_not_running",
            format!("No background readers for market {}", market_id),
        )),
    )
}

/// Latest order book: the reader's last good snapshot, or a direct fetch
pub(crate) async fn current_order_book(
    state: &AppState,
    market: &MarketDescriptor,
) -> Result<OrderBookSnapshot, ApiFailure> {
    if let Some(readers) = state.readers(&market.id).await {
        if let Some(snapshot) = readers.order_book.data().await {
            return Ok(snapshot);
        }
    }
    let page_size = state.page_size().await;
    fetch_order_book(state.read_api().as_ref(), market, page_size)
        .await
        .map_err(protocol_error)
}

/// GET /markets - Configured markets
async fn list_markets(State(state): State<AppState>) -> Json<Vec<MarketInfo>> {
    let config = state.config().await;
    Json(config.markets.iter().map(MarketInfo::from).collect())
}

/// GET /markets/:id
async fn get_market(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MarketInfo>, ApiFailure> {
    let market = require_market(&state, &id).await?;
    Ok(Json(MarketInfo::from(&market)))
}

/// GET /markets/:id/orderbook - Asks, bids, spread and reader status
async fn get_order_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReaderState<OrderBookSnapshot>>, ApiFailure> {
    let market = require_market(&state, &id).await?;
    if let Some(readers) = state.readers(&id).await {
        return Ok(Json(readers.order_book.state().await));
    }

    let page_size = state.page_size().await;
    let snapshot = fetch_order_book(state.read_api().as_ref(), &market, page_size)
        .await
        .map_err(protocol_error)?;
    Ok(Json(fresh(snapshot)))
}

/// POST /markets/:id/orderbook/refresh - Refetch now
async fn refresh_order_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    require_market(&state, &id).await?;
    let readers = state
        .readers(&id)
        .await
        .ok_or_else(|| readers_not_running(&id))?;
    for reader in readers.refetchers().await {
        reader.refetch();
    }
    Ok(StatusCode::ACCEPTED)
}

/// POST /markets/:id/submitted - A transaction landed; refetch after the settle delay
async fn after_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    require_market(&state, &id).await?;
    let readers = state
        .readers(&id)
        .await
        .ok_or_else(|| readers_not_running(&id))?;
    let delay = state.settle_delay().await;
    for reader in readers.refetchers().await {
        reader.refetch_after(delay);
    }
    tracing::debug!(market = %id, delay_ms = delay.as_millis() as u64, "Scheduled post-submission refetch");
    Ok(StatusCode::ACCEPTED)
}

/// GET /markets/:id/depth - Cumulative size down each side
async fn get_depth(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DepthResponse>, ApiFailure> {
    let market = require_market(&state, &id).await?;
    let book = current_order_book(&state, &market).await?;

    let levels = |orders: &[yume::Order]| -> Vec<DepthLevel> {
        cumulative_depth(orders)
            .into_iter()
            .map(|(rate, cumulative)| DepthLevel { rate, cumulative })
            .collect()
    };

    Ok(Json(DepthResponse {
        asks: levels(&book.asks),
        bids: levels(&book.bids),
    }))
}

/// GET /markets/:id/pool - Pool state with utilization and rate ladder
async fn get_pool(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReaderState<PoolInfo>>, ApiFailure> {
    let market = require_market(&state, &id).await?;
    let pool_id = market.pool().ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                "pool_not_found",
                format!("Market {} has no liquidity pool", id),
            )),
        )
    })?;

    let readers = state.readers(&id).await;
    if let Some(reader) = readers.as_ref().and_then(|r| r.pool.as_ref()) {
        return Ok(Json(reader.state().await.map(PoolInfo::from)));
    }

    let page_size = state.page_size().await;
    let pool = fetch_pool(state.read_api().as_ref(), pool_id.as_str(), page_size)
        .await
        .map_err(protocol_error)?;
    Ok(Json(fresh(PoolInfo::from(pool))))
}

/// GET /markets/:id/positions/:owner - Loan positions of an address
///
/// Running markets serve a per-owner reader that keeps its last good list.
async fn get_positions(
    State(state): State<AppState>,
    Path((id, owner)): Path<(String, String)>,
    Query(query): Query<PositionsQuery>,
) -> Result<Json<ReaderState<Vec<PositionInfo>>>, ApiFailure> {
    let market = require_market(&state, &id).await?;
    let book_id = market.orderbook_id.as_str().to_string();
    let now = now_ms();
    let to_info = |positions: Vec<LoanPosition>| -> Vec<PositionInfo> {
        positions
            .into_iter()
            .filter(|p| query.all_books || p.is_on_book(&book_id))
            .map(|p| PositionInfo::new(p, &owner, now))
            .collect()
    };

    if let Some(reader) = state.position_reader(&market, &owner).await {
        return Ok(Json(reader.first_result().await.map(to_info)));
    }

    let page_size = state.page_size().await;
    let positions = fetch_positions(state.read_api().as_ref(), &market, &owner, None, page_size)
        .await
        .map_err(protocol_error)?;
    Ok(Json(fresh(to_info(positions))))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::routes::test_support::{seeded_api, send, state, BOOK, PACKAGE};
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use sui_rpc_client::testing::InMemoryReadApi;
    use yume::constants::position_struct_type;
    use yume::Refetch;

    /// Borrower 0xb0b holds one position on this market's book and one elsewhere
    fn api_with_positions() -> Arc<InMemoryReadApi> {
        let api = seeded_api();
        let ty = position_struct_type(PACKAGE);
        let fields = |book: &str| {
            json!({
                "loan_id": { "id": "0x10a" },
                "side": 1,
                "borrower": "0xb0b",
                "principal": "100000000",
                "rate": "500",
                "maturity_time": "1",
                "status": 0,
                "book_id": book
            })
        };
        api.insert_owned("0xb0b", &ty, "0xf1", fields(BOOK));
        api.insert_owned("0xb0b", &ty, "0xf2", fields("0xd1ff"));
        api
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test]
    async fn test_list_markets() {
        let (status, body) = send(state(seeded_api()), "GET", "/markets", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "sui-sui-7d");
        assert_eq!(body[0]["durationLabel"], "7 Day");
        assert_eq!(body[0]["maxLtvPercent"], "90.00%");
        assert_eq!(body[0]["deployed"], true);
    }

    #[tokio::test]
    async fn test_unknown_market_is_404() {
        let (status, body) = send(state(seeded_api()), "GET", "/markets/eth-7d/orderbook", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "market_not_found");
    }

    #[tokio::test]
    async fn test_order_book_direct_fetch() {
        let (status, body) = send(state(seeded_api()), "GET", "/markets/sui-sui-7d/orderbook", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["asks"][0]["rate"], 500);
        assert_eq!(body["data"]["bids"][0]["rate"], 450);
        assert_eq!(body["data"]["spread"], 50);
        assert_eq!(body["error"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_order_book_read_failure() {
        let api = seeded_api();
        api.set_failing(true);
        let (status, body) = send(state(api), "GET", "/markets/sui-sui-7d/orderbook", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "state_unavailable");
    }

    #[tokio::test]
    async fn test_depth() {
        let (status, body) = send(state(seeded_api()), "GET", "/markets/sui-sui-7d/depth", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["asks"], json!([{ "rate": 500, "cumulative": 1_000_000 }]));
    }

    #[tokio::test]
    async fn test_pool_info() {
        let (status, body) = send(state(seeded_api()), "GET", "/markets/sui-sui-7d/pool", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["availableBalance"], 30_000);
        assert_eq!(body["data"]["utilizationBps"], 8_000);
        assert_eq!(body["data"]["buckets"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_positions() {
        let api = api_with_positions();
        let (status, body) =
            send(state(api.clone()), "GET", "/markets/sui-sui-7d/positions/0xb0b", None).await;
        assert_eq!(status, StatusCode::OK);
        let positions = body["data"].as_array().unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0]["totalDue"], 105_000_000u64);
        assert_eq!(positions[0]["canRepay"], true);
        assert_eq!(positions[0]["canLiquidate"], true);
        assert_eq!(body["error"], Value::Null);

        let (_, body) = send(
            state(api),
            "GET",
            "/markets/sui-sui-7d/positions/0xb0b?allBooks=true",
            None,
        )
        .await;
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_positions_reader_keeps_last_good_list() {
        let api = api_with_positions();
        let app_state = state(api.clone());
        app_state.start_pollers().await;
        settle().await;

        let (status, body) =
            send(app_state.clone(), "GET", "/markets/sui-sui-7d/positions/0xb0b", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["generation"], 1);
        assert_eq!(body["error"], Value::Null);

        api.set_failing(true);
        let (status, _) =
            send(app_state.clone(), "POST", "/markets/sui-sui-7d/orderbook/refresh", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        settle().await;

        let (status, body) = send(
            app_state.clone(),
            "GET",
            "/markets/sui-sui-7d/positions/0xb0b?allBooks=true",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"][0]["borrower"], "0xb0b");
        assert_eq!(body["generation"], 1);
        assert!(body["error"].is_string());

        app_state.stop_pollers().await;
        assert!(app_state.readers("sui-sui-7d").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_order_book_reader_keeps_snapshot_after_failure() {
        let api = seeded_api();
        let app_state = state(api.clone());
        app_state.start_pollers().await;
        settle().await;

        let readers = app_state.readers("sui-sui-7d").await.unwrap();
        let before = readers.order_book.state().await;
        assert_eq!(before.generation, 1);
        assert_eq!(before.error, None);

        api.set_failing(true);
        readers.order_book.refetch();
        settle().await;

        let after = readers.order_book.state().await;
        let book = after.data.unwrap();
        assert_eq!(book.asks.len(), 1);
        assert_eq!(book.asks[0].rate, 500);
        assert_eq!(book.bids.len(), 1);
        assert_eq!(book.bids[0].rate, 450);
        assert_eq!(book.asks, before.data.unwrap().asks);
        assert!(after.error.is_some());
        assert_eq!(after.generation, 1);
        drop(readers);

        let (status, body) = send(app_state.clone(), "GET", "/markets/sui-sui-7d/orderbook", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["asks"][0]["rate"], 500);
        assert_eq!(body["data"]["bids"][0]["rate"], 450);
        assert!(body["error"].is_string());

        app_state.stop_pollers().await;
    }

    #[tokio::test]
    async fn test_refresh_requires_readers() {
        let (status, body) =
            send(state(seeded_api()), "POST", "/markets/sui-sui-7d/orderbook/refresh", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "readers_not_running");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_with_readers() {
        let app_state = state(seeded_api());
        app_state.start_pollers().await;
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;

        let (status, body) = send(app_state.clone(), "GET", "/markets/sui-sui-7d/orderbook", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["generation"], 1);

        let (status, _) = send(app_state.clone(), "POST", "/markets/sui-sui-7d/orderbook/refresh", None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;

        let (_, body) = send(app_state.clone(), "GET", "/markets/sui-sui-7d/orderbook", None).await;
        assert_eq!(body["generation"], 2);
        app_state.stop_pollers().await;
    }
}
