//! Transaction build endpoints
//!
//! Each handler returns an unsigned batch for the wallet to sign. Nothing is
//! submitted from here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use sui_ptb::ProgrammableTransaction;
use yume::calculator;
use yume::tx_builder::{
    quick_borrow_collateral, CancelOrderRequest, CreateMarketRequest, CreatePoolRequest,
    LiquidateRequest, MatchSettleRequest, PlaceBorrowOrderRequest, PlaceLendOrderRequest,
    PoolDepositRequest, PoolWithdrawRequest, QuickBorrowRequest, RepayRequest,
    RepayWithAmountRequest,
};
use yume::{
    build_cancel_order, build_create_market, build_create_pool, build_liquidate,
    build_match_and_settle, build_place_borrow_order, build_place_lend_order, build_pool_deposit,
    build_pool_withdraw, build_quick_borrow, build_rebalance_pool, build_repay,
    build_repay_with_amount, fetch_order_book, BuildError,
};
use yume_core::{ObjectId, TxError};

use super::{bad_request, build_error, protocol_error, require_market, tx_error, ApiFailure};
use crate::dto::{
    ApiError, BorrowOrderBody, BuildResponse, CancelOrderBody, CreateMarketBody, CreatePoolBody,
    LendOrderBody, LiquidateBody, MatchBody, PoolDepositBody, PoolWithdrawBody, QuickBorrowBody,
    QuickBorrowResponse, RepayBody,
};
use crate::AppState;

type BuildResult = Result<Json<BuildResponse>, ApiFailure>;

/// Create build routes
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/markets/:id/build/create-market", post(create_market))
        .route("/markets/:id/build/lend", post(place_lend_order))
        .route("/markets/:id/build/borrow", post(place_borrow_order))
        .route("/markets/:id/build/cancel", post(cancel_order))
        .route("/markets/:id/build/match", post(match_and_settle))
        .route("/markets/:id/build/repay", post(repay))
        .route("/markets/:id/build/liquidate", post(liquidate))
        .route("/markets/:id/build/quick-borrow", post(quick_borrow))
        .route("/markets/:id/build/pool/create", post(create_pool))
        .route("/markets/:id/build/pool/deposit", post(pool_deposit))
        .route("/markets/:id/build/pool/withdraw", post(pool_withdraw))
        .route("/markets/:id/build/pool/rebalance", post(rebalance_pool))
}

fn serialized(tx: &ProgrammableTransaction) -> Result<BuildResponse, ApiFailure> {
    BuildResponse::from_transaction(tx).map_err(|e| {
        tx_error(TxError::SerializationFailed {
            message: e.to_string(),
        })
    })
}

fn respond(built: Result<ProgrammableTransaction, BuildError>) -> BuildResult {
    let tx = built.map_err(build_error)?;
    Ok(Json(serialized(&tx)?))
}

/// POST /markets/:id/build/create-market
async fn create_market(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CreateMarketBody>,
) -> BuildResult {
    let market = require_market(&state, &id).await?;
    respond(build_create_market(
        &market.type_args(),
        &CreateMarketRequest {
            duration_bucket: body.duration_bucket,
            risk_tier: body.risk_tier,
            max_ltv_bps: body.max_ltv_bps,
        },
    ))
}

/// POST /markets/:id/build/lend
async fn place_lend_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LendOrderBody>,
) -> BuildResult {
    let market = require_market(&state, &id).await?;
    respond(build_place_lend_order(
        &market,
        &PlaceLendOrderRequest {
            deposit: body.deposit,
            rate: body.rate,
        },
    ))
}

/// POST /markets/:id/build/borrow
async fn place_borrow_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<BorrowOrderBody>,
) -> BuildResult {
    let market = require_market(&state, &id).await?;
    respond(build_place_borrow_order(
        &market,
        &PlaceBorrowOrderRequest {
            amount: body.amount,
            rate: body.rate,
        },
    ))
}

/// POST /markets/:id/build/cancel
async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CancelOrderBody>,
) -> BuildResult {
    let market = require_market(&state, &id).await?;
    respond(build_cancel_order(
        &market,
        &CancelOrderRequest {
            order_id: body.order_id,
        },
    ))
}

/// POST /markets/:id/build/match - match_orders and settle in one batch
async fn match_and_settle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MatchBody>,
) -> BuildResult {
    let market = require_market(&state, &id).await?;
    respond(build_match_and_settle(
        &market,
        &MatchSettleRequest {
            taker_order_id: body.taker_order_id,
            maker_order_id: body.maker_order_id,
            collateral: body.collateral,
        },
    ))
}

/// POST /markets/:id/build/repay
///
/// Takes an explicit payment coin, or principal and rate to split the
/// exact total due.
async fn repay(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RepayBody>,
) -> BuildResult {
    let market = require_market(&state, &id).await?;
    let position_id = ObjectId::new(body.position_id);

    match (body.payment, body.principal, body.rate_bps) {
        (Some(payment), _, _) => respond(build_repay(
            &market,
            &RepayRequest {
                position_id,
                payment,
            },
        )),
        (None, Some(principal), Some(rate_bps)) => respond(build_repay_with_amount(
            &market,
            &RepayWithAmountRequest {
                position_id,
                principal,
                rate_bps,
                source_coin_id: body.source_coin_id.map(ObjectId::new),
            },
        )),
        _ => Err(bad_request(
            "repay needs either a payment coin or principal and rateBps",
        )),
    }
}

/// POST /markets/:id/build/liquidate
async fn liquidate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LiquidateBody>,
) -> BuildResult {
    let market = require_market(&state, &id).await?;
    respond(build_liquidate(
        &market,
        &LiquidateRequest {
            loan_id: ObjectId::new(body.loan_id),
        },
    ))
}

/// POST /markets/:id/build/pool/create
async fn create_pool(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CreatePoolBody>,
) -> BuildResult {
    let market = require_market(&state, &id).await?;
    respond(build_create_pool(
        &market,
        &CreatePoolRequest {
            min_rate: body.min_rate,
            max_rate: body.max_rate,
            num_buckets: body.num_buckets,
        },
    ))
}

/// POST /markets/:id/build/pool/deposit
async fn pool_deposit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PoolDepositBody>,
) -> BuildResult {
    let market = require_market(&state, &id).await?;
    respond(build_pool_deposit(
        &market,
        &PoolDepositRequest {
            deposit: body.deposit,
        },
    ))
}

/// POST /markets/:id/build/pool/withdraw
async fn pool_withdraw(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PoolWithdrawBody>,
) -> BuildResult {
    let market = require_market(&state, &id).await?;
    respond(build_pool_withdraw(
        &market,
        &PoolWithdrawRequest { shares: body.shares },
    ))
}

/// POST /markets/:id/build/pool/rebalance
async fn rebalance_pool(State(state): State<AppState>, Path(id): Path<String>) -> BuildResult {
    let market = require_market(&state, &id).await?;
    respond(build_rebalance_pool(&market))
}

/// POST /markets/:id/build/quick-borrow
///
/// Reads the book fresh so the new order's id is the current `next_order_id`.
async fn quick_borrow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<QuickBorrowBody>,
) -> Result<Json<QuickBorrowResponse>, ApiFailure> {
    let market = require_market(&state, &id).await?;
    let page_size = state.page_size().await;
    let book = fetch_order_book(state.read_api().as_ref(), &market, page_size)
        .await
        .map_err(protocol_error)?;

    let maker = book.find(body.maker_order_id).cloned().ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                "order_not_found",
                format!("Order {} is not in the book", body.maker_order_id),
            )),
        )
    })?;

    let rate = maker.rate;
    let request = QuickBorrowRequest {
        borrower: body.borrower,
        maker,
        borrow_amount: body.borrow_amount,
        next_order_id: book.next_order_id,
        collateral_source: body.collateral_source_coin_id.map(ObjectId::new),
    };
    let tx = build_quick_borrow(&market, &request).map_err(build_error)?;

    tracing::debug!(
        market = %id,
        maker = body.maker_order_id,
        taker = book.next_order_id,
        "Built quick borrow"
    );

    Ok(Json(QuickBorrowResponse {
        build: serialized(&tx)?,
        taker_order_id: book.next_order_id,
        rate,
        collateral_amount: quick_borrow_collateral(&market, body.borrow_amount),
        interest: calculator::interest(body.borrow_amount, rate),
        total_due: calculator::total_due(body.borrow_amount, rate),
    }))
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{config, seeded_api, send, state};
    use axum::http::StatusCode;
    use serde_json::json;
    use yume::tx_builder::quick_borrow_collateral;

    fn calls(body: &serde_json::Value) -> Vec<String> {
        body["moveCalls"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c.as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_build_lend_order() {
        let (status, body) = send(
            state(seeded_api()),
            "POST",
            "/markets/sui-sui-7d/build/lend",
            Some(json!({ "deposit": { "kind": "fromGas", "amount": 1_000_000 }, "rate": 500 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let calls = calls(&body);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].ends_with("::market::place_lend_order"));
        assert_eq!(body["commandCount"], 2);
        assert!(body["transaction"].is_object());
    }

    #[tokio::test]
    async fn test_build_rejects_zero_rate() {
        let (status, body) = send(
            state(seeded_api()),
            "POST",
            "/markets/sui-sui-7d/build/borrow",
            Some(json!({ "amount": 1_000, "rate": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }

    #[tokio::test]
    async fn test_build_match_settles_in_same_batch() {
        let (status, body) = send(
            state(seeded_api()),
            "POST",
            "/markets/sui-sui-7d/build/match",
            Some(json!({
                "takerOrderId": 1,
                "makerOrderId": 0,
                "collateral": { "kind": "existing", "coinId": "0xc011" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let calls = calls(&body);
        assert_eq!(calls.len(), 2);
        assert!(calls[0].ends_with("::market::match_orders"));
        assert!(calls[1].ends_with("::market::settle"));
    }

    #[tokio::test]
    async fn test_repay_needs_payment_or_amount() {
        let (status, _) = send(
            state(seeded_api()),
            "POST",
            "/markets/sui-sui-7d/build/repay",
            Some(json!({ "positionId": "0xf1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            state(seeded_api()),
            "POST",
            "/markets/sui-sui-7d/build/repay",
            Some(json!({ "positionId": "0xf1", "principal": 1_000_000, "rateBps": 500 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(calls(&body).iter().any(|c| c.ends_with("::repay")));
    }

    #[tokio::test]
    async fn test_quick_borrow() {
        let (status, body) = send(
            state(seeded_api()),
            "POST",
            "/markets/sui-sui-7d/build/quick-borrow",
            Some(json!({ "borrower": "0xb0b", "makerOrderId": 0, "borrowAmount": 900_000 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["takerOrderId"], 2);
        assert_eq!(body["rate"], 500);
        assert_eq!(
            body["collateralAmount"],
            quick_borrow_collateral(&config().markets[0], 900_000)
        );
        assert_eq!(body["interest"], 45_000);
        assert_eq!(body["totalDue"], 945_000);

        let calls = calls(&body);
        assert_eq!(calls.len(), 3);
        assert!(calls[0].ends_with("::market::place_borrow_order"));
        assert!(calls[1].ends_with("::market::match_orders"));
        assert!(calls[2].ends_with("::market::settle"));
    }

    #[tokio::test]
    async fn test_quick_borrow_self_match() {
        let (status, body) = send(
            state(seeded_api()),
            "POST",
            "/markets/sui-sui-7d/build/quick-borrow",
            Some(json!({ "borrower": "0xa1ce", "makerOrderId": 0, "borrowAmount": 900_000 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "action_not_allowed");
    }

    #[tokio::test]
    async fn test_quick_borrow_unknown_maker() {
        let (status, body) = send(
            state(seeded_api()),
            "POST",
            "/markets/sui-sui-7d/build/quick-borrow",
            Some(json!({ "borrower": "0xb0b", "makerOrderId": 99, "borrowAmount": 900_000 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "order_not_found");
    }

    #[tokio::test]
    async fn test_build_unknown_market() {
        let (status, body) = send(
            state(seeded_api()),
            "POST",
            "/markets/nope/build/pool/rebalance",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "market_not_found");
    }
}
