//! Read-only calculators: loan cost, pool ladder, LP share previews

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};

use yume::calculator::{self, RateBucket};
use yume::fetch_pool;

use super::{bad_request, protocol_error, ApiFailure};
use crate::dto::{LadderQuery, LoanPreviewQuery, LoanPreviewResponse, PoolPreviewQuery, PoolPreviewResponse};
use crate::AppState;

/// Create preview routes, nested under `/preview`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/loan", get(loan_preview))
        .route("/ladder", get(ladder_preview))
        .route("/pool/:pool_id", get(pool_preview))
}

/// GET /preview/loan?principal=..&rateBps=..[&ltvBps=..]
async fn loan_preview(Query(query): Query<LoanPreviewQuery>) -> Json<LoanPreviewResponse> {
    Json(LoanPreviewResponse {
        interest: calculator::interest(query.principal, query.rate_bps),
        total_due: calculator::total_due(query.principal, query.rate_bps),
        rate_percent: calculator::bps_to_percent(query.rate_bps),
        required_collateral: query
            .ltv_bps
            .map(|ltv| calculator::required_collateral(query.principal, ltv)),
    })
}

/// GET /preview/ladder?minRate=..&maxRate=..&numBuckets=..[&deployed=..]
async fn ladder_preview(
    Query(query): Query<LadderQuery>,
) -> Result<Json<Vec<RateBucket>>, ApiFailure> {
    if query.max_rate < query.min_rate {
        return Err(bad_request("maxRate must not be below minRate"));
    }
    Ok(Json(calculator::rate_buckets(
        query.min_rate,
        query.max_rate,
        query.num_buckets,
        query.deployed,
    )))
}

/// GET /preview/pool/:pool_id?shares=..&amount=..
async fn pool_preview(
    State(state): State<AppState>,
    Path(pool_id): Path<String>,
    Query(query): Query<PoolPreviewQuery>,
) -> Result<Json<PoolPreviewResponse>, ApiFailure> {
    let page_size = state.page_size().await;
    let pool = fetch_pool(state.read_api().as_ref(), &pool_id, page_size)
        .await
        .map_err(protocol_error)?;

    Ok(Json(PoolPreviewResponse {
        share_value: query.shares.map(|s| pool.share_value(s)),
        withdraw_amount: query.shares.map(|s| pool.withdraw_preview(s)),
        deposit_shares: query.amount.map(|a| pool.deposit_preview(a)),
    }))
}
