//! Data Transfer Objects for API requests and responses

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sui_ptb::ProgrammableTransaction;
use yume::calculator::{self, RateBucket};
use yume::constants::{duration_label, risk_tier_label};
use yume::{CoinInput, LoanPosition, PoolState};
use yume_core::MarketDescriptor;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Fullnode status response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcStatusResponse {
    pub connected: bool,
    pub url: String,
    pub network: String,
    pub chain_identifier: Option<String>,
}

/// Generic API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }
}

// =============================================================================
// Market views
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    #[serde(flatten)]
    pub descriptor: MarketDescriptor,
    pub duration_label: String,
    pub risk_tier_label: String,
    pub max_ltv_percent: String,
    pub deployed: bool,
    pub has_pool: bool,
}

impl From<&MarketDescriptor> for MarketInfo {
    fn from(market: &MarketDescriptor) -> Self {
        Self {
            descriptor: market.clone(),
            duration_label: duration_label(market.duration_bucket),
            risk_tier_label: risk_tier_label(market.risk_tier),
            max_ltv_percent: calculator::bps_to_percent(market.max_ltv_bps),
            deployed: market.is_deployed(),
            has_pool: market.pool().is_some(),
        }
    }
}

/// Pool state with derived values
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInfo {
    #[serde(flatten)]
    pub pool: PoolState,
    pub total_value: u64,
    pub utilization_bps: u64,
    pub utilization_percent: String,
    pub buckets: Vec<RateBucket>,
}

impl From<PoolState> for PoolInfo {
    fn from(pool: PoolState) -> Self {
        let utilization_bps = pool.utilization_bps();
        Self {
            total_value: pool.total_value(),
            utilization_bps,
            utilization_percent: calculator::bps_to_percent(utilization_bps),
            buckets: pool.buckets(),
            pool,
        }
    }
}

/// Loan position with derived values relative to a viewer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInfo {
    #[serde(flatten)]
    pub position: LoanPosition,
    pub status_label: String,
    pub rate_percent: String,
    pub interest: u64,
    pub total_due: u64,
    pub is_matured: bool,
    pub can_repay: bool,
    pub can_liquidate: bool,
}

impl PositionInfo {
    pub fn new(position: LoanPosition, viewer: &str, now_ms: u64) -> Self {
        Self {
            status_label: position.status.label().to_string(),
            rate_percent: calculator::bps_to_percent(position.rate),
            interest: position.interest(),
            total_due: position.total_due(),
            is_matured: position.is_matured(now_ms),
            can_repay: position.can_repay(viewer),
            can_liquidate: position.can_liquidate(now_ms),
            position,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsQuery {
    /// Include positions from every order book, not just this market's
    #[serde(default)]
    pub all_books: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepthLevel {
    pub rate: u64,
    pub cumulative: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthResponse {
    pub asks: Vec<DepthLevel>,
    pub bids: Vec<DepthLevel>,
}

// =============================================================================
// Transaction building
// =============================================================================

/// Unsigned batch ready for the wallet
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResponse {
    /// Transaction in the wallet's JSON format
    pub transaction: Value,
    /// `package::module::function` of each move call, in order
    pub move_calls: Vec<String>,
    pub command_count: usize,
}

impl BuildResponse {
    pub fn from_transaction(tx: &ProgrammableTransaction) -> Result<Self, serde_json::Error> {
        Ok(Self {
            transaction: tx.to_json()?,
            move_calls: tx.move_calls().map(|call| call.target()).collect(),
            command_count: tx.commands.len(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMarketBody {
    pub duration_bucket: u64,
    pub risk_tier: u8,
    pub max_ltv_bps: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendOrderBody {
    pub deposit: CoinInput,
    pub rate: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowOrderBody {
    pub amount: u64,
    pub rate: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderBody {
    pub order_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchBody {
    pub taker_order_id: u64,
    pub maker_order_id: u64,
    pub collateral: CoinInput,
}

/// Either an explicit payment coin, or principal + rate to split the total due
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepayBody {
    pub position_id: String,
    #[serde(default)]
    pub payment: Option<CoinInput>,
    #[serde(default)]
    pub principal: Option<u64>,
    #[serde(default)]
    pub rate_bps: Option<u64>,
    #[serde(default)]
    pub source_coin_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidateBody {
    pub loan_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePoolBody {
    pub min_rate: u64,
    pub max_rate: u64,
    pub num_buckets: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDepositBody {
    pub deposit: CoinInput,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolWithdrawBody {
    pub shares: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickBorrowBody {
    pub borrower: String,
    pub maker_order_id: u64,
    pub borrow_amount: u64,
    #[serde(default)]
    pub collateral_source_coin_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickBorrowResponse {
    #[serde(flatten)]
    pub build: BuildResponse,
    /// Id the new borrow order receives
    pub taker_order_id: u64,
    pub rate: u64,
    pub collateral_amount: u64,
    pub interest: u64,
    pub total_due: u64,
}

// =============================================================================
// Previews
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPreviewQuery {
    pub principal: u64,
    pub rate_bps: u64,
    #[serde(default)]
    pub ltv_bps: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPreviewResponse {
    pub interest: u64,
    pub total_due: u64,
    pub rate_percent: String,
    pub required_collateral: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LadderQuery {
    pub min_rate: u64,
    pub max_rate: u64,
    pub num_buckets: u64,
    #[serde(default)]
    pub deployed: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolPreviewQuery {
    /// Shares to burn
    #[serde(default)]
    pub shares: Option<u64>,
    /// Base amount to deposit
    #[serde(default)]
    pub amount: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolPreviewResponse {
    pub share_value: Option<u64>,
    pub withdraw_amount: Option<u64>,
    pub deposit_shares: Option<u64>,
}
