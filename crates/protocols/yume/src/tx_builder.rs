//! Yume transaction builders (programmable transaction blocks)
//!
//! Every builder is pure: it validates the request against the market
//! descriptor and returns an unsigned batch, or fails before anything
//! reaches the network.
//!
//! 1. Create Market - order book + vault for a (base, collateral) pair
//! 2. Place Lend Order - deposit base at a rate
//! 3. Place Borrow Order - declare an amount and a max rate
//! 4. Cancel Order - remove an order, refunding a lend deposit
//! 5. Match + Settle - pair two orders and lock collateral atomically
//! 6. Repay - return principal + interest, release collateral
//! 7. Liquidate - claim collateral of a matured loan (permissionless)
//! 8. Pool - create, deposit, withdraw, rebalance
//! 9. Quick Borrow - place borrow + match + settle in one batch
//!
//! `match_orders` returns a receipt with no `drop` ability on chain. Here it
//! is a [`MatchReceipt`] that can only be consumed by `settle`, and batches
//! that match are finished through [`Settled`], which only `settle` creates.

use serde::{Deserialize, Serialize};
use sui_ptb::{Argument, ProgrammableTransaction, PtbBuilder, PtbError};
use yume_core::constants::{BPS_DENOMINATOR, SUI_CLOCK_ID};
use yume_core::{MarketDescriptor, MarketTypeArgs, ObjectId, TxError};

use crate::calculator;
use crate::constants::modules;
use crate::state::{Order, OrderSide};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Empty address, non-positive amount or rate, missing type arguments
    InvalidInput(String),
    /// The maker order belongs to the borrower
    SelfMatch { order_id: u64 },
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::SelfMatch { order_id } => {
                write!(f, "Order {} belongs to the borrower and cannot be matched", order_id)
            }
        }
    }
}

impl std::error::Error for BuildError {}

impl From<PtbError> for BuildError {
    fn from(err: PtbError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<BuildError> for TxError {
    fn from(err: BuildError) -> Self {
        let message = match err {
            BuildError::InvalidInput(msg) => msg,
            other => other.to_string(),
        };
        TxError::InvalidInput { message }
    }
}

type Result<T> = std::result::Result<T, BuildError>;

fn require_type_args(args: &MarketTypeArgs) -> Result<()> {
    if args.package_id.trim().is_empty() {
        return Err(BuildError::InvalidInput("package id is empty".to_string()));
    }
    if args.base.trim().is_empty() || args.collateral.trim().is_empty() {
        return Err(BuildError::InvalidInput(
            "base and collateral type arguments are required".to_string(),
        ));
    }
    Ok(())
}

fn require_id(label: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(BuildError::InvalidInput(format!("{} address is empty", label)));
    }
    Ok(())
}

fn require_positive(label: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(BuildError::InvalidInput(format!("{} must be positive", label)));
    }
    Ok(())
}

fn require_ltv(ltv_bps: u64) -> Result<()> {
    if ltv_bps == 0 || ltv_bps > BPS_DENOMINATOR {
        return Err(BuildError::InvalidInput(format!(
            "max LTV must be in 1..={} bps, got {}",
            BPS_DENOMINATOR, ltv_bps
        )));
    }
    Ok(())
}

/// `market::<function><BASE, COLLATERAL>(arguments)`
fn market_call(
    ptb: &mut PtbBuilder,
    args: &MarketTypeArgs,
    function: &str,
    arguments: Vec<Argument>,
) -> Argument {
    ptb.move_call(
        &args.package_id,
        modules::MARKET,
        function,
        vec![args.base.clone(), args.collateral.clone()],
        arguments,
    )
}

/// Type args of a market whose order book is deployed
fn book_market(market: &MarketDescriptor) -> Result<MarketTypeArgs> {
    let args = market.type_args();
    require_type_args(&args)?;
    require_id("order book", market.orderbook_id.as_str())?;
    Ok(args)
}

fn book_and_vault_market(market: &MarketDescriptor) -> Result<MarketTypeArgs> {
    let args = book_market(market)?;
    require_id("vault", market.vault_id.as_str())?;
    Ok(args)
}

fn pool_id(market: &MarketDescriptor) -> Result<&ObjectId> {
    market
        .pool()
        .ok_or_else(|| BuildError::InvalidInput(format!("market {} has no pool", market.id)))
}

/// Coin handed to a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CoinInput {
    /// An owned coin, used whole
    #[serde(rename_all = "camelCase")]
    Existing { coin_id: ObjectId },
    /// An exact amount split off an owned coin
    #[serde(rename_all = "camelCase")]
    SplitFrom { source_coin_id: ObjectId, amount: u64 },
    /// An exact amount split off the gas coin
    #[serde(rename_all = "camelCase")]
    FromGas { amount: u64 },
}

impl CoinInput {
    pub fn existing(coin_id: impl Into<String>) -> Self {
        Self::Existing {
            coin_id: ObjectId::new(coin_id),
        }
    }

    pub fn split_from(source_coin_id: impl Into<String>, amount: u64) -> Self {
        Self::SplitFrom {
            source_coin_id: ObjectId::new(source_coin_id),
            amount,
        }
    }

    pub fn from_gas(amount: u64) -> Self {
        Self::FromGas { amount }
    }

    /// Amount moved, when known up front
    pub fn amount(&self) -> Option<u64> {
        match self {
            Self::Existing { .. } => None,
            Self::SplitFrom { amount, .. } | Self::FromGas { amount } => Some(*amount),
        }
    }

    /// Validate and append whatever commands produce the coin.
    fn resolve(&self, ptb: &mut PtbBuilder, label: &str) -> Result<Argument> {
        match self {
            Self::Existing { coin_id } => {
                require_id(label, coin_id.as_str())?;
                Ok(ptb.object(coin_id.as_str())?)
            }
            Self::SplitFrom {
                source_coin_id,
                amount,
            } => {
                require_id(label, source_coin_id.as_str())?;
                require_positive(&format!("{} amount", label), *amount)?;
                let source = ptb.object(source_coin_id.as_str())?;
                Ok(ptb.split_coin(source, *amount))
            }
            Self::FromGas { amount } => {
                require_positive(&format!("{} amount", label), *amount)?;
                Ok(ptb.split_coin(Argument::GasCoin, *amount))
            }
        }
    }
}

// =============================================================================
// Match receipt
// =============================================================================

/// Result of `match_orders` inside a batch under construction.
///
/// Consumed by value by `settle`. Not `Clone`, `Copy`, `Default` or
/// serializable, and only this module can create one.
#[derive(Debug)]
#[must_use = "a match receipt must be settled in the same batch"]
pub struct MatchReceipt {
    handle: Argument,
}

/// Proof that a receipt was settled. Only `settle` creates it.
#[derive(Debug)]
pub struct Settled {
    _sealed: (),
}

fn match_orders(
    ptb: &mut PtbBuilder,
    args: &MarketTypeArgs,
    book: Argument,
    taker_order_id: u64,
    maker_order_id: u64,
) -> Result<MatchReceipt> {
    let taker = ptb.pure_u64(taker_order_id);
    let maker = ptb.pure_u64(maker_order_id);
    let clock = ptb.object(SUI_CLOCK_ID)?;
    let handle = market_call(ptb, args, "match_orders", vec![book, taker, maker, clock]);
    Ok(MatchReceipt { handle })
}

fn settle(
    ptb: &mut PtbBuilder,
    args: &MarketTypeArgs,
    receipt: MatchReceipt,
    collateral: Argument,
    book: Argument,
    vault: Argument,
) -> Result<Settled> {
    let clock = ptb.object(SUI_CLOCK_ID)?;
    market_call(
        ptb,
        args,
        "settle",
        vec![receipt.handle, collateral, book, vault, clock],
    );
    Ok(Settled { _sealed: () })
}

/// Finish a batch that matched. Requires the settle proof.
fn finish_settled(ptb: PtbBuilder, _proof: Settled) -> Result<ProgrammableTransaction> {
    Ok(ptb.finish()?)
}

// =============================================================================
// Tx 1: Create Market
// =============================================================================

pub struct CreateMarketRequest {
    /// Loan term in seconds (0 = open-term)
    pub duration_bucket: u64,
    pub risk_tier: u8,
    pub max_ltv_bps: u64,
}

pub fn build_create_market(
    args: &MarketTypeArgs,
    req: &CreateMarketRequest,
) -> Result<ProgrammableTransaction> {
    require_type_args(args)?;
    require_ltv(req.max_ltv_bps)?;

    let mut ptb = PtbBuilder::new();
    let duration = ptb.pure_u64(req.duration_bucket);
    let tier = ptb.pure_u8(req.risk_tier);
    let ltv = ptb.pure_u64(req.max_ltv_bps);
    market_call(&mut ptb, args, "create_market", vec![duration, tier, ltv]);
    Ok(ptb.finish()?)
}

// =============================================================================
// Tx 2: Place Lend Order
// =============================================================================

pub struct PlaceLendOrderRequest {
    /// Base coin locked in the book until matched or cancelled
    pub deposit: CoinInput,
    pub rate: u64,
}

pub fn build_place_lend_order(
    market: &MarketDescriptor,
    req: &PlaceLendOrderRequest,
) -> Result<ProgrammableTransaction> {
    let args = book_market(market)?;
    require_positive("rate", req.rate)?;

    let mut ptb = PtbBuilder::new();
    let coin = req.deposit.resolve(&mut ptb, "deposit coin")?;
    let book = ptb.object(market.orderbook_id.as_str())?;
    let rate = ptb.pure_u64(req.rate);
    let clock = ptb.object(SUI_CLOCK_ID)?;
    market_call(&mut ptb, &args, "place_lend_order", vec![book, coin, rate, clock]);
    Ok(ptb.finish()?)
}

// =============================================================================
// Tx 3: Place Borrow Order
// =============================================================================

pub struct PlaceBorrowOrderRequest {
    pub amount: u64,
    /// Highest acceptable rate
    pub rate: u64,
}

pub fn build_place_borrow_order(
    market: &MarketDescriptor,
    req: &PlaceBorrowOrderRequest,
) -> Result<ProgrammableTransaction> {
    let args = book_market(market)?;
    require_positive("amount", req.amount)?;
    require_positive("rate", req.rate)?;

    let mut ptb = PtbBuilder::new();
    place_borrow(&mut ptb, market, &args, req.amount, req.rate)?;
    Ok(ptb.finish()?)
}

fn place_borrow(
    ptb: &mut PtbBuilder,
    market: &MarketDescriptor,
    args: &MarketTypeArgs,
    amount: u64,
    rate: u64,
) -> Result<Argument> {
    let book = ptb.object(market.orderbook_id.as_str())?;
    let amount = ptb.pure_u64(amount);
    let rate = ptb.pure_u64(rate);
    let clock = ptb.object(SUI_CLOCK_ID)?;
    Ok(market_call(ptb, args, "place_borrow_order", vec![book, amount, rate, clock]))
}

// =============================================================================
// Tx 4: Cancel Order
// =============================================================================

pub struct CancelOrderRequest {
    pub order_id: u64,
}

pub fn build_cancel_order(
    market: &MarketDescriptor,
    req: &CancelOrderRequest,
) -> Result<ProgrammableTransaction> {
    let args = book_market(market)?;

    let mut ptb = PtbBuilder::new();
    let book = ptb.object(market.orderbook_id.as_str())?;
    let order_id = ptb.pure_u64(req.order_id);
    market_call(&mut ptb, &args, "cancel_order", vec![book, order_id]);
    Ok(ptb.finish()?)
}

// =============================================================================
// Tx 5: Match + Settle
// =============================================================================

pub struct MatchSettleRequest {
    pub taker_order_id: u64,
    pub maker_order_id: u64,
    /// Borrower's collateral coin
    pub collateral: CoinInput,
}

pub fn build_match_and_settle(
    market: &MarketDescriptor,
    req: &MatchSettleRequest,
) -> Result<ProgrammableTransaction> {
    let args = book_and_vault_market(market)?;
    if req.taker_order_id == req.maker_order_id {
        return Err(BuildError::InvalidInput(
            "taker and maker must be different orders".to_string(),
        ));
    }

    let mut ptb = PtbBuilder::new();
    let collateral = req.collateral.resolve(&mut ptb, "collateral coin")?;
    let book = ptb.object(market.orderbook_id.as_str())?;
    let vault = ptb.object(market.vault_id.as_str())?;

    let receipt = match_orders(&mut ptb, &args, book, req.taker_order_id, req.maker_order_id)?;
    let settled = settle(&mut ptb, &args, receipt, collateral, book, vault)?;
    finish_settled(ptb, settled)
}

// =============================================================================
// Tx 6: Repay
// =============================================================================

pub struct RepayRequest {
    /// Borrower's LoanPosition object
    pub position_id: ObjectId,
    /// Base coin covering principal + interest
    pub payment: CoinInput,
}

pub fn build_repay(market: &MarketDescriptor, req: &RepayRequest) -> Result<ProgrammableTransaction> {
    let args = book_and_vault_market(market)?;
    require_id("position", req.position_id.as_str())?;

    let mut ptb = PtbBuilder::new();
    let payment = req.payment.resolve(&mut ptb, "repayment coin")?;
    let position = ptb.object(req.position_id.as_str())?;
    let vault = ptb.object(market.vault_id.as_str())?;
    let clock = ptb.object(SUI_CLOCK_ID)?;
    market_call(&mut ptb, &args, "repay", vec![position, payment, vault, clock]);
    Ok(ptb.finish()?)
}

pub struct RepayWithAmountRequest {
    pub position_id: ObjectId,
    pub principal: u64,
    pub rate_bps: u64,
    /// Coin to split the exact total due from; `None` splits from gas
    pub source_coin_id: Option<ObjectId>,
}

/// Repay by splitting exactly `total_due(principal, rate)` off a coin.
pub fn build_repay_with_amount(
    market: &MarketDescriptor,
    req: &RepayWithAmountRequest,
) -> Result<ProgrammableTransaction> {
    require_positive("principal", req.principal)?;
    require_positive("rate", req.rate_bps)?;
    let amount = calculator::total_due(req.principal, req.rate_bps);
    let payment = match &req.source_coin_id {
        Some(source) => CoinInput::SplitFrom {
            source_coin_id: source.clone(),
            amount,
        },
        None => CoinInput::FromGas { amount },
    };
    build_repay(
        market,
        &RepayRequest {
            position_id: req.position_id.clone(),
            payment,
        },
    )
}

// =============================================================================
// Tx 7: Liquidate
// =============================================================================

pub struct LiquidateRequest {
    pub loan_id: ObjectId,
}

/// `liquidation::liquidate<COLLATERAL>(vault, loan_id, clock)`
pub fn build_liquidate(
    market: &MarketDescriptor,
    req: &LiquidateRequest,
) -> Result<ProgrammableTransaction> {
    let args = market.type_args();
    require_type_args(&args)?;
    require_id("vault", market.vault_id.as_str())?;
    require_id("loan", req.loan_id.as_str())?;

    let mut ptb = PtbBuilder::new();
    let vault = ptb.object(market.vault_id.as_str())?;
    let loan_id = ptb.pure_id(req.loan_id.as_str())?;
    let clock = ptb.object(SUI_CLOCK_ID)?;
    ptb.move_call(
        &args.package_id,
        modules::LIQUIDATION,
        "liquidate",
        vec![args.collateral.clone()],
        vec![vault, loan_id, clock],
    );
    Ok(ptb.finish()?)
}

// =============================================================================
// Tx 8: Pool
// =============================================================================

pub struct CreatePoolRequest {
    pub min_rate: u64,
    pub max_rate: u64,
    pub num_buckets: u64,
}

pub fn build_create_pool(
    market: &MarketDescriptor,
    req: &CreatePoolRequest,
) -> Result<ProgrammableTransaction> {
    let args = book_market(market)?;
    require_positive("min rate", req.min_rate)?;
    if req.max_rate <= req.min_rate {
        return Err(BuildError::InvalidInput(format!(
            "max rate {} must exceed min rate {}",
            req.max_rate, req.min_rate
        )));
    }
    if req.num_buckets < 2 {
        return Err(BuildError::InvalidInput(
            "a rate ladder needs at least 2 buckets".to_string(),
        ));
    }

    let mut ptb = PtbBuilder::new();
    let book = ptb.object(market.orderbook_id.as_str())?;
    let min = ptb.pure_u64(req.min_rate);
    let max = ptb.pure_u64(req.max_rate);
    let buckets = ptb.pure_u64(req.num_buckets);
    market_call(&mut ptb, &args, "create_pool", vec![book, min, max, buckets]);
    Ok(ptb.finish()?)
}

pub struct PoolDepositRequest {
    pub deposit: CoinInput,
}

/// `pool::deposit<BASE>(pool, coin)`
pub fn build_pool_deposit(
    market: &MarketDescriptor,
    req: &PoolDepositRequest,
) -> Result<ProgrammableTransaction> {
    let args = market.type_args();
    require_type_args(&args)?;
    let pool_id = pool_id(market)?;

    let mut ptb = PtbBuilder::new();
    let coin = req.deposit.resolve(&mut ptb, "deposit coin")?;
    let pool = ptb.object(pool_id.as_str())?;
    ptb.move_call(
        &args.package_id,
        modules::POOL,
        "deposit",
        vec![args.base.clone()],
        vec![pool, coin],
    );
    Ok(ptb.finish()?)
}

pub struct PoolWithdrawRequest {
    pub shares: u64,
}

/// `pool::withdraw<BASE>(pool, shares)`
pub fn build_pool_withdraw(
    market: &MarketDescriptor,
    req: &PoolWithdrawRequest,
) -> Result<ProgrammableTransaction> {
    let args = market.type_args();
    require_type_args(&args)?;
    let pool_id = pool_id(market)?;
    require_positive("shares", req.shares)?;

    let mut ptb = PtbBuilder::new();
    let pool = ptb.object(pool_id.as_str())?;
    let shares = ptb.pure_u64(req.shares);
    ptb.move_call(
        &args.package_id,
        modules::POOL,
        "withdraw",
        vec![args.base.clone()],
        vec![pool, shares],
    );
    Ok(ptb.finish()?)
}

/// Re-place the pool's orders across its ladder. Admin-only on chain.
pub fn build_rebalance_pool(market: &MarketDescriptor) -> Result<ProgrammableTransaction> {
    let args = book_market(market)?;
    let pool_id = pool_id(market)?;

    let mut ptb = PtbBuilder::new();
    let pool = ptb.object(pool_id.as_str())?;
    let book = ptb.object(market.orderbook_id.as_str())?;
    let clock = ptb.object(SUI_CLOCK_ID)?;
    market_call(&mut ptb, &args, "rebalance_pool", vec![pool, book, clock]);
    Ok(ptb.finish()?)
}

// =============================================================================
// Tx 9: Quick Borrow
// =============================================================================

pub struct QuickBorrowRequest {
    /// Connected borrower address
    pub borrower: String,
    /// Lend order to borrow from
    pub maker: Order,
    pub borrow_amount: u64,
    /// The book's `next_order_id`, which the new borrow order will receive
    pub next_order_id: u64,
    /// Coin to split collateral from; `None` splits from gas
    pub collateral_source: Option<ObjectId>,
}

/// Collateral the quick borrow will lock
pub fn quick_borrow_collateral(market: &MarketDescriptor, borrow_amount: u64) -> u64 {
    calculator::required_collateral(borrow_amount, market.max_ltv_bps)
}

/// Place a borrow order at the maker's rate, match it against the maker and
/// settle with collateral at the market's max LTV, all in one batch.
pub fn build_quick_borrow(
    market: &MarketDescriptor,
    req: &QuickBorrowRequest,
) -> Result<ProgrammableTransaction> {
    let args = book_and_vault_market(market)?;
    require_ltv(market.max_ltv_bps)?;
    require_id("borrower", &req.borrower)?;
    require_positive("borrow amount", req.borrow_amount)?;

    let maker = &req.maker;
    if maker.side != OrderSide::Lend || !maker.is_active {
        return Err(BuildError::InvalidInput(format!(
            "order {} is not an active lend order",
            maker.order_id
        )));
    }
    if maker.is_owned_by(&req.borrower) {
        return Err(BuildError::SelfMatch {
            order_id: maker.order_id,
        });
    }
    require_positive("rate", maker.rate)?;
    if req.next_order_id <= maker.order_id {
        return Err(BuildError::InvalidInput(format!(
            "next order id {} must exceed maker order id {}",
            req.next_order_id, maker.order_id
        )));
    }

    let collateral_amount = quick_borrow_collateral(market, req.borrow_amount);
    let collateral = match &req.collateral_source {
        Some(source) => CoinInput::SplitFrom {
            source_coin_id: source.clone(),
            amount: collateral_amount,
        },
        None => CoinInput::FromGas {
            amount: collateral_amount,
        },
    };

    let mut ptb = PtbBuilder::new();
    place_borrow(&mut ptb, market, &args, req.borrow_amount, maker.rate)?;

    let book = ptb.object(market.orderbook_id.as_str())?;
    let receipt = match_orders(&mut ptb, &args, book, req.next_order_id, maker.order_id)?;
    let coin = collateral.resolve(&mut ptb, "collateral coin")?;
    let vault = ptb.object(market.vault_id.as_str())?;
    let settled = settle(&mut ptb, &args, receipt, coin, book, vault)?;
    finish_settled(ptb, settled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sui_ptb::{CallArg, Command};

    const PACKAGE: &str = "0xa11ce";
    const BOOK: &str = "0xb00c";
    const VAULT: &str = "0xfa17";
    const POOL: &str = "0x9001";

    fn market() -> MarketDescriptor {
        MarketDescriptor {
            id: "sui-sui-7d".into(),
            label: "SUI / SUI 7D".into(),
            base_type: "0x2::sui::SUI".into(),
            collateral_type: "0xc0::usdc::USDC".into(),
            base_symbol: "SUI".into(),
            collateral_symbol: "USDC".into(),
            base_decimals: 9,
            duration_bucket: 604_800,
            risk_tier: 0,
            max_ltv_bps: 9_000,
            package_id: PACKAGE.into(),
            orderbook_id: ObjectId::new(BOOK),
            vault_id: ObjectId::new(VAULT),
            pool_id: Some(ObjectId::new(POOL)),
        }
    }

    fn lend_order(id: u64, owner: &str, rate: u64) -> Order {
        Order {
            order_id: id,
            owner: owner.into(),
            side: OrderSide::Lend,
            amount: 100_000_000,
            rate,
            timestamp: 0,
            is_active: true,
        }
    }

    fn only_call(tx: &ProgrammableTransaction) -> &sui_ptb::MoveCall {
        let calls: Vec<_> = tx.move_calls().collect();
        assert_eq!(calls.len(), 1);
        calls[0]
    }

    #[test]
    fn test_build_create_market() {
        let tx = build_create_market(
            &market().type_args(),
            &CreateMarketRequest {
                duration_bucket: 604_800,
                risk_tier: 1,
                max_ltv_bps: 5_000,
            },
        )
        .unwrap();
        let call = only_call(&tx);
        assert_eq!(call.target(), "0xa11ce::market::create_market");
        assert_eq!(call.type_arguments, vec!["0x2::sui::SUI", "0xc0::usdc::USDC"]);
        assert_eq!(tx.pure_u64(call.arguments[0]), Some(604_800));
        assert_eq!(tx.pure_u8(call.arguments[1]), Some(1));
        assert_eq!(tx.pure_u64(call.arguments[2]), Some(5_000));
    }

    #[test]
    fn test_create_market_rejects_missing_type_args() {
        let mut args = market().type_args();
        args.collateral = String::new();
        let req = CreateMarketRequest {
            duration_bucket: 0,
            risk_tier: 0,
            max_ltv_bps: 9_000,
        };
        assert!(matches!(build_create_market(&args, &req), Err(BuildError::InvalidInput(_))));
    }

    #[test]
    fn test_build_place_lend_order_existing_coin() {
        let tx = build_place_lend_order(
            &market(),
            &PlaceLendOrderRequest {
                deposit: CoinInput::existing("0xc01"),
                rate: 500,
            },
        )
        .unwrap();
        let call = only_call(&tx);
        assert_eq!(call.function, "place_lend_order");
        assert_eq!(tx.object_id(call.arguments[0]), Some(BOOK));
        assert_eq!(tx.object_id(call.arguments[1]), Some("0xc01"));
        assert_eq!(tx.pure_u64(call.arguments[2]), Some(500));
        assert_eq!(tx.object_id(call.arguments[3]), Some(SUI_CLOCK_ID));
    }

    #[test]
    fn test_build_place_lend_order_split_variants() {
        for deposit in [CoinInput::split_from("0xb16", 1_000), CoinInput::from_gas(1_000)] {
            let from_gas = matches!(deposit, CoinInput::FromGas { .. });
            let tx = build_place_lend_order(&market(), &PlaceLendOrderRequest { deposit, rate: 500 })
                .unwrap();
            assert_eq!(tx.commands.len(), 2);
            match &tx.commands[0] {
                Command::SplitCoins { coin, amounts } => {
                    assert_eq!(*coin == Argument::GasCoin, from_gas);
                    assert_eq!(tx.pure_u64(amounts[0]), Some(1_000));
                }
                other => panic!("expected split, got {:?}", other),
            }
            let (_, call) = tx.find_call("market", "place_lend_order").unwrap();
            assert_eq!(call.arguments[1], Argument::NestedResult(0, 0));
        }
    }

    #[test]
    fn test_lend_order_validation() {
        let zero_rate = PlaceLendOrderRequest {
            deposit: CoinInput::from_gas(1_000),
            rate: 0,
        };
        assert!(build_place_lend_order(&market(), &zero_rate).is_err());

        let zero_amount = PlaceLendOrderRequest {
            deposit: CoinInput::from_gas(0),
            rate: 500,
        };
        assert!(build_place_lend_order(&market(), &zero_amount).is_err());

        let empty_coin = PlaceLendOrderRequest {
            deposit: CoinInput::existing(""),
            rate: 500,
        };
        assert!(build_place_lend_order(&market(), &empty_coin).is_err());

        let mut no_book = market();
        no_book.orderbook_id = ObjectId::new("");
        let req = PlaceLendOrderRequest {
            deposit: CoinInput::from_gas(1_000),
            rate: 500,
        };
        let err = build_place_lend_order(&no_book, &req).unwrap_err();
        assert!(err.to_string().contains("order book"));
    }

    #[test]
    fn test_build_place_borrow_order() {
        let tx = build_place_borrow_order(
            &market(),
            &PlaceBorrowOrderRequest {
                amount: 50_000,
                rate: 475,
            },
        )
        .unwrap();
        let call = only_call(&tx);
        assert_eq!(call.function, "place_borrow_order");
        assert_eq!(tx.pure_u64(call.arguments[1]), Some(50_000));
        assert_eq!(tx.pure_u64(call.arguments[2]), Some(475));
    }

    #[test]
    fn test_build_cancel_order_allows_id_zero() {
        let tx = build_cancel_order(&market(), &CancelOrderRequest { order_id: 0 }).unwrap();
        let call = only_call(&tx);
        assert_eq!(call.function, "cancel_order");
        assert_eq!(call.arguments.len(), 2);
        assert_eq!(tx.pure_u64(call.arguments[1]), Some(0));
    }

    #[test]
    fn test_match_and_settle_consumes_receipt() {
        for collateral in [
            CoinInput::existing("0xc011"),
            CoinInput::split_from("0xc011", 1_111_111),
            CoinInput::from_gas(1_111_111),
        ] {
            let tx = build_match_and_settle(
                &market(),
                &MatchSettleRequest {
                    taker_order_id: 3,
                    maker_order_id: 0,
                    collateral,
                },
            )
            .unwrap();

            let (match_idx, match_call) = tx.find_call("market", "match_orders").unwrap();
            let (settle_idx, settle_call) = tx.find_call("market", "settle").unwrap();
            assert!(settle_idx > match_idx);
            assert_eq!(settle_call.arguments[0], Argument::Result(match_idx as u16));
            assert_eq!(tx.pure_u64(match_call.arguments[1]), Some(3));
            assert_eq!(tx.pure_u64(match_call.arguments[2]), Some(0));
            assert_eq!(tx.object_id(settle_call.arguments[3]), Some(VAULT));

            // The receipt is used exactly once
            let uses = tx
                .commands
                .iter()
                .filter_map(Command::as_move_call)
                .flat_map(|c| c.arguments.iter())
                .filter(|a| **a == Argument::Result(match_idx as u16))
                .count();
            assert_eq!(uses, 1);
        }
    }

    #[test]
    fn test_match_and_settle_requires_vault() {
        let mut m = market();
        m.vault_id = ObjectId::new("  ");
        let req = MatchSettleRequest {
            taker_order_id: 1,
            maker_order_id: 0,
            collateral: CoinInput::from_gas(10),
        };
        assert!(build_match_and_settle(&m, &req).is_err());
    }

    #[test]
    fn test_shared_objects_listed_once() {
        let tx = build_match_and_settle(
            &market(),
            &MatchSettleRequest {
                taker_order_id: 1,
                maker_order_id: 0,
                collateral: CoinInput::existing("0xc011"),
            },
        )
        .unwrap();
        let objects: Vec<&str> = tx.inputs.iter().filter_map(CallArg::as_object_id).collect();
        assert_eq!(objects.iter().filter(|id| **id == BOOK).count(), 1);
        assert_eq!(objects.iter().filter(|id| **id == SUI_CLOCK_ID).count(), 1);
    }

    #[test]
    fn test_repay_with_amount_splits_total_due() {
        let tx = build_repay_with_amount(
            &market(),
            &RepayWithAmountRequest {
                position_id: ObjectId::new("0xf05"),
                principal: 100_000_000,
                rate_bps: 500,
                source_coin_id: None,
            },
        )
        .unwrap();
        match &tx.commands[0] {
            Command::SplitCoins { coin, amounts } => {
                assert_eq!(*coin, Argument::GasCoin);
                assert_eq!(tx.pure_u64(amounts[0]), Some(105_000_000));
            }
            other => panic!("expected split, got {:?}", other),
        }
        let (_, call) = tx.find_call("market", "repay").unwrap();
        assert_eq!(tx.object_id(call.arguments[0]), Some("0xf05"));
        assert_eq!(call.arguments[1], Argument::NestedResult(0, 0));
    }

    #[test]
    fn test_repay_with_amount_rejects_zero_rate() {
        let err = build_repay_with_amount(
            &market(),
            &RepayWithAmountRequest {
                position_id: ObjectId::new("0xf05"),
                principal: 100,
                rate_bps: 0,
                source_coin_id: None,
            },
        )
        .unwrap_err();
        assert_eq!(err, BuildError::InvalidInput("rate must be positive".to_string()));
    }

    #[test]
    fn test_build_liquidate() {
        let loan = format!("0x{}", "ab".repeat(32));
        let tx = build_liquidate(
            &market(),
            &LiquidateRequest {
                loan_id: ObjectId::new(loan),
            },
        )
        .unwrap();
        let call = only_call(&tx);
        assert_eq!(call.target(), "0xa11ce::liquidation::liquidate");
        assert_eq!(call.type_arguments, vec!["0xc0::usdc::USDC"]);
        let loan_arg = tx.input(call.arguments[1]).and_then(CallArg::as_pure).unwrap();
        assert_eq!(loan_arg, &[0xab; 32][..]);
    }

    #[test]
    fn test_liquidate_rejects_bad_loan_id() {
        let req = LiquidateRequest {
            loan_id: ObjectId::new("not-hex"),
        };
        assert!(matches!(build_liquidate(&market(), &req), Err(BuildError::InvalidInput(_))));
    }

    #[test]
    fn test_pool_builders() {
        let m = market();
        let deposit = build_pool_deposit(
            &m,
            &PoolDepositRequest {
                deposit: CoinInput::from_gas(5_000),
            },
        )
        .unwrap();
        let (_, call) = deposit.find_call("pool", "deposit").unwrap();
        assert_eq!(call.type_arguments, vec!["0x2::sui::SUI"]);
        assert_eq!(deposit.object_id(call.arguments[0]), Some(POOL));

        let withdraw = build_pool_withdraw(&m, &PoolWithdrawRequest { shares: 10 }).unwrap();
        let call = only_call(&withdraw);
        assert_eq!(call.target(), "0xa11ce::pool::withdraw");
        assert_eq!(withdraw.pure_u64(call.arguments[1]), Some(10));

        let rebalance = build_rebalance_pool(&m).unwrap();
        let call = only_call(&rebalance);
        assert_eq!(call.function, "rebalance_pool");
        assert_eq!(rebalance.object_id(call.arguments[0]), Some(POOL));
        assert_eq!(rebalance.object_id(call.arguments[1]), Some(BOOK));
    }

    #[test]
    fn test_pool_builders_need_pool() {
        let mut m = market();
        m.pool_id = None;
        assert!(build_pool_withdraw(&m, &PoolWithdrawRequest { shares: 1 }).is_err());
        assert!(build_rebalance_pool(&m).is_err());
    }

    #[test]
    fn test_build_create_pool() {
        let tx = build_create_pool(
            &market(),
            &CreatePoolRequest {
                min_rate: 300,
                max_rate: 800,
                num_buckets: 6,
            },
        )
        .unwrap();
        let call = only_call(&tx);
        assert_eq!(call.function, "create_pool");
        assert_eq!(tx.pure_u64(call.arguments[3]), Some(6));

        let bad = CreatePoolRequest {
            min_rate: 800,
            max_rate: 300,
            num_buckets: 6,
        };
        assert!(build_create_pool(&market(), &bad).is_err());
        let one_bucket = CreatePoolRequest {
            min_rate: 300,
            max_rate: 800,
            num_buckets: 1,
        };
        assert!(build_create_pool(&market(), &one_bucket).is_err());
    }

    #[test]
    fn test_quick_borrow_sequence() {
        let tx = build_quick_borrow(
            &market(),
            &QuickBorrowRequest {
                borrower: "0xb0b".into(),
                maker: lend_order(4, "0xa1ce", 525),
                borrow_amount: 1_000_000,
                next_order_id: 10,
                collateral_source: None,
            },
        )
        .unwrap();

        let functions: Vec<&str> = tx.move_calls().map(|c| c.function.as_str()).collect();
        assert_eq!(functions, vec!["place_borrow_order", "match_orders", "settle"]);

        let (_, borrow) = tx.find_call("market", "place_borrow_order").unwrap();
        assert_eq!(tx.pure_u64(borrow.arguments[2]), Some(525));

        let (match_idx, matched) = tx.find_call("market", "match_orders").unwrap();
        assert_eq!(tx.pure_u64(matched.arguments[1]), Some(10));
        assert_eq!(tx.pure_u64(matched.arguments[2]), Some(4));

        let (_, settle_call) = tx.find_call("market", "settle").unwrap();
        assert_eq!(settle_call.arguments[0], Argument::Result(match_idx as u16));

        let split_amount = tx.commands.iter().find_map(|c| match c {
            Command::SplitCoins { amounts, .. } => tx.pure_u64(amounts[0]),
            _ => None,
        });
        assert_eq!(split_amount, Some(1_111_111));
    }

    #[test]
    fn test_quick_borrow_rejects_self_match() {
        let req = QuickBorrowRequest {
            borrower: "0xA1CE".into(),
            maker: lend_order(4, "0xa1ce", 525),
            borrow_amount: 1_000,
            next_order_id: 10,
            collateral_source: None,
        };
        assert_eq!(
            build_quick_borrow(&market(), &req).unwrap_err(),
            BuildError::SelfMatch { order_id: 4 }
        );
    }

    #[test]
    fn test_quick_borrow_rejects_stale_next_id() {
        let req = QuickBorrowRequest {
            borrower: "0xb0b".into(),
            maker: lend_order(4, "0xa1ce", 525),
            borrow_amount: 1_000,
            next_order_id: 0,
            collateral_source: None,
        };
        assert!(build_quick_borrow(&market(), &req).is_err());
    }

    #[test]
    fn test_quick_borrow_rejects_borrow_maker() {
        let mut maker = lend_order(4, "0xa1ce", 525);
        maker.side = OrderSide::Borrow;
        let req = QuickBorrowRequest {
            borrower: "0xb0b".into(),
            maker,
            borrow_amount: 1_000,
            next_order_id: 10,
            collateral_source: None,
        };
        assert!(build_quick_borrow(&market(), &req).is_err());
    }

    #[test]
    fn test_build_error_maps_to_tx_error() {
        let err: TxError = BuildError::InvalidInput("rate must be positive".into()).into();
        assert_eq!(err.error_code(), "invalid_input");
        assert!(err.to_string().contains("rate must be positive"));
    }

    #[test]
    fn test_coin_input_json() {
        let input: CoinInput =
            serde_json::from_str(r#"{ "kind": "splitFrom", "sourceCoinId": "0xc01", "amount": 5 }"#)
                .unwrap();
        assert_eq!(input, CoinInput::split_from("0xc01", 5));
        let gas: CoinInput = serde_json::from_str(r#"{ "kind": "fromGas", "amount": 7 }"#).unwrap();
        assert_eq!(gas.amount(), Some(7));
    }
}
