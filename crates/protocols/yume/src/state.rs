//! Yume protocol state types

use serde::{Deserialize, Serialize};
use yume_core::SuiAddress;

use crate::calculator;
use crate::constants::{
    ORDER_SIDE_BORROW, ORDER_SIDE_LEND, STATUS_ACTIVE, STATUS_DEFAULTED, STATUS_LIQUIDATED,
    STATUS_REPAID,
};

/// Side of an order or position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Offering capital (an ask)
    Lend,
    /// Requesting capital (a bid)
    Borrow,
}

impl OrderSide {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            ORDER_SIDE_LEND => Some(Self::Lend),
            ORDER_SIDE_BORROW => Some(Self::Borrow),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Lend => ORDER_SIDE_LEND,
            Self::Borrow => ORDER_SIDE_BORROW,
        }
    }
}

/// A resting order on a market's book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Sequence id assigned by the book
    pub order_id: u64,
    pub owner: String,
    pub side: OrderSide,
    /// Size in smallest base units
    pub amount: u64,
    /// Rate in basis points
    pub rate: u64,
    /// Creation time (ms)
    pub timestamp: u64,
    pub is_active: bool,
}

impl Order {
    pub fn is_owned_by(&self, address: &str) -> bool {
        !address.is_empty() && SuiAddress::new(self.owner.as_str()).same_as(address)
    }
}

/// Lifecycle of a loan position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    #[default]
    Active,
    Repaid,
    Liquidated,
    Defaulted,
}

impl PositionStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            STATUS_ACTIVE => Some(Self::Active),
            STATUS_REPAID => Some(Self::Repaid),
            STATUS_LIQUIDATED => Some(Self::Liquidated),
            STATUS_DEFAULTED => Some(Self::Defaulted),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Repaid => "Repaid",
            Self::Liquidated => "Liquidated",
            Self::Defaulted => "Defaulted",
        }
    }
}

/// One side's record of a settled loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPosition {
    /// Position object id
    pub id: String,
    pub loan_id: String,
    pub side: OrderSide,
    pub lender: String,
    pub borrower: String,
    pub principal: u64,
    pub rate: u64,
    /// Duration bucket in seconds
    pub duration: u64,
    pub collateral_amount: u64,
    /// Start time (ms)
    pub start_time: u64,
    /// Maturity time (ms)
    pub maturity_time: u64,
    pub status: PositionStatus,
    /// Order book the loan was matched on
    pub book_id: String,
}

impl LoanPosition {
    pub fn interest(&self) -> u64 {
        calculator::interest(self.principal, self.rate)
    }

    pub fn total_due(&self) -> u64 {
        calculator::total_due(self.principal, self.rate)
    }

    /// Matched on the given order book
    pub fn is_on_book(&self, book_id: &str) -> bool {
        SuiAddress::new(self.book_id.as_str()).same_as(book_id)
    }

    pub fn is_matured(&self, now_ms: u64) -> bool {
        now_ms > self.maturity_time
    }

    /// Borrower may repay an active loan
    pub fn can_repay(&self, address: &str) -> bool {
        self.status == PositionStatus::Active
            && self.side == OrderSide::Borrow
            && SuiAddress::new(self.borrower.as_str()).same_as(address)
    }

    /// Anyone may liquidate an active loan past maturity
    pub fn can_liquidate(&self, now_ms: u64) -> bool {
        self.status == PositionStatus::Active && self.is_matured(now_ms)
    }
}

/// Aggregate state of a market's liquidity pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolState {
    pub id: String,
    pub admin: String,
    pub book_id: String,
    pub total_shares: u64,
    /// Undeployed balance (resolved from a child record)
    pub available_balance: u64,
    pub deployed_balance: u64,
    pub min_rate: u64,
    pub max_rate: u64,
    pub num_buckets: u64,
    pub is_active: bool,
}

impl PoolState {
    pub fn total_value(&self) -> u64 {
        calculator::pool_total_value(self.available_balance, self.deployed_balance)
    }

    pub fn utilization_bps(&self) -> u64 {
        calculator::utilization_bps(self.deployed_balance, self.total_value())
    }

    pub fn share_value(&self, shares: u64) -> u64 {
        calculator::lp_value(shares, self.total_shares, self.total_value())
    }

    pub fn withdraw_preview(&self, shares: u64) -> u64 {
        calculator::withdraw_preview(shares, self.total_shares, self.available_balance)
    }

    pub fn deposit_preview(&self, amount: u64) -> u64 {
        calculator::deposit_shares_preview(amount, self.total_shares, self.total_value())
    }

    pub fn buckets(&self) -> Vec<calculator::RateBucket> {
        calculator::rate_buckets(
            self.min_rate,
            self.max_rate,
            self.num_buckets,
            self.deployed_balance,
        )
    }
}

/// Point-in-time view of a market's order book
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBookSnapshot {
    pub book_id: String,
    /// Upper bound on assigned order ids
    pub next_order_id: u64,
    /// Lend orders, lowest rate first
    pub asks: Vec<Order>,
    /// Borrow orders, highest rate first
    pub bids: Vec<Order>,
    /// Best ask minus best bid; None unless both sides have orders
    pub spread: Option<i64>,
    pub best_ask_rate: Option<u64>,
    pub best_bid_rate: Option<u64>,
    pub total_ask_volume: u64,
    pub total_bid_volume: u64,
}

impl OrderBookSnapshot {
    pub fn empty(book_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            ..Self::default()
        }
    }

    /// Build a snapshot from orders in fetch order.
    ///
    /// Inactive orders are dropped. Sorting is stable, so orders sharing a
    /// rate keep their fetch order.
    pub fn from_orders(book_id: impl Into<String>, next_order_id: u64, orders: Vec<Order>) -> Self {
        let (mut asks, mut bids): (Vec<Order>, Vec<Order>) = orders
            .into_iter()
            .filter(|o| o.is_active)
            .partition(|o| o.side == OrderSide::Lend);

        asks.sort_by(|a, b| a.rate.cmp(&b.rate));
        bids.sort_by(|a, b| b.rate.cmp(&a.rate));

        let best_ask_rate = asks.first().map(|o| o.rate);
        let best_bid_rate = bids.first().map(|o| o.rate);
        let spread = match (best_ask_rate, best_bid_rate) {
            (Some(ask), Some(bid)) => {
                let diff = ask as i128 - bid as i128;
                Some(diff.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
            }
            _ => None,
        };

        let volume = |side: &[Order]| side.iter().fold(0u64, |acc, o| acc.saturating_add(o.amount));

        Self {
            book_id: book_id.into(),
            next_order_id,
            total_ask_volume: volume(asks.as_slice()),
            total_bid_volume: volume(bids.as_slice()),
            asks,
            bids,
            spread,
            best_ask_rate,
            best_bid_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.asks.is_empty() && self.bids.is_empty()
    }

    pub fn order_count(&self) -> usize {
        self.asks.len() + self.bids.len()
    }

    pub fn find(&self, order_id: u64) -> Option<&Order> {
        self.asks
            .iter()
            .chain(self.bids.iter())
            .find(|o| o.order_id == order_id)
    }

    pub fn orders_owned_by(&self, address: &str) -> Vec<&Order> {
        self.asks
            .iter()
            .chain(self.bids.iter())
            .filter(|o| o.is_owned_by(address))
            .collect()
    }

    /// Asks a given address can match against (its own orders excluded)
    pub fn matchable_asks(&self, address: Option<&str>) -> Vec<&Order> {
        match address {
            Some(addr) if !addr.is_empty() => {
                self.asks.iter().filter(|o| !o.is_owned_by(addr)).collect()
            }
            _ => self.asks.iter().collect(),
        }
    }
}
