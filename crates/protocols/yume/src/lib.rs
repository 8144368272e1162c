//! Yume Order-Book Lending Protocol
//!
//! Lenders and borrowers rest orders on a per-market order book. A match
//! produces a receipt that must be settled in the same transaction, which
//! locks the borrower's collateral and creates a loan position for each
//! side. Positions are repaid before maturity or liquidated after it.
//! Optional liquidity pools spread deposits across a ladder of lend orders.

pub mod calculator;
pub mod constants;
pub mod executor;
pub mod fetch;
pub mod poller;
pub mod state;
pub mod tx_builder;

pub use calculator::{interest, required_collateral, total_due};
pub use executor::{TransactionExecutor, TransactionSigner, TxState};
pub use fetch::{fetch_book_summary, fetch_order_book, fetch_pool, fetch_positions, BookSummary};
pub use poller::{PollingReader, ReaderState, Refetch};
pub use state::{
    LoanPosition, Order, OrderBookSnapshot, OrderSide, PoolState, PositionStatus,
};
pub use tx_builder::{
    build_cancel_order, build_create_market, build_create_pool, build_liquidate,
    build_match_and_settle, build_place_borrow_order, build_place_lend_order, build_pool_deposit,
    build_pool_withdraw, build_quick_borrow, build_rebalance_pool, build_repay,
    build_repay_with_amount, BuildError, CoinInput,
};
