//! yume-api: HTTP API layer for the Yume client
//!
//! Serves market snapshots, derived previews and unsigned transaction
//! batches to a frontend. Signing stays in the user's wallet.

pub mod dto;
pub mod routes;
pub mod server;
pub mod state;

pub use server::*;
pub use state::{AppState, MarketReaders, PositionReader, StateError};
