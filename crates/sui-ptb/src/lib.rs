//! sui-ptb: Programmable transaction block building for Sui
//!
//! Provides the batch vocabulary (inputs, commands, argument handles), BCS
//! encoding for pure arguments, and a builder that assembles them into the
//! JSON transaction shape wallets accept for signing.

pub mod bcs;
pub mod builder;
pub mod transaction;

pub use bcs::*;
pub use builder::{PtbBuilder, PtbError};
pub use transaction::*;
