//! yume-core: Shared types, errors, and configuration
//!
//! This crate provides the foundational types used across the Yume workspace.

pub mod config;
pub mod errors;
pub mod market;
pub mod types;

pub use config::*;
pub use errors::*;
pub use market::*;
pub use types::*;
