//! Market descriptors
//!
//! A market is one (base, collateral) pair at a fixed duration bucket and
//! risk tier, backed by an order book, a collateral vault and optionally a
//! liquidity pool on chain. Descriptors are plain data: selected by the
//! caller and passed explicitly into every builder and reader.

use serde::{Deserialize, Serialize};

use crate::types::{Bps, ObjectId};
use crate::Error;

/// Static configuration identifying one tradable market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDescriptor {
    /// Stable identifier used in routes and config (e.g. "sui-sui-7d")
    pub id: String,
    /// Display label (e.g. "SUI / SUI 7D")
    pub label: String,
    /// Fully-qualified base coin type (the lent asset)
    pub base_type: String,
    /// Fully-qualified collateral coin type
    pub collateral_type: String,
    #[serde(default)]
    pub base_symbol: String,
    #[serde(default)]
    pub collateral_symbol: String,
    pub base_decimals: u8,
    /// Loan term in seconds, 0 = open-term
    #[serde(default)]
    pub duration_bucket: u64,
    #[serde(default)]
    pub risk_tier: u8,
    pub max_ltv_bps: Bps,
    /// Package that publishes the market modules
    pub package_id: String,
    pub orderbook_id: ObjectId,
    pub vault_id: ObjectId,
    #[serde(default)]
    pub pool_id: Option<ObjectId>,
}

/// Type arguments and package used by every move call for a market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTypeArgs {
    pub package_id: String,
    pub base: String,
    pub collateral: String,
}

impl MarketDescriptor {
    pub fn type_args(&self) -> MarketTypeArgs {
        MarketTypeArgs {
            package_id: self.package_id.clone(),
            base: self.base_type.clone(),
            collateral: self.collateral_type.clone(),
        }
    }

    /// Pool id, if the market has a liquidity pool deployed
    pub fn pool(&self) -> Option<&ObjectId> {
        self.pool_id.as_ref().filter(|id| !id.is_empty())
    }

    /// Check that the descriptor is usable for reads and builds.
    pub fn validate(&self) -> Result<(), Error> {
        if self.id.trim().is_empty() {
            return Err(Error::Config("market id is empty".to_string()));
        }
        if self.base_type.trim().is_empty() || self.collateral_type.trim().is_empty() {
            return Err(Error::Config(format!(
                "market {}: base and collateral types are required",
                self.id
            )));
        }
        if self.max_ltv_bps == 0 || self.max_ltv_bps > 10_000 {
            return Err(Error::Config(format!(
                "market {}: max LTV must be in 1..=10000 bps, got {}",
                self.id, self.max_ltv_bps
            )));
        }
        if self.base_decimals > 18 {
            return Err(Error::Config(format!(
                "market {}: base decimals {} out of range",
                self.id, self.base_decimals
            )));
        }
        Ok(())
    }

    /// True when the on-chain objects have been configured
    pub fn is_deployed(&self) -> bool {
        !self.package_id.trim().is_empty()
            && !self.orderbook_id.is_empty()
            && !self.vault_id.is_empty()
    }
}
