//! Core type definitions for Yume

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a canonical Sui address / object id in bytes
pub const SUI_ADDRESS_LENGTH: usize = 32;

/// Object ID (32 bytes, `0x`-prefixed hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Left-pad to the full 32-byte form (`0x6` -> `0x000…006`).
    ///
    /// Returns `None` when the id is not valid hex or is longer than 32 bytes.
    pub fn normalized(&self) -> Option<String> {
        normalize_hex_id(&self.0)
    }

    /// Decode into raw bytes (used for pure `ID` arguments)
    pub fn to_bytes(&self) -> Option<[u8; SUI_ADDRESS_LENGTH]> {
        let normalized = self.normalized()?;
        let raw = hex::decode(&normalized[2..]).ok()?;
        raw.try_into().ok()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Account address (same encoding as an object id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SuiAddress(pub String);

impl SuiAddress {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Case-insensitive comparison on the normalized form.
    ///
    /// Falls back to a plain lowercase comparison when either side is not hex,
    /// so abbreviated display addresses still compare sensibly.
    pub fn same_as(&self, other: &str) -> bool {
        match (normalize_hex_id(&self.0), normalize_hex_id(other)) {
            (Some(a), Some(b)) => a == b,
            _ => self.0.eq_ignore_ascii_case(other),
        }
    }
}

impl fmt::Display for SuiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction digest (base58)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxDigest(pub String);

impl TxDigest {
    pub fn new(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
    Localnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
            Self::Localnet => "localnet",
        }
    }

    /// Public fullnode JSON-RPC endpoint for this network
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://fullnode.mainnet.sui.io:443",
            Self::Testnet => "https://fullnode.testnet.sui.io:443",
            Self::Devnet => "https://fullnode.devnet.sui.io:443",
            Self::Localnet => "http://127.0.0.1:9000",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalize a `0x` hex id to its 64-char lowercase form.
pub fn normalize_hex_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if body.is_empty() || body.len() > SUI_ADDRESS_LENGTH * 2 {
        return None;
    }
    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!(
        "0x{:0>width$}",
        body.to_ascii_lowercase(),
        width = SUI_ADDRESS_LENGTH * 2
    ))
}

/// Amount in the smallest unit of a coin (MIST for SUI)
pub type RawAmount = u64;

/// Rate in basis points
pub type Bps = u64;

/// Constants
pub mod constants {
    use super::RawAmount;

    /// 1 SUI in MIST
    pub const MIST_PER_SUI: RawAmount = 1_000_000_000;

    /// 100% in basis points
    pub const BPS_DENOMINATOR: u64 = 10_000;

    /// Shared Clock object
    pub const SUI_CLOCK_ID: &str = "0x6";

    /// Fully-qualified SUI coin type
    pub const SUI_TYPE: &str = "0x2::sui::SUI";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_short_id() {
        let clock = ObjectId::new("0x6");
        let normalized = clock.normalized().unwrap();
        assert_eq!(normalized.len(), 66);
        assert!(normalized.ends_with("0006"));
        assert!(normalized.starts_with("0x0000"));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(normalize_hex_id("0xZZ").is_none());
        assert!(normalize_hex_id("").is_none());
        assert!(normalize_hex_id(&format!("0x{}", "a".repeat(65))).is_none());
    }

    #[test]
    fn test_object_id_bytes() {
        let id = ObjectId::new(format!("0x{}", "ab".repeat(32)));
        let bytes = id.to_bytes().unwrap();
        assert_eq!(bytes, [0xab; 32]);
    }

    #[test]
    fn test_address_same_as() {
        let addr = SuiAddress::new("0xABC");
        assert!(addr.same_as("0xabc"));
        assert!(addr.same_as(&format!("0x{:0>64}", "abc")));
        assert!(!addr.same_as("0xabd"));
    }

    #[test]
    fn test_network_display() {
        assert_eq!(Network::Mainnet.as_str(), "mainnet");
        assert_eq!(Network::Testnet.to_string(), "testnet");
        assert!(Network::Localnet.default_rpc_url().starts_with("http://"));
    }
}
