//! BCS encoding for pure arguments
//!
//! Pure inputs carry their value as BCS bytes:
//! - integers: fixed-width little-endian
//! - address / ID: 32 raw bytes

use yume_core::{normalize_hex_id, SUI_ADDRESS_LENGTH};

pub fn encode_u8(value: u8) -> Vec<u8> {
    vec![value]
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Encode an address or object ID (`0x`-prefixed hex, may be abbreviated like `0x6`).
pub fn encode_address(id: &str) -> Result<Vec<u8>, BcsError> {
    let normalized = normalize_hex_id(id).ok_or_else(|| BcsError::InvalidAddress(id.to_string()))?;
    let bytes = hex::decode(&normalized[2..]).map_err(|_| BcsError::InvalidAddress(id.to_string()))?;
    debug_assert_eq!(bytes.len(), SUI_ADDRESS_LENGTH);
    Ok(bytes)
}

/// Decode a little-endian u64 from pure bytes
pub fn decode_u64(bytes: &[u8]) -> Result<u64, BcsError> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| BcsError::InvalidLength {
        expected: 8,
        found: bytes.len(),
    })?;
    Ok(u64::from_le_bytes(arr))
}

pub fn decode_u8(bytes: &[u8]) -> Result<u8, BcsError> {
    match bytes {
        [b] => Ok(*b),
        _ => Err(BcsError::InvalidLength {
            expected: 1,
            found: bytes.len(),
        }),
    }
}

/// Pure argument encoding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BcsError {
    #[error("Invalid address or object id: {0}")]
    InvalidAddress(String),

    #[error("Invalid length: expected {expected}, found {found}")]
    InvalidLength { expected: usize, found: usize },
}
