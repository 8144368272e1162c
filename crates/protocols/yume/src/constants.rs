//! Yume contract constants: module names, enum encodings and labels.

use std::time::Duration;

/// Move modules published by the Yume package
pub mod modules {
    pub const MARKET: &str = "market";
    pub const POOL: &str = "pool";
    pub const LIQUIDATION: &str = "liquidation";
    pub const POSITION: &str = "position";
}

/// On-chain encoding of order sides
pub const ORDER_SIDE_LEND: u8 = 0;
pub const ORDER_SIDE_BORROW: u8 = 1;

/// Duration buckets in seconds
pub const DURATION_OPEN: u64 = 0;
pub const DURATION_7_DAY: u64 = 604_800;
pub const DURATION_30_DAY: u64 = 2_592_000;
pub const DURATION_90_DAY: u64 = 7_776_000;

/// Risk tier A: blue-chip collateral, high LTV
pub const RISK_TIER_A: u8 = 0;
/// Risk tier B: volatile collateral, low LTV
pub const RISK_TIER_B: u8 = 1;

/// On-chain encoding of position status
pub const STATUS_ACTIVE: u8 = 0;
pub const STATUS_REPAID: u8 = 1;
pub const STATUS_LIQUIDATED: u8 = 2;
pub const STATUS_DEFAULTED: u8 = 3;

/// Dynamic field page size used by the readers
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Concurrent entry fetches per order book traversal
pub const ENTRY_FETCH_CONCURRENCY: usize = 8;

/// Wait after a successful submission before refetching
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Order book poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Struct type of loan position objects for a package
pub fn position_struct_type(package_id: &str) -> String {
    format!("{}::{}::LoanPosition", package_id, modules::POSITION)
}

pub fn duration_label(seconds: u64) -> String {
    match seconds {
        DURATION_OPEN => "Open".to_string(),
        DURATION_7_DAY => "7 Day".to_string(),
        DURATION_30_DAY => "30 Day".to_string(),
        DURATION_90_DAY => "90 Day".to_string(),
        s if s % 86_400 == 0 => format!("{} Day", s / 86_400),
        s => format!("{}s", s),
    }
}

pub fn risk_tier_label(tier: u8) -> String {
    match tier {
        RISK_TIER_A => "Tier A".to_string(),
        RISK_TIER_B => "Tier B".to_string(),
        t => format!("Tier {}", t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_labels() {
        assert_eq!(duration_label(0), "Open");
        assert_eq!(duration_label(604_800), "7 Day");
        assert_eq!(duration_label(7_776_000), "90 Day");
        assert_eq!(duration_label(86_400 * 14), "14 Day");
        assert_eq!(duration_label(90), "90s");
    }

    #[test]
    fn test_risk_tier_labels() {
        assert_eq!(risk_tier_label(RISK_TIER_A), "Tier A");
        assert_eq!(risk_tier_label(RISK_TIER_B), "Tier B");
        assert_eq!(risk_tier_label(5), "Tier 5");
    }

    #[test]
    fn test_position_struct_type() {
        assert_eq!(position_struct_type("0xabc"), "0xabc::position::LoanPosition");
    }
}
