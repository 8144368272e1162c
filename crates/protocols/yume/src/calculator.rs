//! Yume derived-value calculations
//!
//! Integer arithmetic only, truncating like the on-chain computation.
//! Intermediates are widened to u128 so `amount * bps` cannot overflow.

use serde::Serialize;
use yume_core::constants::BPS_DENOMINATOR;

use crate::state::Order;

/// floor(a * b / c), saturating at u64::MAX. Returns 0 when `c` is 0.
fn mul_div_floor(a: u64, b: u64, c: u64) -> u64 {
    if c == 0 {
        return 0;
    }
    let wide = (a as u128) * (b as u128) / (c as u128);
    u64::try_from(wide).unwrap_or(u64::MAX)
}

/// Interest owed on a loan: floor(principal * rate / 10_000)
pub fn interest(principal: u64, rate_bps: u64) -> u64 {
    mul_div_floor(principal, rate_bps, BPS_DENOMINATOR)
}

/// Collateral needed to borrow `amount` at `ltv_bps`: floor(amount * 10_000 / ltv).
/// Zero LTV yields 0.
pub fn required_collateral(amount: u64, ltv_bps: u64) -> u64 {
    mul_div_floor(amount, BPS_DENOMINATOR, ltv_bps)
}

/// Principal plus interest
pub fn total_due(principal: u64, rate_bps: u64) -> u64 {
    principal.saturating_add(interest(principal, rate_bps))
}

/// Basis points as a percentage string, e.g. 500 -> "5.00%"
pub fn bps_to_percent(bps: u64) -> String {
    format!("{}.{:02}%", bps / 100, bps % 100)
}

/// Raw amount in smallest units as a decimal string, trailing zeros trimmed.
pub fn format_token_amount(raw: u64, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let divisor = 10u128.pow(decimals as u32);
    let whole = raw as u128 / divisor;
    let frac = raw as u128 % divisor;
    if frac == 0 {
        return whole.to_string();
    }
    let frac_str = format!("{:0>width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}

/// Rates of a linear ladder between `min_rate` and `max_rate`:
/// `rate_i = min + round(i * (max - min) / (n - 1))`.
///
/// A single bucket sits at `min_rate`. Empty when `num_buckets` is 0 or
/// `max_rate < min_rate`.
pub fn rate_ladder(min_rate: u64, max_rate: u64, num_buckets: u64) -> Vec<u64> {
    if num_buckets == 0 || max_rate < min_rate {
        return Vec::new();
    }
    if num_buckets == 1 {
        return vec![min_rate];
    }
    let spread = (max_rate - min_rate) as u128;
    let steps = (num_buckets - 1) as u128;
    (0..num_buckets as u128)
        .map(|i| {
            // Half-up rounding of i * spread / steps
            let offset = (2 * i * spread + steps) / (2 * steps);
            min_rate + offset as u64
        })
        .collect()
}

/// One rung of a pool's rate ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateBucket {
    pub rate: u64,
    pub amount: u64,
}

/// Deployed balance spread evenly over the ladder (floor per bucket)
pub fn rate_buckets(min_rate: u64, max_rate: u64, num_buckets: u64, deployed: u64) -> Vec<RateBucket> {
    let per_bucket = if num_buckets == 0 { 0 } else { deployed / num_buckets };
    rate_ladder(min_rate, max_rate, num_buckets)
        .into_iter()
        .map(|rate| RateBucket {
            rate,
            amount: per_bucket,
        })
        .collect()
}

/// Available plus deployed balance
pub fn pool_total_value(available: u64, deployed: u64) -> u64 {
    available.saturating_add(deployed)
}

/// Deployed share of total value in basis points
pub fn utilization_bps(deployed: u64, total_value: u64) -> u64 {
    mul_div_floor(deployed, BPS_DENOMINATOR, total_value)
}

/// Value of `shares` LP shares: floor(shares * total_value / total_shares)
pub fn lp_value(shares: u64, total_shares: u64, total_value: u64) -> u64 {
    mul_div_floor(shares, total_value, total_shares)
}

/// Amount returned by burning `shares`. Withdrawals draw from the available
/// balance only: floor(shares * available / total_shares).
pub fn withdraw_preview(shares: u64, total_shares: u64, available: u64) -> u64 {
    mul_div_floor(shares, available, total_shares)
}

/// Shares minted for depositing `amount`. The first deposit mints 1:1.
pub fn deposit_shares_preview(amount: u64, total_shares: u64, total_value: u64) -> u64 {
    if total_shares == 0 || total_value == 0 {
        return amount;
    }
    mul_div_floor(amount, total_shares, total_value)
}

/// Running total of order size down one side of the book
pub fn cumulative_depth(orders: &[Order]) -> Vec<(u64, u64)> {
    let mut total = 0u64;
    orders
        .iter()
        .map(|o| {
            total = total.saturating_add(o.amount);
            (o.rate, total)
        })
        .collect()
}
