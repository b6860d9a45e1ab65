//! Presentation rounding backed by rust_decimal.
//!
//! Engine arithmetic stays in `f64`; values are only rounded at output
//! boundaries. Rounding goes through `rust_decimal` so that midpoints use
//! banker's rounding instead of `f64::round`'s half-away-from-zero.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Decimals used for quantities.
pub const QUANTITY_DP: u32 = 8;
/// Decimals used for monetary totals.
pub const MONEY_DP: u32 = 2;
/// Decimals used for average cost.
pub const AVG_COST_DP: u32 = 8;
/// Decimals used for percentages.
pub const PCT_DP: u32 = 2;

/// Round `value` to `dp` decimals, midpoint to even.
///
/// Non-finite inputs are returned unchanged.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    match Decimal::from_f64(value) {
        Some(d) => d
            .round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven)
            .to_f64()
            .unwrap_or(value),
        None => value,
    }
}

/// Decimal places for a spot price of the given magnitude.
pub fn price_decimals(price: f64) -> u32 {
    let p = price.abs();
    if p >= 1.0 {
        2
    } else if p >= 0.01 {
        4
    } else {
        6
    }
}

/// Round a spot price with the magnitude-aware policy.
pub fn round_price(price: f64) -> f64 {
    round_dp(price, price_decimals(price))
}

pub fn round_money(value: f64) -> f64 {
    round_dp(value, MONEY_DP)
}

pub fn round_quantity(value: f64) -> f64 {
    round_dp(value, QUANTITY_DP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_decimals_by_magnitude() {
        assert_eq!(price_decimals(65000.0), 2);
        assert_eq!(price_decimals(1000.0), 2);
        assert_eq!(price_decimals(24.9), 2);
        assert_eq!(price_decimals(1.0), 2);
        assert_eq!(price_decimals(0.5), 4);
        assert_eq!(price_decimals(0.01), 4);
        assert_eq!(price_decimals(0.00002), 6);
    }

    #[test]
    fn test_round_price() {
        assert_eq!(round_price(24.899999), 24.9);
        assert_eq!(round_price(0.123456), 0.1235);
        assert_eq!(round_price(0.0000123456), 0.000012);
    }

    #[test]
    fn test_round_dp_uses_bankers_rounding() {
        assert_eq!(round_dp(2.5, 0), 2.0);
        assert_eq!(round_dp(3.5, 0), 4.0);
        assert_eq!(round_dp(0.125, 2), 0.12);
    }

    #[test]
    fn test_round_dp_non_finite_passthrough() {
        assert!(round_dp(f64::NAN, 2).is_nan());
        assert_eq!(round_dp(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn test_round_is_stable() {
        let once = round_price(1234.5678);
        assert_eq!(round_price(once), once);
    }
}
