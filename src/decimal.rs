//! Exact decimal arithmetic for prices, volumes and on-chain reserves.
//!
//! Provider payloads arrive as JSON floats or stringified big integers; both
//! are bridged into `rust_decimal::Decimal` here so that aggregation never
//! accumulates binary floating-point error.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Convert a JSON float to a `Decimal`, rejecting NaN/infinity. Rounds to
/// the decimal the float was printed from, not its full binary expansion;
/// a provider's `1.02` must stay `1.02` through aggregation.
pub fn from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value)
}

/// Parse a stringified numeric (reserve values can exceed u64).
pub fn parse_str(value: &str) -> Option<Decimal> {
    value.trim().parse::<Decimal>().ok()
}

/// Arithmetic mean. `None` for an empty slice rather than a division by zero.
pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().copied().sum();
    sum.checked_div(Decimal::from(values.len()))
}

/// Bonding-curve completion as a percentage of the initial reserve sold off,
/// clamped to [0, 100]. `None` when the initial reserve is missing or zero.
pub fn bonding_progress(initial_reserves: Decimal, virtual_reserves: Decimal) -> Option<Decimal> {
    if initial_reserves <= Decimal::ZERO {
        return None;
    }
    let sold = initial_reserves - virtual_reserves;
    let pct = sold.checked_div(initial_reserves)? * Decimal::from(100);
    Some(pct.clamp(Decimal::ZERO, Decimal::from(100)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn mean_of_prices() {
        let prices = [dec!(1.00), dec!(1.02), dec!(0.98)];
        assert_eq!(mean(&prices), Some(dec!(1.00)));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn f64_bridging_rejects_non_finite() {
        assert!(from_f64(f64::NAN).is_none());
        assert!(from_f64(f64::INFINITY).is_none());
        assert_eq!(from_f64(0.5), Some(dec!(0.5)));
    }

    #[test]
    fn f64_bridging_rounds_to_the_printed_decimal() {
        // 1.02 has no exact binary form; the bridge must not drag its
        // expansion into Decimal arithmetic.
        assert_eq!(from_f64(1.02), Some(dec!(1.02)));
        let prices = [
            from_f64(1.00).unwrap(),
            from_f64(1.02).unwrap(),
            from_f64(0.98).unwrap(),
        ];
        assert_eq!(mean(&prices), Some(dec!(1.00)));
    }

    #[test]
    fn bonding_progress_is_clamped() {
        assert_eq!(
            bonding_progress(dec!(1000), dec!(250)),
            Some(dec!(75))
        );
        // Curve fully drained, or over-drained by rounding upstream.
        assert_eq!(bonding_progress(dec!(1000), dec!(-5)), Some(dec!(100)));
        assert_eq!(bonding_progress(dec!(0), dec!(0)), None);
    }

    #[test]
    fn reserve_strings_parse_beyond_u64() {
        let reserves = parse_str("73000000000000000000000000").unwrap();
        assert!(reserves > Decimal::from(u64::MAX));
    }
}
