//! Monetary amount helpers.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Amounts are `rust_decimal::Decimal` values carried at the currency's
//! minor-unit scale, so balance comparisons are exact.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places in one minor currency unit (cents).
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Returns one minor currency unit (0.01).
#[must_use]
pub fn minor_unit() -> Decimal {
    Decimal::new(1, MINOR_UNIT_SCALE)
}

/// Returns true if `amount` carries no precision finer than one minor unit.
///
/// Trailing zeros do not count: `1.500` is a valid minor-unit amount.
#[must_use]
pub fn is_minor_unit(amount: Decimal) -> bool {
    amount.round_dp(MINOR_UNIT_SCALE) == amount
}

/// Rounds to the minor unit using Banker's Rounding.
#[must_use]
pub fn round_to_minor_unit(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointNearestEven)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(100), true)]
    #[case(dec!(100.5), true)]
    #[case(dec!(100.55), true)]
    #[case(dec!(1.500), true)]
    #[case(dec!(100.555), false)]
    #[case(dec!(0.001), false)]
    #[case(dec!(-3.14), true)]
    fn test_is_minor_unit(#[case] amount: Decimal, #[case] expected: bool) {
        assert_eq!(is_minor_unit(amount), expected);
    }

    #[test]
    fn test_minor_unit_value() {
        assert_eq!(minor_unit(), dec!(0.01));
    }

    #[test]
    fn test_round_to_minor_unit_uses_bankers_rounding() {
        assert_eq!(round_to_minor_unit(dec!(2.345)), dec!(2.34));
        assert_eq!(round_to_minor_unit(dec!(2.355)), dec!(2.36));
        assert_eq!(round_to_minor_unit(dec!(2.3451)), dec!(2.35));
    }
}
