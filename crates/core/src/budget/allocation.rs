//! Period distributions for budget items.
//!
//! Even spreads use the Largest Remainder Method so that the slots always sum
//! exactly to the item amount:
//! 1. Divide the amount by the number of slots
//! 2. Round each share toward zero at the minor unit
//! 3. Hand the leftover minor units to the first slots, one each

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use fundbook_shared::types::{MINOR_UNIT_SCALE, is_minor_unit, minor_unit};

use super::error::BudgetError;

/// Spreads `amount` across `slots` periods.
///
/// The first slots absorb the rounding remainder, so
/// `spread_evenly(100, 3) == [33.34, 33.33, 33.33]`.
#[must_use]
pub fn spread_evenly(amount: Decimal, slots: usize) -> Vec<Decimal> {
    if slots == 0 {
        return vec![];
    }

    let count = Decimal::from(slots);
    let unit = minor_unit();
    let base = (amount / count).round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::ToZero);
    let remainder = amount - base * count;

    // remainder carries the sign of amount, so extra units do too
    let extra = (remainder / unit)
        .abs()
        .trunc()
        .to_usize()
        .unwrap_or(0)
        .min(slots);
    let step = if remainder.is_sign_negative() { -unit } else { unit };

    (0..slots)
        .map(|i| if i < extra { base + step } else { base })
        .collect()
}

/// Checks that `distribution` has `slots` minor-unit entries summing to `amount`.
pub fn check_distribution(
    amount: Decimal,
    distribution: &[Decimal],
    slots: usize,
) -> Result<(), BudgetError> {
    if distribution.len() != slots {
        return Err(BudgetError::DistributionLength {
            expected: slots,
            actual: distribution.len(),
        });
    }
    if let Some(bad) = distribution
        .iter()
        .find(|slot| **slot < Decimal::ZERO || !is_minor_unit(**slot))
    {
        return Err(BudgetError::InvalidAmount(*bad));
    }

    let distributed: Decimal = distribution.iter().copied().sum();
    if distributed != amount {
        return Err(BudgetError::DistributionMismatch {
            amount,
            distributed,
        });
    }
    Ok(())
}

/// Returns the explicit distribution after checking it, or an even spread.
pub fn resolve_distribution(
    amount: Decimal,
    distribution: Option<Vec<Decimal>>,
    slots: usize,
) -> Result<Vec<Decimal>, BudgetError> {
    match distribution {
        Some(distribution) => {
            check_distribution(amount, &distribution, slots)?;
            Ok(distribution)
        }
        None => Ok(spread_evenly(amount, slots)),
    }
}
