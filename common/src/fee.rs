// Safe numeric kernel.
//
// Every monetary operation here is overflow-checked and returns None on
// failure so callers surface an explicit fee-overflow error instead of
// silently truncating. Ratios are validated to (0, 1) before use.

use thiserror::Error;

use crate::config::{MAX_COMPUTE_UNITS, PRIORITY_FEE_UNITS_PER_CU};

// f64 keeps 53 bits of integer precision; amounts beyond that cannot take
// the float path without losing smallest units
const MAX_SAFE_FLOAT_AMOUNT: u64 = 1 << 53;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Amount is empty")]
    Empty,

    #[error("Amount contains a non-digit character")]
    NonDigit,

    #[error("Amount must be greater than zero")]
    Zero,

    #[error("Amount overflows u64")]
    Overflow,
}

/// Split of a fee total into its burned and treasury-retained parts.
///
/// Invariant: `burn + treasury == total`, the treasury absorbs rounding dust.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub burn: u64,
    pub treasury: u64,
}

// floor(total * burn_ratio) burned, remainder retained
pub fn split_fee(total: u64, burn_ratio: f64) -> Option<FeeSplit> {
    if !(0.0..1.0).contains(&burn_ratio) || total > MAX_SAFE_FLOAT_AMOUNT {
        return None;
    }
    let burn = (total as f64 * burn_ratio).floor() as u64;
    let treasury = total.checked_sub(burn)?;
    Some(FeeSplit { burn, treasury })
}

/// Native fee for a transaction: base fee plus a priority component of
/// 0.001 units per compute unit, the sum scaled by the operator markup and
/// ceiled. Compute units are clamped to the protocol maximum first.
pub fn calculate_fee(compute_units: u64, base_fee: u64, markup: f64) -> Option<u64> {
    if !markup.is_finite() || markup < 0.0 {
        return None;
    }
    let units = compute_units.min(MAX_COMPUTE_UNITS);
    let priority = units / PRIORITY_FEE_UNITS_PER_CU;
    let subtotal = base_fee.checked_add(priority)?;
    checked_mul_f64_ceil(subtotal, markup)
}

// ceil(network_fee / treasury_ratio): the smallest fee at which the treasury
// share still covers the chain cost of landing the transaction
pub fn break_even_floor(network_fee: u64, treasury_ratio: f64) -> Option<u64> {
    if !(treasury_ratio > 0.0 && treasury_ratio < 1.0) {
        return None;
    }
    checked_mul_f64_ceil(network_fee, 1.0 / treasury_ratio)
}

// Risky-token surcharge, multiplier >= 1, ceiled
pub fn apply_multiplier(amount: u64, multiplier: f64) -> Option<u64> {
    if !multiplier.is_finite() || multiplier < 1.0 {
        return None;
    }
    checked_mul_f64_ceil(amount, multiplier)
}

// Holder discount in [0, 1), floored so the user never underpays the float
pub fn apply_discount(amount: u64, discount: f64) -> Option<u64> {
    if !(0.0..1.0).contains(&discount) || amount > MAX_SAFE_FLOAT_AMOUNT {
        return None;
    }
    Some((amount as f64 * (1.0 - discount)).floor() as u64)
}

fn checked_mul_f64_ceil(amount: u64, factor: f64) -> Option<u64> {
    if amount > MAX_SAFE_FLOAT_AMOUNT {
        return None;
    }
    let result = (amount as f64 * factor).ceil();
    if !result.is_finite() || result < 0.0 || result > MAX_SAFE_FLOAT_AMOUNT as f64 {
        return None;
    }
    Some(result as u64)
}

// Parse a wire amount: decimal string, strictly positive, no sign, no dot
pub fn parse_amount(value: &str) -> Result<u64, AmountError> {
    if value.is_empty() {
        return Err(AmountError::Empty);
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AmountError::NonDigit);
    }
    let amount: u64 = value.parse().map_err(|_| AmountError::Overflow)?;
    if amount == 0 {
        return Err(AmountError::Zero);
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BURN_RATIO_DEFAULT, TREASURY_RATIO_DEFAULT};
    use proptest::prelude::*;

    #[test]
    fn test_calculate_fee_baseline() {
        // 200k compute units at 0.001/unit on a 50k base, no markup
        assert_eq!(calculate_fee(200_000, 50_000, 1.0), Some(50_200));
        // Units beyond the protocol maximum are clamped
        assert_eq!(
            calculate_fee(u64::MAX, 50_000, 1.0),
            calculate_fee(1_400_000, 50_000, 1.0)
        );
        // Markup scales and ceils
        assert_eq!(calculate_fee(0, 1_001, 1.5), Some(1_502));
    }

    #[test]
    fn test_calculate_fee_rejects_bad_markup() {
        assert_eq!(calculate_fee(0, 1, -1.0), None);
        assert_eq!(calculate_fee(0, 1, f64::NAN), None);
    }

    #[test]
    fn test_split_no_dust() {
        let split = split_fee(1_000_000, BURN_RATIO_DEFAULT).unwrap();
        assert_eq!(split.burn + split.treasury, 1_000_000);
        assert_eq!(split.burn, 763_932);
    }

    #[test]
    fn test_break_even_floor() {
        // 5000 / (1/phi^3), ceiled
        assert_eq!(break_even_floor(5_000, TREASURY_RATIO_DEFAULT), Some(21_181));
        assert_eq!(break_even_floor(5_000, 0.0), None);
        assert_eq!(break_even_floor(5_000, 1.0), None);
    }

    #[test]
    fn test_discount_and_multiplier() {
        assert_eq!(apply_discount(1_000, 0.25), Some(750));
        assert_eq!(apply_discount(1_000, 1.0), None);
        assert_eq!(apply_multiplier(1_000, 1.5), Some(1_500));
        assert_eq!(apply_multiplier(1_000, 0.5), None);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("5000"), Ok(5_000));
        assert_eq!(parse_amount(""), Err(AmountError::Empty));
        assert_eq!(parse_amount("0"), Err(AmountError::Zero));
        assert_eq!(parse_amount("-5"), Err(AmountError::NonDigit));
        assert_eq!(parse_amount("5.0"), Err(AmountError::NonDigit));
        assert_eq!(
            parse_amount("99999999999999999999999"),
            Err(AmountError::Overflow)
        );
    }

    proptest! {
        #[test]
        fn prop_split_conserves_total(total in 0u64..(1u64 << 53), ratio in 0.0f64..1.0) {
            if let Some(split) = split_fee(total, ratio) {
                prop_assert_eq!(split.burn + split.treasury, total);
                prop_assert!(split.burn <= total);
            }
        }

        #[test]
        fn prop_discount_never_increases(amount in 0u64..(1u64 << 53), discount in 0.0f64..1.0) {
            if let Some(discounted) = apply_discount(amount, discount) {
                prop_assert!(discounted <= amount);
            }
        }
    }
}
