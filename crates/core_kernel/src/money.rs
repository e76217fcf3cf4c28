//! Ledger primitives: money rounding and invoice balance derivation
//!
//! Every stored monetary field is the output of [`round_money`]. Whether an
//! invoice counts as paid is decided in exactly one place,
//! [`derive_invoice_state`], which both the payment path and the
//! reconciliation path call.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fractional digits kept on every stored amount
pub const MONEY_SCALE: u32 = 2;

/// Residual amount still considered "paid in full" (0.01)
pub const PAID_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Errors raised when validating a monetary input
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount must be greater than zero, got {0}")]
    NonPositive(Decimal),

    #[error("Amount {0} is negative")]
    Negative(Decimal),
}

/// Rounds a value to two fractional digits, half away from zero
///
/// ```rust
/// use core_kernel::money::round_money;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(round_money(dec!(10.005)), dec!(10.01));
/// assert_eq!(round_money(dec!(0.1) + dec!(0.2)), dec!(0.30));
/// ```
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds an incoming amount and rejects anything that is not strictly positive
pub fn positive_amount(value: Decimal) -> Result<Decimal, MoneyError> {
    let rounded = round_money(value);
    if rounded <= Decimal::ZERO {
        return Err(MoneyError::NonPositive(rounded));
    }
    Ok(rounded)
}

/// Rounds an amount that may be zero but never negative
pub fn non_negative_amount(value: Decimal) -> Result<Decimal, MoneyError> {
    let rounded = round_money(value);
    if rounded < Decimal::ZERO {
        return Err(MoneyError::Negative(rounded));
    }
    Ok(rounded)
}

/// Returns true when `total` goes past `limit` by more than the paid tolerance
pub fn exceeds_with_tolerance(total: Decimal, limit: Decimal) -> bool {
    round_money(total) > round_money(limit) + PAID_TOLERANCE
}

/// Derived balance fields of an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceBalance {
    /// `round(amount - total_paid, 2)`; negative when over-collected
    pub remaining_balance: Decimal,
    /// `remaining_balance <= 0.01`
    pub is_paid: bool,
}

/// Derives `(remaining_balance, is_paid)` from an invoice amount and its paid total
///
/// This is the single source of truth for paid status.
///
/// ```rust
/// use core_kernel::money::derive_invoice_state;
/// use rust_decimal_macros::dec;
///
/// let state = derive_invoice_state(dec!(1000.00), dec!(999.995));
/// assert_eq!(state.remaining_balance, dec!(0.00));
/// assert!(state.is_paid);
/// ```
pub fn derive_invoice_state(amount: Decimal, total_paid: Decimal) -> InvoiceBalance {
    let remaining_balance = round_money(round_money(amount) - round_money(total_paid));
    InvoiceBalance {
        remaining_balance,
        is_paid: remaining_balance <= PAID_TOLERANCE,
    }
}

/// Sums a set of amounts and rounds the result once
pub fn sum_money<I>(amounts: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    round_money(amounts.into_iter().sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
    }

    #[test]
    fn test_paid_tolerance_is_one_cent() {
        assert_eq!(PAID_TOLERANCE, dec!(0.01));
    }

    #[test]
    fn test_positive_amount_rejects_zero_after_rounding() {
        assert_eq!(positive_amount(dec!(0.004)), Err(MoneyError::NonPositive(dec!(0.00))));
        assert_eq!(positive_amount(dec!(-5)), Err(MoneyError::NonPositive(dec!(-5))));
        assert_eq!(positive_amount(dec!(12.345)), Ok(dec!(12.35)));
    }

    #[test]
    fn test_non_negative_amount() {
        assert_eq!(non_negative_amount(dec!(0)), Ok(dec!(0)));
        assert!(non_negative_amount(dec!(-0.01)).is_err());
    }

    #[test]
    fn test_derive_invoice_state_unpaid() {
        let state = derive_invoice_state(dec!(350.00), dec!(100.00));
        assert_eq!(state.remaining_balance, dec!(250.00));
        assert!(!state.is_paid);
    }

    #[test]
    fn test_derive_invoice_state_within_tolerance() {
        let state = derive_invoice_state(dec!(100.00), dec!(99.99));
        assert_eq!(state.remaining_balance, dec!(0.01));
        assert!(state.is_paid);
    }

    #[test]
    fn test_derive_invoice_state_overpaid() {
        let state = derive_invoice_state(dec!(500.00), dec!(650.00));
        assert_eq!(state.remaining_balance, dec!(-150.00));
        assert!(state.is_paid);
    }

    #[test]
    fn test_exceeds_with_tolerance() {
        assert!(!exceeds_with_tolerance(dec!(1000.01), dec!(1000.00)));
        assert!(exceeds_with_tolerance(dec!(1000.02), dec!(1000.00)));
    }

    #[test]
    fn test_sum_money_removes_float_noise() {
        let total = sum_money(vec![dec!(0.1), dec!(0.2), dec!(0.3)]);
        assert_eq!(total, dec!(0.60));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn balance_identity_holds(
            amount_minor in 0i64..100_000_000i64,
            paid_minor in 0i64..100_000_000i64
        ) {
            let amount = Decimal::new(amount_minor, 2);
            let paid = Decimal::new(paid_minor, 2);
            let state = derive_invoice_state(amount, paid);

            prop_assert_eq!(state.remaining_balance, round_money(amount - paid));
            prop_assert_eq!(state.is_paid, state.remaining_balance <= PAID_TOLERANCE);
        }

        #[test]
        fn rounding_is_idempotent(raw in -1_000_000_000i64..1_000_000_000i64, scale in 0u32..6u32) {
            let value = Decimal::new(raw, scale);
            let once = round_money(value);
            prop_assert_eq!(round_money(once), once);
            prop_assert!(once.scale() <= MONEY_SCALE);
        }
    }
}
