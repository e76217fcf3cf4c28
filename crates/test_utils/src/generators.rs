//! Property-Based Test Generators
//!
//! Proptest strategies for ledger amounts and funding choices.

use proptest::prelude::*;
use rust_decimal::Decimal;

use domain_ledger::SourceType;

/// Positive amount with two decimal places, 0.01 to 100 000.00
pub fn money_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Small positive amount, 0.01 to 500.00
pub fn small_amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..50_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Amount with up to four decimal places, including zero and negatives
pub fn raw_amount_strategy() -> impl Strategy<Value = Decimal> {
    (-10_000_000i64..10_000_000i64, 0u32..=4u32).prop_map(|(m, s)| Decimal::new(m, s))
}

pub fn source_type_strategy() -> impl Strategy<Value = SourceType> {
    prop_oneof![Just(SourceType::OfficeFund), Just(SourceType::PmAdvance)]
}

/// A run of conversion amounts paired with funding choices
pub fn conversion_sequence_strategy(
    max_len: usize,
) -> impl Strategy<Value = Vec<(Decimal, SourceType)>> {
    proptest::collection::vec((small_amount_strategy(), source_type_strategy()), 1..=max_len)
}

/// Payment amounts for one invoice
pub fn payment_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<Decimal>> {
    proptest::collection::vec(small_amount_strategy(), 1..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{derive_invoice_state, round_money};

    proptest! {
        #[test]
        fn money_amounts_are_already_rounded(amount in money_amount_strategy()) {
            prop_assert!(amount > Decimal::ZERO);
            prop_assert_eq!(round_money(amount), amount);
        }

        #[test]
        fn rounding_is_idempotent(amount in raw_amount_strategy()) {
            let once = round_money(amount);
            prop_assert_eq!(round_money(once), once);
        }

        #[test]
        fn balance_identity_holds(amount in money_amount_strategy(), paid in money_amount_strategy()) {
            let state = derive_invoice_state(amount, paid);
            prop_assert_eq!(state.remaining_balance, amount - paid);
            prop_assert_eq!(state.is_paid, state.remaining_balance <= core_kernel::PAID_TOLERANCE);
        }
    }
}
