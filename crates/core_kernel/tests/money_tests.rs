//! Tests for the ledger primitives shared by every component

use core_kernel::money::{
    derive_invoice_state, exceeds_with_tolerance, positive_amount, round_money, sum_money,
    PAID_TOLERANCE,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod rounding {
    use super::*;

    #[test]
    fn test_binary_float_noise_is_absorbed() {
        let from_float = Decimal::try_from(0.1_f64 + 0.2_f64).unwrap();
        assert_eq!(round_money(from_float), dec!(0.30));
    }

    #[test]
    fn test_rounding_keeps_two_digits() {
        assert_eq!(round_money(dec!(1234.5678)).scale(), 2);
        assert_eq!(round_money(dec!(1234.5678)), dec!(1234.57));
    }

    #[test]
    fn test_positive_amount_rounds_before_checking() {
        assert_eq!(positive_amount(dec!(0.005)).unwrap(), dec!(0.01));
        assert!(positive_amount(dec!(0.004)).is_err());
    }
}

mod invoice_state {
    use super::*;

    #[test]
    fn test_round_trip_payments_settle_invoice() {
        let after_first = derive_invoice_state(dec!(1000.00), dec!(300.00));
        assert_eq!(after_first.remaining_balance, dec!(700.00));
        assert!(!after_first.is_paid);

        let after_second = derive_invoice_state(dec!(1000.00), dec!(300.00) + dec!(700.00));
        assert_eq!(after_second.remaining_balance, dec!(0.00));
        assert!(after_second.is_paid);
    }

    #[test]
    fn test_two_cents_remaining_is_not_paid() {
        let state = derive_invoice_state(dec!(10.00), dec!(9.98));
        assert_eq!(state.remaining_balance, dec!(0.02));
        assert!(!state.is_paid);
    }

    #[test]
    fn test_zero_amount_invoice_is_paid() {
        let state = derive_invoice_state(Decimal::ZERO, Decimal::ZERO);
        assert!(state.is_paid);
    }

    #[test]
    fn test_overpayment_detection_uses_tolerance() {
        assert!(!exceeds_with_tolerance(dec!(500.00) + PAID_TOLERANCE, dec!(500.00)));
        assert!(exceeds_with_tolerance(dec!(650.00), dec!(500.00)));
    }

    #[test]
    fn test_sum_money_matches_reconciliation_ground_truth() {
        let payments = vec![dec!(300.00), dec!(200.00), dec!(150.00)];
        assert_eq!(sum_money(payments), dec!(650.00));
        assert_eq!(sum_money(Vec::<Decimal>::new()), Decimal::ZERO);
    }
}
