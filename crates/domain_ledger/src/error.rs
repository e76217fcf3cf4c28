//! Ledger domain errors
//!
//! A closed taxonomy: callers match on the variant, never on the message.

use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{AdvanceId, InvoiceId, MoneyError, NoteId, PortError, UnitId};

use crate::actor::ActorRole;

/// Errors that can occur in the ledger domain
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Accounting note does not exist
    #[error("Accounting note not found: {0}")]
    NoteNotFound(NoteId),

    /// Unit does not exist
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// Invoice does not exist
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(InvoiceId),

    /// Note has already left PENDING, or a concurrent caller won the race
    #[error("Accounting note {0} has already been processed")]
    AlreadyProcessed(NoteId),

    /// Note carries no unit, or its unit no longer exists
    #[error("Accounting note {0} has no resolvable unit")]
    MissingUnit(NoteId),

    /// PM_ADVANCE funding was chosen without an advance to draw from
    #[error("Accounting note {0} is funded from a PM advance but no advance was given")]
    PmAdvanceRequired(NoteId),

    /// Referenced PM advance does not exist
    #[error("PM advance not found: {0}")]
    PmAdvanceNotFound(AdvanceId),

    /// PM advance cannot cover the amount
    #[error("PM advance {advance_id} has {remaining} remaining, {needed} needed")]
    PmAdvanceInsufficient {
        advance_id: AdvanceId,
        remaining: Decimal,
        needed: Decimal,
    },

    /// Non-positive or otherwise invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    /// Payment would push the invoice past its amount by more than the tolerance
    #[error("Payment of {attempted} exceeds invoice {invoice_id}; at most {max_allowed} can be applied")]
    Overpayment {
        invoice_id: InvoiceId,
        attempted: Decimal,
        max_allowed: Decimal,
    },

    /// Minting a new claim invoice failed (e.g. invoice number collision)
    #[error("Failed to create claim invoice {invoice_number}: {source}")]
    InvoiceCreation {
        invoice_number: String,
        #[source]
        source: PortError,
    },

    /// Admin correction outside `0..=amount`
    #[error("Remaining amount {requested} is outside 0..={amount} for PM advance {advance_id}")]
    InvalidAdvanceCorrection {
        advance_id: AdvanceId,
        requested: Decimal,
        amount: Decimal,
    },

    /// Actor's role does not permit the operation
    #[error("Role {role} may not {action}")]
    Forbidden {
        action: &'static str,
        role: ActorRole,
    },

    /// Underlying store failure; the transaction has been rolled back
    #[error("Ledger store error: {0}")]
    Store(#[from] PortError),
}

impl LedgerError {
    /// True for errors the caller can fix by changing the request
    pub fn is_caller_correctable(&self) -> bool {
        matches!(
            self,
            LedgerError::PmAdvanceRequired(_)
                | LedgerError::PmAdvanceNotFound(_)
                | LedgerError::PmAdvanceInsufficient { .. }
                | LedgerError::InvalidAmount(_)
                | LedgerError::Overpayment { .. }
                | LedgerError::InvalidAdvanceCorrection { .. }
        )
    }

    /// True for the not-found family
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::NoteNotFound(_)
                | LedgerError::UnitNotFound(_)
                | LedgerError::InvoiceNotFound(_)
                | LedgerError::PmAdvanceNotFound(_)
        )
    }

    /// True when the request lost a race or targets stale state
    pub fn is_already_processed(&self) -> bool {
        matches!(self, LedgerError::AlreadyProcessed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_insufficient_funds_message_carries_amounts() {
        let err = LedgerError::PmAdvanceInsufficient {
            advance_id: AdvanceId::new(),
            remaining: dec!(50.00),
            needed: dec!(80.00),
        };
        let message = err.to_string();
        assert!(message.contains("50.00"));
        assert!(message.contains("80.00"));
        assert!(err.is_caller_correctable());
    }

    #[test]
    fn test_store_errors_are_not_caller_correctable() {
        let err = LedgerError::from(PortError::connection("refused"));
        assert!(!err.is_caller_correctable());
        assert!(!err.is_already_processed());
    }
}
