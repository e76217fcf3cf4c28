//! Operational expenses produced by note conversion

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{AdvanceId, ExpenseId, InvoiceId, NoteId, UnitId, UserId};

use crate::note::{AccountingNote, Funding, SourceType};

/// An immutable financial record, one per successful conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationalExpense {
    pub id: ExpenseId,
    pub description: String,
    pub amount: Decimal,
    pub source_type: SourceType,
    pub unit_id: UnitId,
    /// The claim invoice this expense was consolidated onto
    pub claim_invoice_id: InvoiceId,
    pub pm_advance_id: Option<AdvanceId>,
    pub recorded_by: UserId,
    /// Backfilled as the last step of conversion
    pub converted_from_note_id: Option<NoteId>,
    pub created_at: DateTime<Utc>,
}

impl OperationalExpense {
    pub fn from_note(
        note: &AccountingNote,
        unit_id: UnitId,
        claim_invoice_id: InvoiceId,
        funding: Funding,
        recorded_by: UserId,
    ) -> Self {
        Self {
            id: ExpenseId::new_v7(),
            description: note.description.clone(),
            amount: note.amount,
            source_type: funding.source_type(),
            unit_id,
            claim_invoice_id,
            pm_advance_id: funding.advance_id(),
            recorded_by,
            converted_from_note_id: None,
            created_at: Utc::now(),
        }
    }
}
