//! Accounting note DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use domain_ledger::{
    AccountingNote, ConversionResult, NoteStatus, OperationalExpense, SourceType,
};

use super::invoices::InvoiceResponse;

#[derive(Debug, Deserialize, Validate)]
pub struct RecordNoteRequest {
    pub unit_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    pub amount: Decimal,
    /// Funding hint stored on the note, used when conversion omits one
    pub source_type: Option<SourceType>,
    pub pm_advance_id: Option<Uuid>,
}

/// Both fields optional; an empty body falls back to the note's stored hint
#[derive(Debug, Default, Deserialize)]
pub struct ConvertNoteRequest {
    pub source_type: Option<SourceType>,
    pub pm_advance_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub id: Uuid,
    pub unit_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub description: String,
    pub amount: Decimal,
    pub status: NoteStatus,
    pub source_type: Option<SourceType>,
    pub pm_advance_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub converted_at: Option<DateTime<Utc>>,
    pub converted_to_expense_id: Option<Uuid>,
}

impl From<AccountingNote> for NoteResponse {
    fn from(note: AccountingNote) -> Self {
        Self {
            id: note.id.into(),
            unit_id: note.unit_id.map(Uuid::from),
            project_id: note.project_id.map(Uuid::from),
            description: note.description,
            amount: note.amount,
            status: note.status,
            source_type: note.source_type,
            pm_advance_id: note.pm_advance_id.map(Uuid::from),
            created_by: note.created_by.into(),
            created_at: note.created_at,
            converted_at: note.converted_at,
            converted_to_expense_id: note.converted_to_expense_id.map(Uuid::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpenseResponse {
    pub id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub source_type: SourceType,
    pub unit_id: Uuid,
    pub claim_invoice_id: Uuid,
    pub pm_advance_id: Option<Uuid>,
    pub recorded_by: Uuid,
    pub converted_from_note_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<OperationalExpense> for ExpenseResponse {
    fn from(expense: OperationalExpense) -> Self {
        Self {
            id: expense.id.into(),
            description: expense.description,
            amount: expense.amount,
            source_type: expense.source_type,
            unit_id: expense.unit_id.into(),
            claim_invoice_id: expense.claim_invoice_id.into(),
            pm_advance_id: expense.pm_advance_id.map(Uuid::from),
            recorded_by: expense.recorded_by.into(),
            converted_from_note_id: expense.converted_from_note_id.map(Uuid::from),
            created_at: expense.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConversionResponse {
    pub note: NoteResponse,
    pub expense: ExpenseResponse,
    pub invoice: InvoiceResponse,
    pub invoice_created: bool,
}

impl From<ConversionResult> for ConversionResponse {
    fn from(result: ConversionResult) -> Self {
        Self {
            note: result.note.into(),
            expense: result.expense.into(),
            invoice: InvoiceResponse::from(result.invoice),
            invoice_created: result.invoice_created,
        }
    }
}
