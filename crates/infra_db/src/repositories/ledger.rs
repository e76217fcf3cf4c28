//! Ledger repository
//!
//! Plain SQL against the ledger tables. Every function takes any
//! [`PgExecutor`], so the same query runs on the pool for reads and on a
//! transaction connection for writes.
//!
//! Guarded writes report success through `rows_affected()` or through
//! `RETURNING` yielding a row; a guard that matches nothing is not an error
//! at this layer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use core_kernel::PAID_TOLERANCE;
use domain_ledger::{AccountingNote, Invoice, OperationalExpense, OwnerAssociation, Payment, PmAdvance};

use crate::error::DatabaseError;

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct UnitRow {
    pub unit_id: Uuid,
    pub project_id: Option<Uuid>,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct OwnerAssociationRow {
    pub owner_association_id: Uuid,
    pub unit_id: Uuid,
    pub name: String,
    pub is_placeholder: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct InvoiceRow {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub invoice_type: String,
    pub unit_id: Uuid,
    pub amount: Decimal,
    pub total_paid: Decimal,
    pub remaining_balance: Decimal,
    pub is_paid: bool,
    pub issued_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AdvanceRow {
    pub advance_id: Uuid,
    pub staff_id: Uuid,
    pub project_id: Option<Uuid>,
    pub amount: Decimal,
    pub remaining_amount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct NoteRow {
    pub note_id: Uuid,
    pub unit_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub description: String,
    pub amount: Decimal,
    pub status: String,
    pub source_type: Option<String>,
    pub pm_advance_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub converted_at: Option<DateTime<Utc>>,
    pub converted_to_expense_id: Option<Uuid>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ExpenseRow {
    pub expense_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub source_type: String,
    pub unit_id: Uuid,
    pub claim_invoice_id: Uuid,
    pub pm_advance_id: Option<Uuid>,
    pub recorded_by: Uuid,
    pub converted_from_note_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Units and owner associations
// ============================================================================

pub async fn find_unit<'e, E: PgExecutor<'e>>(
    executor: E,
    unit_id: Uuid,
) -> Result<Option<UnitRow>, DatabaseError> {
    let row = sqlx::query_as::<_, UnitRow>(
        "SELECT unit_id, project_id, code, name FROM units WHERE unit_id = $1",
    )
    .bind(unit_id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

/// Row lock serializing claim consolidation for one unit
pub async fn lock_unit<'e, E: PgExecutor<'e>>(
    executor: E,
    unit_id: Uuid,
) -> Result<Option<UnitRow>, DatabaseError> {
    let row = sqlx::query_as::<_, UnitRow>(
        "SELECT unit_id, project_id, code, name FROM units WHERE unit_id = $1 FOR UPDATE",
    )
    .bind(unit_id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn find_owner_association<'e, E: PgExecutor<'e>>(
    executor: E,
    unit_id: Uuid,
) -> Result<Option<OwnerAssociationRow>, DatabaseError> {
    let row = sqlx::query_as::<_, OwnerAssociationRow>(
        r#"
        SELECT owner_association_id, unit_id, name, is_placeholder, created_at
        FROM owner_associations
        WHERE unit_id = $1
        "#,
    )
    .bind(unit_id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn insert_owner_association<'e, E: PgExecutor<'e>>(
    executor: E,
    association: &OwnerAssociation,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO owner_associations (owner_association_id, unit_id, name, is_placeholder, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::from(association.id))
    .bind(Uuid::from(association.unit_id))
    .bind(&association.name)
    .bind(association.is_placeholder)
    .bind(association.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

// ============================================================================
// Invoices
// ============================================================================

const INVOICE_COLUMNS: &str = "invoice_id, invoice_number, invoice_type, unit_id, amount, \
     total_paid, remaining_balance, is_paid, issued_at, updated_at";

pub async fn find_invoice<'e, E: PgExecutor<'e>>(
    executor: E,
    invoice_id: Uuid,
) -> Result<Option<InvoiceRow>, DatabaseError> {
    let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1");
    let row = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(invoice_id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn lock_invoice<'e, E: PgExecutor<'e>>(
    executor: E,
    invoice_id: Uuid,
) -> Result<Option<InvoiceRow>, DatabaseError> {
    let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(invoice_id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// Most recently issued unpaid CLAIM invoice of the unit
pub async fn find_open_claim_invoice<'e, E: PgExecutor<'e>>(
    executor: E,
    unit_id: Uuid,
) -> Result<Option<InvoiceRow>, DatabaseError> {
    let sql = format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices \
         WHERE unit_id = $1 AND invoice_type = 'CLAIM' AND is_paid = FALSE \
         ORDER BY issued_at DESC, invoice_id DESC \
         LIMIT 1"
    );
    let row = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(unit_id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// `amount += x, remaining_balance += x` guarded by `is_paid = FALSE`
pub async fn increment_open_invoice<'e, E: PgExecutor<'e>>(
    executor: E,
    invoice_id: Uuid,
    amount: Decimal,
) -> Result<Option<InvoiceRow>, DatabaseError> {
    let sql = format!(
        "UPDATE invoices \
         SET amount = amount + $2, remaining_balance = remaining_balance + $2, updated_at = now() \
         WHERE invoice_id = $1 AND is_paid = FALSE \
         RETURNING {INVOICE_COLUMNS}"
    );
    let row = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(invoice_id)
        .bind(amount)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn insert_invoice<'e, E: PgExecutor<'e>>(
    executor: E,
    invoice: &Invoice,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO invoices (
            invoice_id, invoice_number, invoice_type, unit_id, amount,
            total_paid, remaining_balance, is_paid, issued_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(Uuid::from(invoice.id))
    .bind(&invoice.invoice_number)
    .bind(invoice.invoice_type.as_str())
    .bind(Uuid::from(invoice.unit_id))
    .bind(invoice.amount)
    .bind(invoice.total_paid)
    .bind(invoice.remaining_balance)
    .bind(invoice.is_paid)
    .bind(invoice.issued_at)
    .bind(invoice.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// `total_paid += x` unless the invoice is paid or would be over-collected
/// beyond the paid tolerance
pub async fn add_to_total_paid<'e, E: PgExecutor<'e>>(
    executor: E,
    invoice_id: Uuid,
    amount: Decimal,
) -> Result<Option<InvoiceRow>, DatabaseError> {
    let sql = format!(
        "UPDATE invoices \
         SET total_paid = total_paid + $2, updated_at = now() \
         WHERE invoice_id = $1 AND is_paid = FALSE AND total_paid + $2 <= amount + $3 \
         RETURNING {INVOICE_COLUMNS}"
    );
    let row = sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(invoice_id)
        .bind(amount)
        .bind(PAID_TOLERANCE)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

pub async fn write_invoice_totals<'e, E: PgExecutor<'e>>(
    executor: E,
    invoice_id: Uuid,
    total_paid: Decimal,
    remaining_balance: Decimal,
    is_paid: bool,
) -> Result<InvoiceRow, DatabaseError> {
    let sql = format!(
        "UPDATE invoices \
         SET total_paid = $2, remaining_balance = $3, is_paid = $4, updated_at = now() \
         WHERE invoice_id = $1 \
         RETURNING {INVOICE_COLUMNS}"
    );
    sqlx::query_as::<_, InvoiceRow>(&sql)
        .bind(invoice_id)
        .bind(total_paid)
        .bind(remaining_balance)
        .bind(is_paid)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Invoice", invoice_id))
}

pub async fn list_invoice_ids<'e, E: PgExecutor<'e>>(
    executor: E,
    invoice_type: Option<&str>,
) -> Result<Vec<Uuid>, DatabaseError> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT invoice_id FROM invoices
        WHERE ($1::TEXT IS NULL OR invoice_type = $1)
        ORDER BY issued_at, invoice_id
        "#,
    )
    .bind(invoice_type)
    .fetch_all(executor)
    .await?;
    Ok(ids)
}

// ============================================================================
// Payments
// ============================================================================

pub async fn insert_payment<'e, E: PgExecutor<'e>>(
    executor: E,
    payment: &Payment,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO payments (payment_id, invoice_id, amount, recorded_by, created_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::from(payment.id))
    .bind(Uuid::from(payment.invoice_id))
    .bind(payment.amount)
    .bind(payment.recorded_by.map(Uuid::from))
    .bind(payment.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

/// Oldest first; ties broken by id
pub async fn list_payments<'e, E: PgExecutor<'e>>(
    executor: E,
    invoice_id: Uuid,
) -> Result<Vec<PaymentRow>, DatabaseError> {
    let rows = sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT payment_id, invoice_id, amount, recorded_by, created_at
        FROM payments
        WHERE invoice_id = $1
        ORDER BY created_at, payment_id
        "#,
    )
    .bind(invoice_id)
    .fetch_all(executor)
    .await?;
    Ok(rows)
}

pub async fn delete_payment<'e, E: PgExecutor<'e>>(
    executor: E,
    payment_id: Uuid,
) -> Result<bool, DatabaseError> {
    let result = sqlx::query("DELETE FROM payments WHERE payment_id = $1")
        .bind(payment_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

// ============================================================================
// PM advances
// ============================================================================

const ADVANCE_COLUMNS: &str =
    "advance_id, staff_id, project_id, amount, remaining_amount, notes, created_at, updated_at";

pub async fn find_advance<'e, E: PgExecutor<'e>>(
    executor: E,
    advance_id: Uuid,
) -> Result<Option<AdvanceRow>, DatabaseError> {
    let sql = format!("SELECT {ADVANCE_COLUMNS} FROM pm_advances WHERE advance_id = $1");
    let row = sqlx::query_as::<_, AdvanceRow>(&sql)
        .bind(advance_id)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

/// Single-statement draw-down; true only if `remaining_amount >= amount`
pub async fn reserve_advance<'e, E: PgExecutor<'e>>(
    executor: E,
    advance_id: Uuid,
    amount: Decimal,
) -> Result<bool, DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE pm_advances
        SET remaining_amount = remaining_amount - $2, updated_at = now()
        WHERE advance_id = $1 AND remaining_amount >= $2
        "#,
    )
    .bind(advance_id)
    .bind(amount)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn insert_advance<'e, E: PgExecutor<'e>>(
    executor: E,
    advance: &PmAdvance,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO pm_advances (
            advance_id, staff_id, project_id, amount, remaining_amount,
            notes, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(Uuid::from(advance.id))
    .bind(Uuid::from(advance.staff_id))
    .bind(advance.project_id.map(Uuid::from))
    .bind(advance.amount)
    .bind(advance.remaining_amount)
    .bind(&advance.notes)
    .bind(advance.created_at)
    .bind(advance.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn set_advance_remaining<'e, E: PgExecutor<'e>>(
    executor: E,
    advance_id: Uuid,
    remaining: Decimal,
) -> Result<Option<AdvanceRow>, DatabaseError> {
    let sql = format!(
        "UPDATE pm_advances \
         SET remaining_amount = $2, updated_at = now() \
         WHERE advance_id = $1 AND $2 >= 0 AND $2 <= amount \
         RETURNING {ADVANCE_COLUMNS}"
    );
    let row = sqlx::query_as::<_, AdvanceRow>(&sql)
        .bind(advance_id)
        .bind(remaining)
        .fetch_optional(executor)
        .await?;
    Ok(row)
}

// ============================================================================
// Notes
// ============================================================================

pub async fn find_note<'e, E: PgExecutor<'e>>(
    executor: E,
    note_id: Uuid,
) -> Result<Option<NoteRow>, DatabaseError> {
    let row = sqlx::query_as::<_, NoteRow>(
        r#"
        SELECT note_id, unit_id, project_id, description, amount, status, source_type,
               pm_advance_id, created_by, created_at, converted_at, converted_to_expense_id
        FROM accounting_notes
        WHERE note_id = $1
        "#,
    )
    .bind(note_id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn insert_note<'e, E: PgExecutor<'e>>(
    executor: E,
    note: &AccountingNote,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO accounting_notes (
            note_id, unit_id, project_id, description, amount, status, source_type,
            pm_advance_id, created_by, created_at, converted_at, converted_to_expense_id
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(Uuid::from(note.id))
    .bind(note.unit_id.map(Uuid::from))
    .bind(note.project_id.map(Uuid::from))
    .bind(&note.description)
    .bind(note.amount)
    .bind(note.status.as_str())
    .bind(note.source_type.map(|s| s.as_str()))
    .bind(note.pm_advance_id.map(Uuid::from))
    .bind(Uuid::from(note.created_by))
    .bind(note.created_at)
    .bind(note.converted_at)
    .bind(note.converted_to_expense_id.map(Uuid::from))
    .execute(executor)
    .await?;
    Ok(())
}

/// `PENDING -> CONVERTED`, persisting the resolved funding
pub async fn mark_note_converted<'e, E: PgExecutor<'e>>(
    executor: E,
    note_id: Uuid,
    expense_id: Uuid,
    source_type: &str,
    pm_advance_id: Option<Uuid>,
    converted_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE accounting_notes
        SET status = 'CONVERTED',
            source_type = $3,
            pm_advance_id = $4,
            converted_at = $5,
            converted_to_expense_id = $2
        WHERE note_id = $1 AND status = 'PENDING'
        "#,
    )
    .bind(note_id)
    .bind(expense_id)
    .bind(source_type)
    .bind(pm_advance_id)
    .bind(converted_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_note_rejected<'e, E: PgExecutor<'e>>(
    executor: E,
    note_id: Uuid,
    rejected_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE accounting_notes
        SET status = 'REJECTED', converted_at = $2
        WHERE note_id = $1 AND status = 'PENDING'
        "#,
    )
    .bind(note_id)
    .bind(rejected_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete_pending_note<'e, E: PgExecutor<'e>>(
    executor: E,
    note_id: Uuid,
) -> Result<bool, DatabaseError> {
    let result = sqlx::query("DELETE FROM accounting_notes WHERE note_id = $1 AND status = 'PENDING'")
        .bind(note_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() == 1)
}

// ============================================================================
// Operational expenses
// ============================================================================

pub async fn find_expense<'e, E: PgExecutor<'e>>(
    executor: E,
    expense_id: Uuid,
) -> Result<Option<ExpenseRow>, DatabaseError> {
    let row = sqlx::query_as::<_, ExpenseRow>(
        r#"
        SELECT expense_id, description, amount, source_type, unit_id, claim_invoice_id,
               pm_advance_id, recorded_by, converted_from_note_id, created_at
        FROM operational_expenses
        WHERE expense_id = $1
        "#,
    )
    .bind(expense_id)
    .fetch_optional(executor)
    .await?;
    Ok(row)
}

pub async fn insert_expense<'e, E: PgExecutor<'e>>(
    executor: E,
    expense: &OperationalExpense,
) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        INSERT INTO operational_expenses (
            expense_id, description, amount, source_type, unit_id, claim_invoice_id,
            pm_advance_id, recorded_by, converted_from_note_id, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(Uuid::from(expense.id))
    .bind(&expense.description)
    .bind(expense.amount)
    .bind(expense.source_type.as_str())
    .bind(Uuid::from(expense.unit_id))
    .bind(Uuid::from(expense.claim_invoice_id))
    .bind(expense.pm_advance_id.map(Uuid::from))
    .bind(Uuid::from(expense.recorded_by))
    .bind(expense.converted_from_note_id.map(Uuid::from))
    .bind(expense.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn link_expense_to_note<'e, E: PgExecutor<'e>>(
    executor: E,
    expense_id: Uuid,
    note_id: Uuid,
) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        "UPDATE operational_expenses SET converted_from_note_id = $2 WHERE expense_id = $1",
    )
    .bind(expense_id)
    .bind(note_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("OperationalExpense", expense_id));
    }
    Ok(())
}
