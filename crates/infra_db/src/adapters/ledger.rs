//! PostgreSQL Ledger Adapter
//!
//! Implements the ledger ports on top of [`crate::repositories::ledger`].
//!
//! # Overview
//!
//! - [`PostgresLedgerStore`] serves plain reads from the pool and opens
//!   transactions.
//! - [`PgLedgerTx`] wraps one `sqlx::Transaction`. Every write runs on that
//!   connection; dropping the handle without [`LedgerTx::commit`] rolls the
//!   transaction back.
//!
//! Stored enumerations are TEXT columns; a value the domain does not know
//! surfaces as `PortError::Transformation`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use infra_db::adapters::PostgresLedgerStore;
//! use domain_ledger::NoteService;
//!
//! let store = Arc::new(PostgresLedgerStore::new(pool));
//! let notes = NoteService::new(store);
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::money::InvoiceBalance;
use core_kernel::{
    AdapterHealth, AdvanceId, DomainPort, ExpenseId, HealthCheckResult, HealthCheckable,
    InvoiceId, NoteId, PaymentId, PortError, UnitId,
};
use domain_ledger::{
    AccountingNote, Invoice, InvoiceType, LedgerStore, LedgerTx, NoteConversion, NoteStatus,
    OperationalExpense, OwnerAssociation, Payment, PmAdvance, SourceType, Unit,
};

use crate::repositories::ledger::{
    self as repo, AdvanceRow, ExpenseRow, InvoiceRow, NoteRow, OwnerAssociationRow, PaymentRow,
    UnitRow,
};

const ADAPTER_ID: &str = "postgres-ledger-store";

/// PostgreSQL-backed implementation of [`LedgerStore`]
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    /// Runs `SELECT 1` against the pool
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();

        let result = sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await;

        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(_) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Healthy,
                latency_ms,
                message: None,
                checked_at: Utc::now(),
            },
            Err(e) => HealthCheckResult {
                adapter_id: ADAPTER_ID.to_string(),
                status: AdapterHealth::Unhealthy,
                latency_ms,
                message: Some(format!("Database error: {}", e)),
                checked_at: Utc::now(),
            },
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> Result<PgLedgerTx, PortError> {
        let tx = self.pool.begin().await.map_err(crate::DatabaseError::from)?;
        Ok(PgLedgerTx { tx })
    }

    #[instrument(skip(self), fields(note_id = %id))]
    async fn get_note(&self, id: NoteId) -> Result<Option<AccountingNote>, PortError> {
        repo::find_note(&self.pool, id.into())
            .await?
            .map(note_from_row)
            .transpose()
    }

    async fn get_unit(&self, id: UnitId) -> Result<Option<Unit>, PortError> {
        Ok(repo::find_unit(&self.pool, id.into()).await?.map(unit_from_row))
    }

    #[instrument(skip(self), fields(advance_id = %id))]
    async fn get_advance(&self, id: AdvanceId) -> Result<Option<PmAdvance>, PortError> {
        Ok(repo::find_advance(&self.pool, id.into()).await?.map(advance_from_row))
    }

    #[instrument(skip(self), fields(invoice_id = %id))]
    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
        repo::find_invoice(&self.pool, id.into())
            .await?
            .map(invoice_from_row)
            .transpose()
    }

    async fn get_expense(&self, id: ExpenseId) -> Result<Option<OperationalExpense>, PortError> {
        repo::find_expense(&self.pool, id.into())
            .await?
            .map(expense_from_row)
            .transpose()
    }

    async fn list_invoice_ids(
        &self,
        invoice_type: Option<InvoiceType>,
    ) -> Result<Vec<InvoiceId>, PortError> {
        let ids = repo::list_invoice_ids(&self.pool, invoice_type.map(|t| t.as_str())).await?;
        debug!(count = ids.len(), "Listed invoices");
        Ok(ids.into_iter().map(InvoiceId::from).collect())
    }

    async fn payments_for_invoice(&self, invoice_id: InvoiceId) -> Result<Vec<Payment>, PortError> {
        let rows = repo::list_payments(&self.pool, invoice_id.into()).await?;
        Ok(rows.into_iter().map(payment_from_row).collect())
    }
}

/// One open PostgreSQL transaction
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn lock_unit(&mut self, id: UnitId) -> Result<Option<Unit>, PortError> {
        Ok(repo::lock_unit(&mut *self.tx, id.into()).await?.map(unit_from_row))
    }

    async fn find_owner_association(
        &mut self,
        unit_id: UnitId,
    ) -> Result<Option<OwnerAssociation>, PortError> {
        Ok(repo::find_owner_association(&mut *self.tx, unit_id.into())
            .await?
            .map(owner_association_from_row))
    }

    async fn insert_owner_association(
        &mut self,
        association: &OwnerAssociation,
    ) -> Result<(), PortError> {
        repo::insert_owner_association(&mut *self.tx, association).await?;
        Ok(())
    }

    async fn find_open_claim_invoice(
        &mut self,
        unit_id: UnitId,
    ) -> Result<Option<Invoice>, PortError> {
        repo::find_open_claim_invoice(&mut *self.tx, unit_id.into())
            .await?
            .map(invoice_from_row)
            .transpose()
    }

    #[instrument(skip(self), fields(invoice_id = %id, amount = %amount))]
    async fn increment_open_invoice(
        &mut self,
        id: InvoiceId,
        amount: Decimal,
    ) -> Result<Option<Invoice>, PortError> {
        repo::increment_open_invoice(&mut *self.tx, id.into(), amount)
            .await?
            .map(invoice_from_row)
            .transpose()
    }

    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number))]
    async fn insert_invoice(&mut self, invoice: &Invoice) -> Result<(), PortError> {
        repo::insert_invoice(&mut *self.tx, invoice).await?;
        Ok(())
    }

    async fn lock_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
        repo::lock_invoice(&mut *self.tx, id.into())
            .await?
            .map(invoice_from_row)
            .transpose()
    }

    #[instrument(skip(self), fields(invoice_id = %id, amount = %amount))]
    async fn add_to_total_paid(
        &mut self,
        id: InvoiceId,
        amount: Decimal,
    ) -> Result<Option<Invoice>, PortError> {
        repo::add_to_total_paid(&mut *self.tx, id.into(), amount)
            .await?
            .map(invoice_from_row)
            .transpose()
    }

    async fn write_invoice_totals(
        &mut self,
        id: InvoiceId,
        total_paid: Decimal,
        balance: InvoiceBalance,
    ) -> Result<Invoice, PortError> {
        let row = repo::write_invoice_totals(
            &mut *self.tx,
            id.into(),
            total_paid,
            balance.remaining_balance,
            balance.is_paid,
        )
        .await?;
        invoice_from_row(row)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), PortError> {
        repo::insert_payment(&mut *self.tx, payment).await?;
        Ok(())
    }

    async fn list_payments(&mut self, invoice_id: InvoiceId) -> Result<Vec<Payment>, PortError> {
        let rows = repo::list_payments(&mut *self.tx, invoice_id.into()).await?;
        Ok(rows.into_iter().map(payment_from_row).collect())
    }

    #[instrument(skip(self), fields(payment_id = %id))]
    async fn delete_payment(&mut self, id: PaymentId) -> Result<bool, PortError> {
        Ok(repo::delete_payment(&mut *self.tx, id.into()).await?)
    }

    async fn find_advance(&mut self, id: AdvanceId) -> Result<Option<PmAdvance>, PortError> {
        Ok(repo::find_advance(&mut *self.tx, id.into())
            .await?
            .map(advance_from_row))
    }

    #[instrument(skip(self), fields(advance_id = %id, amount = %amount))]
    async fn reserve_advance(&mut self, id: AdvanceId, amount: Decimal) -> Result<bool, PortError> {
        Ok(repo::reserve_advance(&mut *self.tx, id.into(), amount).await?)
    }

    async fn insert_advance(&mut self, advance: &PmAdvance) -> Result<(), PortError> {
        repo::insert_advance(&mut *self.tx, advance).await?;
        Ok(())
    }

    async fn set_advance_remaining(
        &mut self,
        id: AdvanceId,
        remaining: Decimal,
    ) -> Result<Option<PmAdvance>, PortError> {
        Ok(repo::set_advance_remaining(&mut *self.tx, id.into(), remaining)
            .await?
            .map(advance_from_row))
    }

    async fn insert_note(&mut self, note: &AccountingNote) -> Result<(), PortError> {
        repo::insert_note(&mut *self.tx, note).await?;
        Ok(())
    }

    #[instrument(skip(self, conversion), fields(note_id = %id))]
    async fn mark_note_converted(
        &mut self,
        id: NoteId,
        conversion: &NoteConversion,
    ) -> Result<bool, PortError> {
        Ok(repo::mark_note_converted(
            &mut *self.tx,
            id.into(),
            conversion.expense_id.into(),
            conversion.funding.source_type().as_str(),
            conversion.funding.advance_id().map(Uuid::from),
            conversion.converted_at,
        )
        .await?)
    }

    #[instrument(skip(self), fields(note_id = %id))]
    async fn mark_note_rejected(
        &mut self,
        id: NoteId,
        rejected_at: DateTime<Utc>,
    ) -> Result<bool, PortError> {
        Ok(repo::mark_note_rejected(&mut *self.tx, id.into(), rejected_at).await?)
    }

    async fn delete_pending_note(&mut self, id: NoteId) -> Result<bool, PortError> {
        Ok(repo::delete_pending_note(&mut *self.tx, id.into()).await?)
    }

    async fn insert_expense(&mut self, expense: &OperationalExpense) -> Result<(), PortError> {
        repo::insert_expense(&mut *self.tx, expense).await?;
        Ok(())
    }

    async fn link_expense_to_note(
        &mut self,
        expense_id: ExpenseId,
        note_id: NoteId,
    ) -> Result<(), PortError> {
        repo::link_expense_to_note(&mut *self.tx, expense_id.into(), note_id.into()).await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), PortError> {
        self.tx.commit().await.map_err(crate::DatabaseError::from)?;
        Ok(())
    }
}

// ============================================================================
// Row conversions
// ============================================================================

fn parse_stored<T>(column: &str, value: &str) -> Result<T, PortError>
where
    T: FromStr<Err = String>,
{
    value
        .parse()
        .map_err(|e: String| PortError::transformation(format!("{}: {}", column, e)))
}

fn unit_from_row(row: UnitRow) -> Unit {
    Unit {
        id: row.unit_id.into(),
        project_id: row.project_id.map(Into::into),
        code: row.code,
        name: row.name,
    }
}

fn owner_association_from_row(row: OwnerAssociationRow) -> OwnerAssociation {
    OwnerAssociation {
        id: row.owner_association_id.into(),
        unit_id: row.unit_id.into(),
        name: row.name,
        is_placeholder: row.is_placeholder,
        created_at: row.created_at,
    }
}

fn invoice_from_row(row: InvoiceRow) -> Result<Invoice, PortError> {
    Ok(Invoice {
        id: row.invoice_id.into(),
        invoice_number: row.invoice_number,
        invoice_type: parse_stored("invoice_type", &row.invoice_type)?,
        unit_id: row.unit_id.into(),
        amount: row.amount,
        total_paid: row.total_paid,
        remaining_balance: row.remaining_balance,
        is_paid: row.is_paid,
        issued_at: row.issued_at,
        updated_at: row.updated_at,
    })
}

fn payment_from_row(row: PaymentRow) -> Payment {
    Payment {
        id: row.payment_id.into(),
        invoice_id: row.invoice_id.into(),
        amount: row.amount,
        recorded_by: row.recorded_by.map(Into::into),
        created_at: row.created_at,
    }
}

fn advance_from_row(row: AdvanceRow) -> PmAdvance {
    PmAdvance {
        id: row.advance_id.into(),
        staff_id: row.staff_id.into(),
        project_id: row.project_id.map(Into::into),
        amount: row.amount,
        remaining_amount: row.remaining_amount,
        notes: row.notes,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn note_from_row(row: NoteRow) -> Result<AccountingNote, PortError> {
    let status: NoteStatus = parse_stored("status", &row.status)?;
    let source_type = row
        .source_type
        .as_deref()
        .map(|s| parse_stored::<SourceType>("source_type", s))
        .transpose()?;

    Ok(AccountingNote {
        id: row.note_id.into(),
        unit_id: row.unit_id.map(Into::into),
        project_id: row.project_id.map(Into::into),
        description: row.description,
        amount: row.amount,
        status,
        source_type,
        pm_advance_id: row.pm_advance_id.map(Into::into),
        created_by: row.created_by.into(),
        created_at: row.created_at,
        converted_at: row.converted_at,
        converted_to_expense_id: row.converted_to_expense_id.map(Into::into),
    })
}

fn expense_from_row(row: ExpenseRow) -> Result<OperationalExpense, PortError> {
    Ok(OperationalExpense {
        id: row.expense_id.into(),
        description: row.description,
        amount: row.amount,
        source_type: parse_stored("source_type", &row.source_type)?,
        unit_id: row.unit_id.into(),
        claim_invoice_id: row.claim_invoice_id.into(),
        pm_advance_id: row.pm_advance_id.map(Into::into),
        recorded_by: row.recorded_by.into(),
        converted_from_note_id: row.converted_from_note_id.map(Into::into),
        created_at: row.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn note_row(status: &str, source_type: Option<&str>) -> NoteRow {
        NoteRow {
            note_id: Uuid::new_v4(),
            unit_id: Some(Uuid::new_v4()),
            project_id: None,
            description: "Replace lobby bulbs".to_string(),
            amount: dec!(45.50),
            status: status.to_string(),
            source_type: source_type.map(str::to_string),
            pm_advance_id: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            converted_at: None,
            converted_to_expense_id: None,
        }
    }

    #[test]
    fn test_note_row_maps_enums() {
        let note = note_from_row(note_row("PENDING", Some("PM_ADVANCE"))).unwrap();
        assert_eq!(note.status, NoteStatus::Pending);
        assert_eq!(note.source_type, Some(SourceType::PmAdvance));
        assert_eq!(note.amount, dec!(45.50));
    }

    #[test]
    fn test_note_row_without_source_type() {
        let note = note_from_row(note_row("REJECTED", None)).unwrap();
        assert_eq!(note.status, NoteStatus::Rejected);
        assert!(note.source_type.is_none());
    }

    #[test]
    fn test_unknown_status_is_transformation_error() {
        let err = note_from_row(note_row("ARCHIVED", None)).unwrap_err();
        assert!(matches!(err, PortError::Transformation { .. }));
        assert!(err.to_string().contains("status"));
    }

    #[test]
    fn test_invoice_row_maps_type() {
        let now = Utc::now();
        let row = InvoiceRow {
            invoice_id: Uuid::new_v4(),
            invoice_number: "CLM-1-B-7".to_string(),
            invoice_type: "MANAGEMENT_SERVICE".to_string(),
            unit_id: Uuid::new_v4(),
            amount: dec!(100.00),
            total_paid: dec!(40.00),
            remaining_balance: dec!(60.00),
            is_paid: false,
            issued_at: now,
            updated_at: now,
        };
        let invoice = invoice_from_row(row).unwrap();
        assert_eq!(invoice.invoice_type, InvoiceType::ManagementService);
        assert!(invoice.is_consistent());
    }
}
