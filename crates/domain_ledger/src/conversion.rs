//! Accounting Note State Machine
//!
//! Owns every transition of an accounting note and orchestrates the
//! consolidator and the PM advance ledger inside one transaction during
//! conversion.
//!
//! # Conversion order
//!
//! Inside the transaction the writes happen in a fixed order:
//!
//! 1. lock the unit
//! 2. consolidate onto the open claim invoice (or mint one)
//! 3. insert the operational expense
//! 4. reserve PM advance funds (PM_ADVANCE only)
//! 5. `PENDING -> CONVERTED`, conditional on the note still being pending
//! 6. backfill the expense's note link
//!
//! Any failure drops the transaction, so no step is ever visible alone.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use core_kernel::{AdvanceId, NoteId, UnitId};

use crate::actor::Actor;
use crate::advance::{reserve, PmAdvanceLedger};
use crate::consolidator::{consolidate, Consolidation};
use crate::error::LedgerError;
use crate::expense::OperationalExpense;
use crate::invoice::Invoice;
use crate::note::{AccountingNote, Funding, NewAccountingNote, NoteConversion, SourceType};
use crate::ports::{LedgerStore, LedgerTx};
use crate::unit::Unit;

/// Caller-supplied funding overrides; unset fields fall back to the note
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionRequest {
    pub source_type: Option<SourceType>,
    pub pm_advance_id: Option<AdvanceId>,
}

impl ConversionRequest {
    pub fn office_fund() -> Self {
        Self {
            source_type: Some(SourceType::OfficeFund),
            pm_advance_id: None,
        }
    }

    pub fn pm_advance(advance_id: AdvanceId) -> Self {
        Self {
            source_type: Some(SourceType::PmAdvance),
            pm_advance_id: Some(advance_id),
        }
    }
}

/// Committed state after a successful conversion
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub note: AccountingNote,
    pub invoice: Invoice,
    pub expense: OperationalExpense,
    /// True when a new claim invoice was minted, false when an open one grew
    pub invoice_created: bool,
}

/// Lifecycle operations on accounting notes
pub struct NoteService<S: LedgerStore> {
    store: Arc<S>,
    advances: PmAdvanceLedger<S>,
}

impl<S: LedgerStore> NoteService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            advances: PmAdvanceLedger::new(Arc::clone(&store)),
            store,
        }
    }

    pub async fn get_note(&self, note_id: NoteId) -> Result<AccountingNote, LedgerError> {
        self.store
            .get_note(note_id)
            .await?
            .ok_or(LedgerError::NoteNotFound(note_id))
    }

    /// Records a new pending note
    #[instrument(skip(self, new_note), fields(created_by = %new_note.created_by))]
    pub async fn record_note(&self, new_note: NewAccountingNote) -> Result<AccountingNote, LedgerError> {
        let note = new_note.into_note()?;

        if let Some(unit_id) = note.unit_id {
            self.require_unit(unit_id).await?;
        }

        let mut tx = self.store.begin().await?;
        tx.insert_note(&note).await?;
        tx.commit().await?;

        info!(note_id = %note.id, amount = %note.amount, "Accounting note recorded");
        Ok(note)
    }

    /// Converts a pending note into an operational expense on a claim invoice
    #[instrument(skip(self, request), fields(note_id = %note_id, actor = %actor.id))]
    pub async fn convert(
        &self,
        note_id: NoteId,
        request: ConversionRequest,
        actor: &Actor,
    ) -> Result<ConversionResult, LedgerError> {
        actor.require_ledger_poster("convert accounting notes")?;

        let note = self.get_note(note_id).await?;
        let unit_id = note.unit_id.ok_or(LedgerError::MissingUnit(note_id))?;
        let unit = self
            .store
            .get_unit(unit_id)
            .await?
            .ok_or(LedgerError::MissingUnit(note_id))?;
        note.ensure_pending()?;

        let funding = note.resolve_funding(request.source_type, request.pm_advance_id)?;
        if let Funding::PmAdvance(advance_id) = funding {
            self.advances.precheck(advance_id, note.amount).await?;
        }

        let (conversion, consolidation) = match self.convert_in_tx(&note, &unit, funding, actor).await {
            Ok(committed) => committed,
            Err(err) => {
                match &err {
                    LedgerError::AlreadyProcessed(_) => {
                        warn!("Conversion lost the race; note already processed")
                    }
                    LedgerError::PmAdvanceInsufficient { remaining, needed, .. } => {
                        warn!(%remaining, %needed, "PM advance drained before reservation")
                    }
                    LedgerError::Store(_) | LedgerError::InvoiceCreation { .. } => {
                        error!(error = %err, "Conversion rolled back")
                    }
                    _ => {}
                }
                return Err(err);
            }
        };

        info!(
            expense_id = %conversion.expense_id,
            invoice_id = %consolidation.invoice.id,
            invoice_created = consolidation.created,
            source_type = %funding.source_type(),
            "Accounting note converted"
        );

        let note = self.get_note(note_id).await?;
        let invoice = self
            .store
            .get_invoice(consolidation.invoice.id)
            .await?
            .ok_or(LedgerError::InvoiceNotFound(consolidation.invoice.id))?;
        let expense = self
            .store
            .get_expense(conversion.expense_id)
            .await?
            .ok_or_else(|| {
                LedgerError::Store(core_kernel::PortError::not_found(
                    "OperationalExpense",
                    conversion.expense_id,
                ))
            })?;

        Ok(ConversionResult {
            note,
            invoice,
            expense,
            invoice_created: consolidation.created,
        })
    }

    async fn convert_in_tx(
        &self,
        note: &AccountingNote,
        unit: &Unit,
        funding: Funding,
        actor: &Actor,
    ) -> Result<(NoteConversion, Consolidation), LedgerError> {
        let mut tx = self.store.begin().await?;

        let unit = tx
            .lock_unit(unit.id)
            .await?
            .ok_or(LedgerError::MissingUnit(note.id))?;

        let consolidation = consolidate(&mut tx, &unit, note.amount).await?;

        let expense = OperationalExpense::from_note(note, unit.id, consolidation.invoice.id, funding, actor.id);
        tx.insert_expense(&expense).await?;

        if let Funding::PmAdvance(advance_id) = funding {
            reserve(&mut tx, advance_id, note.amount).await?;
        }

        let conversion = NoteConversion {
            expense_id: expense.id,
            funding,
            converted_at: Utc::now(),
        };
        if !tx.mark_note_converted(note.id, &conversion).await? {
            return Err(LedgerError::AlreadyProcessed(note.id));
        }

        tx.link_expense_to_note(expense.id, note.id).await?;
        tx.commit().await?;

        Ok((conversion, consolidation))
    }

    /// Rejects a pending note; no financial side effects
    #[instrument(skip(self), fields(note_id = %note_id, actor = %actor.id))]
    pub async fn reject(&self, note_id: NoteId, actor: &Actor) -> Result<AccountingNote, LedgerError> {
        actor.require_ledger_poster("reject accounting notes")?;

        let mut note = self.get_note(note_id).await?;
        note.ensure_pending()?;

        let rejected_at = Utc::now();
        let mut tx = self.store.begin().await?;
        if !tx.mark_note_rejected(note_id, rejected_at).await? {
            warn!("Rejection lost the race; note already processed");
            return Err(LedgerError::AlreadyProcessed(note_id));
        }
        tx.commit().await?;

        note.apply_rejection(rejected_at);
        info!("Accounting note rejected");
        Ok(note)
    }

    /// Deletes a note while it is still pending
    #[instrument(skip(self), fields(note_id = %note_id, actor = %actor.id))]
    pub async fn delete_note(&self, note_id: NoteId, actor: &Actor) -> Result<(), LedgerError> {
        actor.require_admin("delete accounting notes")?;

        let note = self.get_note(note_id).await?;
        note.ensure_pending()?;

        let mut tx = self.store.begin().await?;
        if !tx.delete_pending_note(note_id).await? {
            return Err(LedgerError::AlreadyProcessed(note_id));
        }
        tx.commit().await?;

        info!("Pending accounting note deleted");
        Ok(())
    }

    async fn require_unit(&self, unit_id: UnitId) -> Result<Unit, LedgerError> {
        self.store
            .get_unit(unit_id)
            .await?
            .ok_or(LedgerError::UnitNotFound(unit_id))
    }
}
