//! Claim Invoice Consolidator
//!
//! Routes an expense amount onto the unit's single open CLAIM invoice, or
//! mints one when none is open. Runs inside the caller's transaction; the
//! caller holds the unit lock so two conversions for the same unit cannot
//! both decide to mint.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::LedgerError;
use crate::invoice::Invoice;
use crate::ports::LedgerTx;
use crate::unit::{OwnerAssociation, Unit};

/// Outcome of consolidating one expense
#[derive(Debug, Clone)]
pub struct Consolidation {
    /// The invoice after the increment or creation
    pub invoice: Invoice,
    /// True when a new invoice was minted
    pub created: bool,
}

/// Adds `amount` to the unit's open claim invoice, creating it if needed
pub async fn consolidate<T: LedgerTx>(
    tx: &mut T,
    unit: &Unit,
    amount: Decimal,
) -> Result<Consolidation, LedgerError> {
    if let Some(open) = tx.find_open_claim_invoice(unit.id).await? {
        if let Some(invoice) = tx.increment_open_invoice(open.id, amount).await? {
            debug!(invoice_id = %invoice.id, amount = %amount, "Expense consolidated onto open claim invoice");
            return Ok(Consolidation {
                invoice,
                created: false,
            });
        }
        // Paid between lookup and increment; it is closed now
        warn!(invoice_id = %open.id, "Open claim invoice was paid concurrently, minting a new one");
    }

    ensure_owner_association(tx, unit).await?;

    let invoice = Invoice::new_claim(unit, amount);
    tx.insert_invoice(&invoice)
        .await
        .map_err(|source| LedgerError::InvoiceCreation {
            invoice_number: invoice.invoice_number.clone(),
            source,
        })?;

    debug!(invoice_id = %invoice.id, invoice_number = %invoice.invoice_number, "Claim invoice created");
    Ok(Consolidation {
        invoice,
        created: true,
    })
}

async fn ensure_owner_association<T: LedgerTx>(tx: &mut T, unit: &Unit) -> Result<(), LedgerError> {
    if tx.find_owner_association(unit.id).await?.is_none() {
        let placeholder = OwnerAssociation::placeholder_for(unit);
        tx.insert_owner_association(&placeholder).await?;
        debug!(unit_id = %unit.id, "Placeholder owner association created");
    }
    Ok(())
}
