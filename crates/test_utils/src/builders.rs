//! Test Data Builders
//!
//! Builders for ledger entities with sensible defaults, so tests set only
//! the fields they care about. Descriptions are generated with `fake`.

use chrono::{DateTime, Utc};
use fake::faker::lorem::en::Sentence;
use fake::Fake;
use rust_decimal::Decimal;

use core_kernel::{AdvanceId, InvoiceId, ProjectId, UnitId, UserId};
use domain_ledger::{
    AccountingNote, Invoice, InvoiceType, NewAccountingNote, Payment, PmAdvance, SourceType,
};

use crate::fixtures::AmountFixtures;

/// Builder for pending accounting notes
pub struct NoteBuilder {
    unit_id: Option<UnitId>,
    project_id: Option<ProjectId>,
    description: String,
    amount: Decimal,
    source_type: Option<SourceType>,
    pm_advance_id: Option<AdvanceId>,
    created_by: UserId,
}

impl Default for NoteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteBuilder {
    pub fn new() -> Self {
        Self {
            unit_id: None,
            project_id: None,
            description: Sentence(3..7).fake(),
            amount: AmountFixtures::repair(),
            source_type: None,
            pm_advance_id: None,
            created_by: UserId::new(),
        }
    }

    pub fn for_unit(mut self, unit_id: UnitId) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    pub fn in_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    /// Stores a PM_ADVANCE funding hint on the note
    pub fn hinting_advance(mut self, advance_id: AdvanceId) -> Self {
        self.source_type = Some(SourceType::PmAdvance);
        self.pm_advance_id = Some(advance_id);
        self
    }

    pub fn created_by(mut self, user: UserId) -> Self {
        self.created_by = user;
        self
    }

    /// The creation request, for tests that go through the service
    pub fn request(self) -> NewAccountingNote {
        let mut request = NewAccountingNote::new(self.description, self.amount, self.created_by);
        if let Some(unit_id) = self.unit_id {
            request = request.for_unit(unit_id);
        }
        if let Some(project_id) = self.project_id {
            request = request.in_project(project_id);
        }
        if let Some(source_type) = self.source_type {
            request = request.funded_by(source_type, self.pm_advance_id);
        }
        request
    }

    /// Builds the note directly
    ///
    /// # Panics
    ///
    /// Panics if the amount is not positive
    pub fn build(self) -> AccountingNote {
        self.request()
            .into_note()
            .expect("note builder requires a positive amount")
    }
}

/// Builder for PM advances
pub struct AdvanceBuilder {
    staff_id: UserId,
    project_id: Option<ProjectId>,
    amount: Decimal,
    remaining: Option<Decimal>,
    notes: Option<String>,
}

impl Default for AdvanceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvanceBuilder {
    pub fn new() -> Self {
        Self {
            staff_id: UserId::new(),
            project_id: None,
            amount: AmountFixtures::advance_float(),
            remaining: None,
            notes: None,
        }
    }

    pub fn for_staff(mut self, staff_id: UserId) -> Self {
        self.staff_id = staff_id;
        self
    }

    pub fn in_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    /// Starts the advance partly spent
    pub fn with_remaining(mut self, remaining: Decimal) -> Self {
        self.remaining = Some(remaining);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// # Panics
    ///
    /// Panics if the amount is not positive
    pub fn build(self) -> PmAdvance {
        let mut advance = PmAdvance::issue(self.staff_id, self.project_id, self.amount, self.notes)
            .expect("advance builder requires a positive amount");
        if let Some(remaining) = self.remaining {
            advance.remaining_amount = remaining;
        }
        advance
    }
}

/// Builder for invoices, including deliberately drifted ones
pub struct InvoiceBuilder {
    invoice_type: InvoiceType,
    invoice_number: String,
    unit_id: UnitId,
    amount: Decimal,
    stored_total_paid: Option<Decimal>,
    paid: Option<bool>,
    issued_at: Option<DateTime<Utc>>,
}

impl InvoiceBuilder {
    /// CLAIM invoice for the unit
    pub fn claim(unit_id: UnitId) -> Self {
        Self::new(InvoiceType::Claim, unit_id)
    }

    /// MANAGEMENT_SERVICE invoice for the unit
    pub fn management(unit_id: UnitId) -> Self {
        Self::new(InvoiceType::ManagementService, unit_id)
    }

    fn new(invoice_type: InvoiceType, unit_id: UnitId) -> Self {
        Self {
            invoice_type,
            invoice_number: format!("TST-{}", InvoiceId::new().as_uuid().simple()),
            unit_id,
            amount: AmountFixtures::repair(),
            stored_total_paid: None,
            paid: None,
            issued_at: None,
        }
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.invoice_number = number.into();
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    /// Stored `total_paid`, with derived fields kept consistent
    pub fn with_total_paid(mut self, total_paid: Decimal) -> Self {
        self.stored_total_paid = Some(total_paid);
        self
    }

    /// Overrides the stored paid flag, possibly inconsistently
    pub fn marked_paid(mut self, paid: bool) -> Self {
        self.paid = Some(paid);
        self
    }

    pub fn issued_at(mut self, at: DateTime<Utc>) -> Self {
        self.issued_at = Some(at);
        self
    }

    pub fn build(self) -> Invoice {
        let mut invoice = Invoice::new(self.invoice_type, self.invoice_number, self.unit_id, self.amount);
        if let Some(total_paid) = self.stored_total_paid {
            let balance = core_kernel::derive_invoice_state(invoice.amount, total_paid);
            invoice.apply_totals(total_paid, balance);
        }
        if let Some(paid) = self.paid {
            invoice.is_paid = paid;
        }
        if let Some(at) = self.issued_at {
            invoice.issued_at = at;
            invoice.updated_at = at;
        }
        invoice
    }
}

/// Payment against an invoice recorded at a fixed time
pub fn payment_at(invoice_id: InvoiceId, amount: Decimal, at: DateTime<Utc>) -> Payment {
    Payment::new(invoice_id, amount, None).recorded_at(at)
}
