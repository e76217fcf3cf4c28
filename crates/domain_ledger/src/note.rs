//! Accounting notes
//!
//! A note is an unreviewed expense claim raised by an operational-expense
//! request or a technician work-completion event. It moves exactly once from
//! `Pending` to one of the terminal states.
//!
//! ```text
//!              ┌──────────► CONVERTED
//!   PENDING ───┤
//!              └──────────► REJECTED
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::money::positive_amount;
use core_kernel::{AdvanceId, ExpenseId, NoteId, ProjectId, UnitId, UserId};

use crate::error::LedgerError;

/// Lifecycle state of an accounting note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteStatus {
    Pending,
    Converted,
    Rejected,
}

impl NoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteStatus::Pending => "PENDING",
            NoteStatus::Converted => "CONVERTED",
            NoteStatus::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, NoteStatus::Pending)
    }

    /// Only `Pending -> Converted` and `Pending -> Rejected` exist
    pub fn can_transition_to(&self, next: NoteStatus) -> bool {
        matches!(
            (self, next),
            (NoteStatus::Pending, NoteStatus::Converted) | (NoteStatus::Pending, NoteStatus::Rejected)
        )
    }
}

impl fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(NoteStatus::Pending),
            "CONVERTED" => Ok(NoteStatus::Converted),
            "REJECTED" => Ok(NoteStatus::Rejected),
            other => Err(format!("unknown note status '{}'", other)),
        }
    }
}

/// Where the money for a converted expense came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    OfficeFund,
    PmAdvance,
}

/// Funding source used when neither the caller nor the note names one.
///
/// Drawing down a manager's float is always an explicit choice.
pub const DEFAULT_SOURCE_TYPE: SourceType = SourceType::OfficeFund;

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::OfficeFund => "OFFICE_FUND",
            SourceType::PmAdvance => "PM_ADVANCE",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OFFICE_FUND" => Ok(SourceType::OfficeFund),
            "PM_ADVANCE" => Ok(SourceType::PmAdvance),
            other => Err(format!("unknown source type '{}'", other)),
        }
    }
}

/// Resolved funding for one conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Funding {
    OfficeFund,
    PmAdvance(AdvanceId),
}

impl Funding {
    pub fn source_type(&self) -> SourceType {
        match self {
            Funding::OfficeFund => SourceType::OfficeFund,
            Funding::PmAdvance(_) => SourceType::PmAdvance,
        }
    }

    pub fn advance_id(&self) -> Option<AdvanceId> {
        match self {
            Funding::OfficeFund => None,
            Funding::PmAdvance(id) => Some(*id),
        }
    }
}

/// An accounting note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingNote {
    pub id: NoteId,
    /// Missing only on legacy rows; such notes cannot be converted
    pub unit_id: Option<UnitId>,
    pub project_id: Option<ProjectId>,
    pub description: String,
    pub amount: Decimal,
    pub status: NoteStatus,
    /// Funding hint until conversion, the resolved source afterwards
    pub source_type: Option<SourceType>,
    pub pm_advance_id: Option<AdvanceId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    /// Conversion time, or rejection time for rejected notes
    pub converted_at: Option<DateTime<Utc>>,
    /// Set if and only if `status == Converted`
    pub converted_to_expense_id: Option<ExpenseId>,
}

impl AccountingNote {
    /// Fails with `AlreadyProcessed` once the note has left `Pending`
    pub fn ensure_pending(&self) -> Result<(), LedgerError> {
        if self.status == NoteStatus::Pending {
            Ok(())
        } else {
            Err(LedgerError::AlreadyProcessed(self.id))
        }
    }

    /// Resolves funding: explicit argument, then the note's stored hint, then
    /// [`DEFAULT_SOURCE_TYPE`]. The advance id resolves the same way.
    ///
    /// Office-fund conversions never carry an advance id, even when the note
    /// had one stored as a hint.
    pub fn resolve_funding(
        &self,
        requested_source: Option<SourceType>,
        requested_advance: Option<AdvanceId>,
    ) -> Result<Funding, LedgerError> {
        let source = requested_source
            .or(self.source_type)
            .unwrap_or(DEFAULT_SOURCE_TYPE);

        match source {
            SourceType::OfficeFund => Ok(Funding::OfficeFund),
            SourceType::PmAdvance => requested_advance
                .or(self.pm_advance_id)
                .map(Funding::PmAdvance)
                .ok_or(LedgerError::PmAdvanceRequired(self.id)),
        }
    }

    /// Applies a committed conversion to an in-memory copy
    pub fn apply_conversion(&mut self, conversion: &NoteConversion) {
        self.status = NoteStatus::Converted;
        self.source_type = Some(conversion.funding.source_type());
        self.pm_advance_id = conversion.funding.advance_id();
        self.converted_at = Some(conversion.converted_at);
        self.converted_to_expense_id = Some(conversion.expense_id);
    }

    /// Applies a rejection to an in-memory copy
    pub fn apply_rejection(&mut self, rejected_at: DateTime<Utc>) {
        self.status = NoteStatus::Rejected;
        self.converted_at = Some(rejected_at);
    }
}

/// Input for recording a new pending note
#[derive(Debug, Clone)]
pub struct NewAccountingNote {
    pub unit_id: Option<UnitId>,
    pub project_id: Option<ProjectId>,
    pub description: String,
    pub amount: Decimal,
    pub source_type: Option<SourceType>,
    pub pm_advance_id: Option<AdvanceId>,
    pub created_by: UserId,
}

impl NewAccountingNote {
    pub fn new(description: impl Into<String>, amount: Decimal, created_by: UserId) -> Self {
        Self {
            unit_id: None,
            project_id: None,
            description: description.into(),
            amount,
            source_type: None,
            pm_advance_id: None,
            created_by,
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

    /// Stores a funding hint picked up at conversion when the caller gives none
    pub fn funded_by(mut self, source_type: SourceType, pm_advance_id: Option<AdvanceId>) -> Self {
        self.source_type = Some(source_type);
        self.pm_advance_id = pm_advance_id;
        self
    }

    /// Validates the amount and builds the pending note
    pub fn into_note(self) -> Result<AccountingNote, LedgerError> {
        let amount = positive_amount(self.amount)?;

        Ok(AccountingNote {
            id: NoteId::new_v7(),
            unit_id: self.unit_id,
            project_id: self.project_id,
            description: self.description,
            amount,
            status: NoteStatus::Pending,
            source_type: self.source_type,
            pm_advance_id: self.pm_advance_id,
            created_by: self.created_by,
            created_at: Utc::now(),
            converted_at: None,
            converted_to_expense_id: None,
        })
    }
}

/// Values written by the `Pending -> Converted` conditional update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteConversion {
    pub expense_id: ExpenseId,
    pub funding: Funding,
    pub converted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::MoneyError;
    use rust_decimal_macros::dec;

    fn pending_note() -> AccountingNote {
        NewAccountingNote::new("Replace lobby bulbs", dec!(120.00), UserId::new())
            .for_unit(UnitId::new())
            .into_note()
            .unwrap()
    }

    #[test]
    fn test_status_transitions() {
        assert!(NoteStatus::Pending.can_transition_to(NoteStatus::Converted));
        assert!(NoteStatus::Pending.can_transition_to(NoteStatus::Rejected));
        assert!(!NoteStatus::Converted.can_transition_to(NoteStatus::Pending));
        assert!(!NoteStatus::Rejected.can_transition_to(NoteStatus::Converted));
        assert!(NoteStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_defaults_to_office_fund() {
        let note = pending_note();
        assert_eq!(note.resolve_funding(None, None).unwrap(), Funding::OfficeFund);
    }

    #[test]
    fn test_stored_hint_used_when_caller_omits() {
        let advance_id = AdvanceId::new();
        let mut note = pending_note();
        note.source_type = Some(SourceType::PmAdvance);
        note.pm_advance_id = Some(advance_id);

        assert_eq!(note.resolve_funding(None, None).unwrap(), Funding::PmAdvance(advance_id));
    }

    #[test]
    fn test_caller_overrides_stored_hint() {
        let mut note = pending_note();
        note.source_type = Some(SourceType::PmAdvance);
        note.pm_advance_id = Some(AdvanceId::new());

        assert_eq!(
            note.resolve_funding(Some(SourceType::OfficeFund), None).unwrap(),
            Funding::OfficeFund
        );

        let other = AdvanceId::new();
        assert_eq!(
            note.resolve_funding(None, Some(other)).unwrap(),
            Funding::PmAdvance(other)
        );
    }

    #[test]
    fn test_pm_advance_without_advance_id_fails() {
        let note = pending_note();
        let err = note.resolve_funding(Some(SourceType::PmAdvance), None).unwrap_err();
        assert!(matches!(err, LedgerError::PmAdvanceRequired(id) if id == note.id));
    }

    #[test]
    fn test_record_rejects_non_positive_amount() {
        let err = NewAccountingNote::new("Nothing", dec!(0.001), UserId::new())
            .into_note()
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(MoneyError::NonPositive(_))));
    }

    #[test]
    fn test_apply_conversion_sets_expense_link() {
        let mut note = pending_note();
        let conversion = NoteConversion {
            expense_id: ExpenseId::new(),
            funding: Funding::OfficeFund,
            converted_at: Utc::now(),
        };
        note.apply_conversion(&conversion);

        assert_eq!(note.status, NoteStatus::Converted);
        assert_eq!(note.converted_to_expense_id, Some(conversion.expense_id));
        assert_eq!(note.source_type, Some(SourceType::OfficeFund));
        assert!(matches!(note.ensure_pending(), Err(LedgerError::AlreadyProcessed(_))));
    }
}
