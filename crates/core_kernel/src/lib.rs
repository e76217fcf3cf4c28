//! Core Kernel - shared building blocks for the property ledger
//!
//! - Ledger primitives: two-digit money rounding and invoice balance derivation
//! - Strongly-typed identifiers for every ledger entity
//! - Port infrastructure shared by the domain and its storage adapters

pub mod money;
pub mod identifiers;
pub mod ports;

pub use money::{
    derive_invoice_state, exceeds_with_tolerance, non_negative_amount, positive_amount,
    round_money, sum_money, InvoiceBalance, MoneyError, MONEY_SCALE, PAID_TOLERANCE,
};
pub use identifiers::{
    AdvanceId, ExpenseId, InvoiceId, NoteId, OwnerAssociationId, PaymentId, ProjectId, UnitId,
    UserId,
};
pub use ports::{AdapterHealth, DomainPort, HealthCheckResult, HealthCheckable, PortError};
