//! Test Utilities Crate
//!
//! Shared test infrastructure for the ledger workspace.
//!
//! # Modules
//!
//! - `fixtures`: fixed units, amounts and timestamps
//! - `builders`: builders for notes, advances, invoices and payments
//! - `database`: PostgreSQL testcontainer with the ledger schema applied
//! - `assertions`: checks for the ledger invariants
//! - `generators`: proptest strategies for money amounts and funding

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;

pub use assertions::*;
pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
