//! Domain Adapters
//!
//! Implementations of domain ports backed by PostgreSQL. Each adapter
//! translates between domain models and the repository row types.

pub mod ledger;

pub use ledger::{PgLedgerTx, PostgresLedgerStore};
