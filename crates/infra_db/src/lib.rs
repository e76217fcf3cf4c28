//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the ledger engine using SQLx.
//!
//! # Architecture
//!
//! - [`repositories`] holds the SQL, one function per statement.
//! - [`adapters`] implements the `domain_ledger` ports on top of it.
//!
//! Every balance-guarding write is a single conditional `UPDATE`, so
//! concurrent requests race inside PostgreSQL rather than in Rust.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerStore};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/ledger")).await?;
//! run_migrations(&pool).await?;
//! let store = PostgresLedgerStore::new(pool);
//! ```

pub mod adapters;
pub mod error;
pub mod pool;
pub mod repositories;

pub use adapters::{PgLedgerTx, PostgresLedgerStore};
pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
