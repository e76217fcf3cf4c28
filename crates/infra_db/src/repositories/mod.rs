//! Repository implementations
//!
//! SQL access for the ledger tables. Functions are generic over the
//! executor so they run on the pool or inside a transaction alike.

pub mod ledger;
