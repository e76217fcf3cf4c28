//! Request handlers

pub mod advances;
pub mod health;
pub mod invoices;
pub mod maintenance;
pub mod notes;
