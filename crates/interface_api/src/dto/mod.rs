//! Request/response data transfer objects

pub mod advances;
pub mod invoices;
pub mod notes;
