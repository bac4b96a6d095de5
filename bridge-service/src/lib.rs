//! Bridge Service - mirrors repair-shop invoices, customers and payments into
//! the accounting ledger.

pub mod clients;
pub mod config;
pub mod models;
pub mod services;
pub mod startup;
