//! Billable library
//!
//! Client-billing time tracking: a single running timer per user, a ledger
//! of completed entries, aggregation into billed totals and invoices.

pub mod app;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod format;
pub mod services;
