//! Services module
//!
//! Business rules that coordinate between callers and the repository.
//! Every operation takes the acting user explicitly.

mod access;
pub mod aggregation;
pub mod catalog;
pub mod invoices;
pub mod ledger;
pub mod reports;
pub mod settings;
pub mod timer;

pub use aggregation::Granularity;
pub use catalog::CatalogService;
pub use invoices::InvoiceService;
pub use ledger::LedgerService;
pub use reports::{ReportFilter, ReportService};
pub use settings::SettingsService;
pub use timer::{TimerService, TimerStatus};
