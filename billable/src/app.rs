//! Application state and initialization
//!
//! Opens the data directory and builds every service on one shared
//! connection pool.

use crate::config::DATABASE_FILE_NAME;
use crate::database::{create_pool, Repository};
use crate::error::Result;
use crate::services::{
    CatalogService, InvoiceService, LedgerService, ReportService, SettingsService, TimerService,
};
use std::path::{Path, PathBuf};

/// Central application state holding all services
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub catalog: CatalogService,
    pub timer: TimerService,
    pub ledger: LedgerService,
    pub reports: ReportService,
    pub invoices: InvoiceService,
    pub settings: SettingsService,
}

impl AppState {
    /// Create the data directory if needed, open the database and load settings
    pub async fn initialize(data_dir: &Path) -> Result<Self> {
        tracing::info!("Initializing application in {:?}", data_dir);

        std::fs::create_dir_all(data_dir)?;

        let pool = create_pool(&data_dir.join(DATABASE_FILE_NAME)).await?;
        let repo = Repository::new(pool);

        let settings = SettingsService::new(data_dir.to_path_buf());
        settings.load().await?;

        let state = Self {
            data_dir: data_dir.to_path_buf(),
            catalog: CatalogService::new(repo.clone()),
            timer: TimerService::new(repo.clone()),
            ledger: LedgerService::new(repo.clone()),
            reports: ReportService::new(repo.clone()),
            invoices: InvoiceService::new(repo),
            settings,
        };

        tracing::info!("Application initialized successfully");
        Ok(state)
    }
}
