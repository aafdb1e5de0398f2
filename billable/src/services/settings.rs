//! Settings service
//!
//! Manages application settings persistence using JSON file storage.

use super::aggregation::Granularity;
use crate::config::{
    DEFAULT_POLL_INTERVAL_SECS, DEFAULT_REPORT_RANGE_DAYS, MAX_POLL_INTERVAL_SECS,
    MAX_REPORT_RANGE_DAYS, MIN_POLL_INTERVAL_SECS, MIN_REPORT_RANGE_DAYS, SETTINGS_FILE_NAME,
};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Active timer display configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSettings {
    /// How often a display re-reads the active timer, in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u32,
}

fn default_poll_interval() -> u32 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Report and invoice defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "default_granularity")]
    pub default_granularity: Granularity,
    /// Days covered when no explicit range is given, ending today
    #[serde(default = "default_range_days")]
    pub default_range_days: u32,
}

fn default_granularity() -> Granularity {
    Granularity::Month
}

fn default_range_days() -> u32 {
    DEFAULT_REPORT_RANGE_DAYS
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            default_granularity: default_granularity(),
            default_range_days: default_range_days(),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub timer: TimerSettings,
    #[serde(default)]
    pub reports: ReportSettings,
}

impl AppSettings {
    pub fn validate(&self) -> Result<()> {
        let poll = self.timer.poll_interval_secs;
        if !(MIN_POLL_INTERVAL_SECS..=MAX_POLL_INTERVAL_SECS).contains(&poll) {
            return Err(AppError::validation(format!(
                "poll interval must be between {MIN_POLL_INTERVAL_SECS} and {MAX_POLL_INTERVAL_SECS} seconds, got {poll}"
            )));
        }

        let days = self.reports.default_range_days;
        if !(MIN_REPORT_RANGE_DAYS..=MAX_REPORT_RANGE_DAYS).contains(&days) {
            return Err(AppError::validation(format!(
                "report range must be between {MIN_REPORT_RANGE_DAYS} and {MAX_REPORT_RANGE_DAYS} days, got {days}"
            )));
        }

        Ok(())
    }
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            settings_path: data_dir.join(SETTINGS_FILE_NAME),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;

        if let Err(e) = settings.validate() {
            tracing::warn!("Ignoring invalid settings file {:?}: {}", self.settings_path, e);
            return Ok(AppSettings::default());
        }

        Ok(settings)
    }

    /// Validate and save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        settings.validate()?;

        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    pub async fn get_timer(&self) -> Result<TimerSettings> {
        Ok(self.load().await?.timer)
    }

    pub async fn update_timer(&self, timer: TimerSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.timer = timer;
        self.save(&settings).await
    }

    pub async fn get_reports(&self) -> Result<ReportSettings> {
        Ok(self.load().await?.reports)
    }

    pub async fn update_reports(&self, reports: ReportSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.reports = reports;
        self.save(&settings).await
    }
}
