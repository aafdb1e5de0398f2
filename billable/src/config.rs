//! Application configuration constants
//!
//! Central location for all configuration constants, window sizes,
//! display placeholders and validation boundaries used throughout the crate.

// ===== Storage =====

/// SQLite database file name inside the data directory
pub const DATABASE_FILE_NAME: &str = "billable.db";

/// Settings file name inside the data directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Environment variable consulted for the data directory
pub const DATA_DIR_ENV: &str = "BILLABLE_DATA_DIR";

/// Data directory used when neither flag nor environment names one
pub const DEFAULT_DATA_DIR: &str = ".billable";

// ===== Statistics windows =====

/// Day buckets in the statistics lookback window
pub const DAY_BUCKETS: u32 = 30;

/// Week buckets (ISO weeks starting Monday)
pub const WEEK_BUCKETS: u32 = 12;

/// Calendar month buckets
pub const MONTH_BUCKETS: u32 = 12;

/// Calendar year buckets
pub const YEAR_BUCKETS: u32 = 5;

// ===== Report grouping =====

/// Group for entries that carry no tags
pub const UNTAGGED_LABEL: &str = "Untagged";

/// Group for entries with neither a task name nor a task reference
pub const NO_TASK_LABEL: &str = "Other";

/// Number of task groups kept in a project report
pub const TOP_TASKS_LIMIT: usize = 10;

// ===== Task display identifiers =====

/// Prefix used when a project name has no ASCII letters
pub const DEFAULT_TASK_PREFIX: &str = "PRJ";

/// Letters taken from the project name for the prefix
pub const TASK_PREFIX_LEN: usize = 4;

/// Zero-padded width of the task number
pub const TASK_NUMBER_WIDTH: usize = 3;

/// Default display color for new tags
pub const DEFAULT_TAG_COLOR: &str = "#3ECF8E";

// ===== Settings limits =====

/// Minimum active timer poll interval in seconds
pub const MIN_POLL_INTERVAL_SECS: u32 = 1;

/// Maximum active timer poll interval in seconds (1 hour)
pub const MAX_POLL_INTERVAL_SECS: u32 = 3_600;

/// Default active timer poll interval in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u32 = 30;

/// Minimum default report range in days
pub const MIN_REPORT_RANGE_DAYS: u32 = 1;

/// Maximum default report range in days (one leap year)
pub const MAX_REPORT_RANGE_DAYS: u32 = 366;

/// Default report and invoice range in days, ending today
pub const DEFAULT_REPORT_RANGE_DAYS: u32 = 30;
