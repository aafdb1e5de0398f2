//! Presentation formatters consumed by the UI layer

use crate::config::{DEFAULT_TASK_PREFIX, TASK_NUMBER_WIDTH, TASK_PREFIX_LEN};

/// "1h 30m", "45m", "2h". Zero components are omitted; zero minutes is "0m".
pub fn format_duration(minutes: i64) -> String {
    let minutes = minutes.max(0);
    let h = minutes / 60;
    let m = minutes % 60;
    if h == 0 {
        return format!("{m}m");
    }
    if m == 0 {
        return format!("{h}h");
    }
    format!("{h}h {m}m")
}

/// Live ticking display. Seconds are always shown; minutes are kept once
/// hours are shown ("1h 0m 5s").
pub fn format_duration_with_seconds(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    let s = total_seconds % 60;

    let mut parts = Vec::with_capacity(3);
    if h > 0 {
        parts.push(format!("{h}h"));
    }
    if m > 0 || h > 0 {
        parts.push(format!("{m}m"));
    }
    parts.push(format!("{s}s"));
    parts.join(" ")
}

/// USD with thousands separators: "$1,234.50", "-$3.00".
pub fn format_currency(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    let dollars = (cents / 100).to_string();

    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, digit) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}${grouped}.{:02}", cents % 100)
}

/// First letters of the project name, uppercased ("Fenceworkshop" -> "FENC").
pub fn project_prefix(project_name: &str) -> String {
    let letters: String = project_name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(TASK_PREFIX_LEN)
        .collect::<String>()
        .to_ascii_uppercase();

    if letters.is_empty() {
        DEFAULT_TASK_PREFIX.to_string()
    } else {
        letters
    }
}

/// "FENC-007", or "FENC-???" while the task has no number.
pub fn task_identifier(task_number: Option<i64>, project_name: &str) -> String {
    let prefix = project_prefix(project_name);
    match task_number {
        Some(number) => format!("{prefix}-{number:0width$}", width = TASK_NUMBER_WIDTH),
        None => format!("{prefix}-???"),
    }
}
