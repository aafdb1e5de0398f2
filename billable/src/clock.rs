//! Clock and duration utilities
//!
//! Pure functions converting spans to minutes/seconds, rounding money,
//! and mapping calendar dates to instants in a given time zone.
//! Nothing here holds state or reads the system clock.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Length of `[start, end)` in fractional minutes.
pub fn duration_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 60_000.0
}

/// Whole seconds elapsed since `started_at`, never negative.
///
/// Only used for live displays; stored timestamps stay the source of truth.
pub fn elapsed_seconds(started_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - started_at).num_seconds().max(0)
}

/// Unrounded amount billed for `minutes` at `hourly_rate_usd`.
pub fn billed_amount(minutes: f64, hourly_rate_usd: f64) -> f64 {
    if hourly_rate_usd == 0.0 {
        return 0.0;
    }
    (minutes / 60.0) * hourly_rate_usd
}

/// Round to 2 decimal places, half away from zero.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Truncate to 2 decimal places for live on-screen totals.
pub fn truncate_cents(value: f64) -> f64 {
    (value * 100.0).trunc() / 100.0
}

/// Round fractional minutes to the nearest whole minute for display.
pub fn round_minutes(minutes: f64) -> i64 {
    minutes.round() as i64
}

/// Instant at which `day` begins in `tz`.
///
/// Local midnight can be skipped by a DST transition; the first valid
/// minute after it is used then.
pub fn local_midnight<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    let mut cursor = midnight;
    for _ in 0..=120 {
        if let Some(instant) = tz.from_local_datetime(&cursor).earliest() {
            return instant.with_timezone(&Utc);
        }
        cursor += Duration::minutes(1);
    }
    Utc.from_utc_datetime(&midnight)
}

/// Inclusive range of calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The `days` calendar days ending with `today`.
    pub fn last_days(today: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            start: today - Duration::days(span),
            end: today,
        }
    }

    /// A range whose end precedes its start selects nothing.
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// `[start of first day, start of the day after the last)` in `tz`,
    /// or `None` for an empty range.
    pub fn bounds<Tz: TimeZone>(&self, tz: &Tz) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        if self.is_empty() {
            return None;
        }
        let lower = local_midnight(tz, self.start);
        let upper = local_midnight(tz, self.end.succ_opt()?);
        Some((lower, upper))
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}
