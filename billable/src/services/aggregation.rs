//! Aggregation engine
//!
//! Pure functions over completed entries: totals, dense time-bucket series
//! for charts, and groupings by task, tag, project and calendar day.
//! Minutes are summed unrounded; rounding is left to presentation.
//!
//! Calendar boundaries are the local wall-clock dates of the supplied time
//! zone. An entry belongs to the bucket containing its local start date.

use crate::clock::{billed_amount, DateRange};
use crate::config::{
    DAY_BUCKETS, MONTH_BUCKETS, NO_TASK_LABEL, TOP_TASKS_LIMIT, UNTAGGED_LABEL, WEEK_BUCKETS,
    YEAR_BUCKETS,
};
use crate::database::BillableEntry;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Width of a statistics bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    /// Number of buckets in the lookback window
    pub fn bucket_count(self) -> u32 {
        match self {
            Granularity::Day => DAY_BUCKETS,
            Granularity::Week => WEEK_BUCKETS,
            Granularity::Month => MONTH_BUCKETS,
            Granularity::Year => YEAR_BUCKETS,
        }
    }

    /// Start of the bucket containing `day`
    pub fn floor(self, day: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => day,
            Granularity::Week => day - Duration::days(i64::from(day.weekday().num_days_from_monday())),
            Granularity::Month => day.with_day(1).unwrap_or(day),
            Granularity::Year => day.with_ordinal(1).unwrap_or(day),
        }
    }

    /// Start of the bucket `n` steps before the one starting at `start`
    fn step_back(self, start: NaiveDate, n: u32) -> Option<NaiveDate> {
        match self {
            Granularity::Day => start.checked_sub_signed(Duration::days(i64::from(n))),
            Granularity::Week => start.checked_sub_signed(Duration::weeks(i64::from(n))),
            Granularity::Month => start.checked_sub_months(Months::new(n)),
            Granularity::Year => start.checked_sub_months(Months::new(n.checked_mul(12)?)),
        }
    }

    /// Axis label of a bucket starting at `start`
    pub fn label(self, start: NaiveDate) -> String {
        match self {
            Granularity::Day => start.format("%b %-d").to_string(),
            Granularity::Week => start.format("Week of %b %-d").to_string(),
            Granularity::Month => start.format("%b %Y").to_string(),
            Granularity::Year => start.format("%Y").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
        };
        f.write_str(name)
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Granularity::Day),
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            "year" => Ok(Granularity::Year),
            other => Err(format!("unknown granularity: {other} (expected day, week, month or year)")),
        }
    }
}

/// Sum over a set of entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Totals {
    pub minutes: f64,
    pub amount_usd: f64,
    pub entry_count: usize,
}

impl Totals {
    fn add(&mut self, entry: &BillableEntry) {
        let minutes = entry.duration_minutes();
        self.minutes += minutes;
        self.amount_usd += billed_amount(minutes, entry.hourly_rate_usd);
        self.entry_count += 1;
    }
}

/// One point of a dense statistics series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub start: NaiveDate,
    pub label: String,
    pub minutes: f64,
    pub amount_usd: f64,
}

/// Named group total (task or tag)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotal {
    pub label: String,
    /// Display color for tag groups
    pub color: Option<String>,
    pub minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectTotal {
    pub project_id: String,
    pub project_name: String,
    pub minutes: f64,
    pub amount_usd: f64,
}

/// Calendar day cell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTotal {
    pub day: NaiveDate,
    pub minutes: f64,
    pub amount_usd: f64,
    pub entry_count: usize,
}

fn local_date<Tz: TimeZone>(instant: &DateTime<chrono::Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

fn by_minutes_desc(a_minutes: f64, a_label: &str, b_minutes: f64, b_label: &str) -> Ordering {
    b_minutes
        .total_cmp(&a_minutes)
        .then_with(|| a_label.cmp(b_label))
}

pub fn totals(entries: &[BillableEntry]) -> Totals {
    let mut totals = Totals::default();
    for entry in entries {
        totals.add(entry);
    }
    totals
}

/// Bucket starts of the lookback window ending with the bucket of `today`,
/// oldest first
pub fn bucket_starts(granularity: Granularity, today: NaiveDate) -> Vec<NaiveDate> {
    let current = granularity.floor(today);
    (0..granularity.bucket_count())
        .rev()
        .filter_map(|n| granularity.step_back(current, n))
        .collect()
}

/// Dense, zero-filled series anchored at `now`.
///
/// Each bucket covers `[start, next start)` and the last one is open-ended.
/// Entries starting before the first bucket are left out of the series.
pub fn bucket_series<Tz: TimeZone>(
    entries: &[BillableEntry],
    granularity: Granularity,
    now: &DateTime<Tz>,
) -> Vec<Bucket> {
    let tz = now.timezone();
    let starts = bucket_starts(granularity, now.date_naive());

    let mut buckets: Vec<Bucket> = starts
        .iter()
        .map(|start| Bucket {
            start: *start,
            label: granularity.label(*start),
            minutes: 0.0,
            amount_usd: 0.0,
        })
        .collect();

    for entry in entries {
        let day = local_date(&entry.start_time, &tz);
        let index = starts.partition_point(|start| *start <= day);
        if index == 0 {
            continue;
        }
        let minutes = entry.duration_minutes();
        let bucket = &mut buckets[index - 1];
        bucket.minutes += minutes;
        bucket.amount_usd += billed_amount(minutes, entry.hourly_rate_usd);
    }

    buckets
}

/// Label of an entry when grouped by task: its ad-hoc name, else the
/// referenced task's name, else a placeholder
pub fn task_label(entry: &BillableEntry) -> &str {
    entry
        .task_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .or(entry.task_title.as_deref())
        .unwrap_or(NO_TASK_LABEL)
}

/// Largest task groups first, at most [`TOP_TASKS_LIMIT`]
pub fn by_task(entries: &[BillableEntry]) -> Vec<GroupTotal> {
    let mut groups: HashMap<&str, f64> = HashMap::new();
    for entry in entries {
        *groups.entry(task_label(entry)).or_default() += entry.duration_minutes();
    }

    let mut totals: Vec<GroupTotal> = groups
        .into_iter()
        .map(|(label, minutes)| GroupTotal {
            label: label.to_string(),
            color: None,
            minutes,
        })
        .collect();
    totals.sort_by(|a, b| by_minutes_desc(a.minutes, &a.label, b.minutes, &b.label));
    totals.truncate(TOP_TASKS_LIMIT);
    totals
}

/// Every tag of an entry receives the entry's full duration; entries
/// without tags count towards "Untagged"
pub fn by_tag(entries: &[BillableEntry]) -> Vec<GroupTotal> {
    let mut groups: HashMap<Option<&str>, GroupTotal> = HashMap::new();

    for entry in entries {
        let minutes = entry.duration_minutes();
        if entry.tags.is_empty() {
            groups
                .entry(None)
                .or_insert_with(|| GroupTotal {
                    label: UNTAGGED_LABEL.to_string(),
                    color: None,
                    minutes: 0.0,
                })
                .minutes += minutes;
            continue;
        }
        for tag in &entry.tags {
            groups
                .entry(Some(tag.tag_id.as_str()))
                .or_insert_with(|| GroupTotal {
                    label: tag.name.clone(),
                    color: Some(tag.color.clone()),
                    minutes: 0.0,
                })
                .minutes += minutes;
        }
    }

    let mut totals: Vec<GroupTotal> = groups.into_values().collect();
    totals.sort_by(|a, b| by_minutes_desc(a.minutes, &a.label, b.minutes, &b.label));
    totals
}

/// Projects with tracked time, largest first
pub fn by_project(entries: &[BillableEntry]) -> Vec<ProjectTotal> {
    let mut groups: HashMap<&str, ProjectTotal> = HashMap::new();
    for entry in entries {
        let minutes = entry.duration_minutes();
        let total = groups
            .entry(entry.project_id.as_str())
            .or_insert_with(|| ProjectTotal {
                project_id: entry.project_id.clone(),
                project_name: entry.project_name.clone(),
                minutes: 0.0,
                amount_usd: 0.0,
            });
        total.minutes += minutes;
        total.amount_usd += billed_amount(minutes, entry.hourly_rate_usd);
    }

    let mut totals: Vec<ProjectTotal> = groups
        .into_values()
        .filter(|total| total.minutes > 0.0)
        .collect();
    totals.sort_by(|a, b| by_minutes_desc(a.minutes, &a.project_name, b.minutes, &b.project_name));
    totals
}

/// One cell per day of `range`, including empty days. An inverted range
/// yields no cells.
pub fn by_day<Tz: TimeZone>(entries: &[BillableEntry], range: DateRange, tz: &Tz) -> Vec<DayTotal> {
    let mut days: Vec<DayTotal> = range
        .days()
        .map(|day| DayTotal {
            day,
            minutes: 0.0,
            amount_usd: 0.0,
            entry_count: 0,
        })
        .collect();

    for entry in entries {
        let day = local_date(&entry.start_time, tz);
        if !range.contains(day) {
            continue;
        }
        let index = (day - range.start).num_days() as usize;
        if let Some(cell) = days.get_mut(index) {
            let minutes = entry.duration_minutes();
            cell.minutes += minutes;
            cell.amount_usd += billed_amount(minutes, entry.hourly_rate_usd);
            cell.entry_count += 1;
        }
    }

    days
}

/// Days of the calendar month containing `year`/`month`
pub fn month_range(year: i32, month: u32) -> Option<DateRange> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    Some(DateRange::new(first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{EntrySource, EntryTag};
    use chrono::Utc;

    fn entry(id: &str, start: DateTime<Utc>, minutes: i64) -> BillableEntry {
        BillableEntry {
            id: id.to_string(),
            project_id: "p1".to_string(),
            project_name: "Fence".to_string(),
            client_id: "c1".to_string(),
            hourly_rate_usd: 60.0,
            task_id: None,
            task_name: None,
            task_title: None,
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            source: EntrySource::Manual,
            tags: Vec::new(),
        }
    }

    fn tag(entry_id: &str, tag_id: &str, name: &str) -> EntryTag {
        EntryTag {
            time_entry_id: entry_id.to_string(),
            tag_id: tag_id.to_string(),
            name: name.to_string(),
            color: "#000000".to_string(),
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_input_aggregates_to_zero() {
        let now = utc(2026, 3, 18, 12);
        assert_eq!(totals(&[]), Totals::default());

        let series = bucket_series(&[], Granularity::Week, &now);
        assert_eq!(series.len(), 12);
        assert!(series.iter().all(|b| b.minutes == 0.0 && b.amount_usd == 0.0));
        assert!(by_task(&[]).is_empty());
        assert!(by_tag(&[]).is_empty());
        assert!(by_project(&[]).is_empty());
    }

    #[test]
    fn test_bucket_starts_per_granularity() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 18).unwrap(); // a Wednesday

        let days = bucket_starts(Granularity::Day, today);
        assert_eq!(days.len(), 30);
        assert_eq!(days[29], today);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2026, 2, 17).unwrap());

        let weeks = bucket_starts(Granularity::Week, today);
        assert_eq!(weeks.len(), 12);
        assert_eq!(weeks[11], NaiveDate::from_ymd_opt(2026, 3, 16).unwrap());
        assert!(weeks.iter().all(|w| w.weekday() == chrono::Weekday::Mon));

        let months = bucket_starts(Granularity::Month, today);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0], NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert_eq!(months[11], NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());

        let years = bucket_starts(Granularity::Year, today);
        assert_eq!(years.len(), 5);
        assert_eq!(years[0], NaiveDate::from_ymd_opt(2022, 1, 1).unwrap());
    }

    #[test]
    fn test_labels() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(Granularity::Day.label(day), "Mar 2");
        assert_eq!(Granularity::Week.label(day), "Week of Mar 2");
        assert_eq!(Granularity::Month.label(day), "Mar 2026");
        assert_eq!(Granularity::Year.label(day), "2026");
    }

    #[test]
    fn test_series_total_matches_unbucketed_total_minus_early_entries() {
        let now = utc(2026, 3, 18, 12);
        let entries = vec![
            entry("old", utc(2020, 6, 1, 9), 45),
            entry("a", utc(2025, 4, 1, 0), 30),
            entry("b", utc(2026, 1, 15, 9), 90),
            entry("c", utc(2026, 3, 18, 11), 20),
        ];
        let total = totals(&entries).minutes;
        assert_eq!(total, 185.0);

        for granularity in [
            Granularity::Day,
            Granularity::Week,
            Granularity::Month,
            Granularity::Year,
        ] {
            let series = bucket_series(&entries, granularity, &now);
            let first = series[0].start;
            let early: f64 = entries
                .iter()
                .filter(|e| e.start_time.date_naive() < first)
                .map(|e| e.duration_minutes())
                .sum();
            let bucketed: f64 = series.iter().map(|b| b.minutes).sum();
            assert_eq!(bucketed, total - early, "granularity {granularity}");
        }

        let months = bucket_series(&entries, Granularity::Month, &now);
        assert_eq!(months[0].minutes, 30.0);
        assert_eq!(months[9].minutes, 90.0);
        assert_eq!(months[9].amount_usd, 90.0);
        assert_eq!(months[11].minutes, 20.0);
    }

    #[test]
    fn test_last_bucket_is_open_ended() {
        let now = utc(2026, 3, 18, 12);
        let future = entry("f", utc(2026, 3, 25, 9), 60);
        let series = bucket_series(&[future], Granularity::Day, &now);
        assert_eq!(series[29].minutes, 60.0);
    }

    #[test]
    fn test_bucket_assignment_uses_local_date() {
        let tz = chrono::FixedOffset::west_opt(5 * 3600).unwrap();
        let now = utc(2026, 3, 18, 12).with_timezone(&tz);
        // 02:00 UTC on the 18th is still the 17th five hours west
        let late = entry("late", utc(2026, 3, 18, 2), 60);
        let series = bucket_series(&[late], Granularity::Day, &now);
        assert_eq!(series[28].minutes, 60.0);
        assert_eq!(series[29].minutes, 0.0);
    }

    #[test]
    fn test_task_label_fallback_order() {
        let mut e = entry("a", utc(2026, 3, 2, 9), 10);
        assert_eq!(task_label(&e), NO_TASK_LABEL);
        e.task_title = Some("Posts".to_string());
        assert_eq!(task_label(&e), "Posts");
        e.task_name = Some("Call with client".to_string());
        assert_eq!(task_label(&e), "Call with client");
    }

    #[test]
    fn test_by_task_keeps_top_ten_descending() {
        let entries: Vec<BillableEntry> = (0..12)
            .map(|i| {
                let mut e = entry(&format!("e{i}"), utc(2026, 3, 2, 9), 10 + i);
                e.task_name = Some(format!("task {i:02}"));
                e
            })
            .collect();

        let groups = by_task(&entries);
        assert_eq!(groups.len(), TOP_TASKS_LIMIT);
        assert_eq!(groups[0].label, "task 11");
        assert_eq!(groups[0].minutes, 21.0);
        assert!(groups.windows(2).all(|w| w[0].minutes >= w[1].minutes));
    }

    #[test]
    fn test_tag_fan_out_counts_full_duration() {
        let mut both = entry("both", utc(2026, 3, 2, 9), 60);
        both.tags = vec![tag("both", "ta", "A"), tag("both", "tb", "B")];
        let plain = entry("plain", utc(2026, 3, 2, 11), 15);

        let groups = by_tag(&[both, plain]);
        let find = |label: &str| groups.iter().find(|g| g.label == label).map(|g| g.minutes);

        assert_eq!(find("A"), Some(60.0));
        assert_eq!(find("B"), Some(60.0));
        assert_eq!(find(UNTAGGED_LABEL), Some(15.0));
        assert_eq!(groups.iter().map(|g| g.minutes).sum::<f64>(), 135.0);
    }

    #[test]
    fn test_by_project_sorted_descending() {
        let mut other = entry("o", utc(2026, 3, 2, 9), 120);
        other.project_id = "p2".to_string();
        other.project_name = "Barn".to_string();
        other.hourly_rate_usd = 0.0;
        let entries = vec![entry("a", utc(2026, 3, 2, 9), 30), other];

        let projects = by_project(&entries);
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].project_name, "Barn");
        assert_eq!(projects[0].amount_usd, 0.0);
        assert_eq!(projects[1].amount_usd, 30.0);
    }

    #[test]
    fn test_by_day_is_gap_filled() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
        );
        let entries = vec![
            entry("a", utc(2026, 3, 2, 9), 30),
            entry("b", utc(2026, 3, 2, 14), 30),
            entry("out", utc(2026, 3, 9, 9), 30),
        ];

        let days = by_day(&entries, range, &Utc);
        assert_eq!(days.len(), 4);
        assert_eq!(days[1].minutes, 60.0);
        assert_eq!(days[1].entry_count, 2);
        assert_eq!(days[0].minutes, 0.0);

        let inverted = DateRange::new(range.end, range.start);
        assert!(by_day(&entries, inverted, &Utc).is_empty());
    }

    #[test]
    fn test_month_range() {
        let feb = month_range(2028, 2).unwrap();
        assert_eq!(feb.end, NaiveDate::from_ymd_opt(2028, 2, 29).unwrap());
        assert!(month_range(2026, 13).is_none());
    }

    #[test]
    fn test_granularity_parsing() {
        assert_eq!("Week".parse::<Granularity>(), Ok(Granularity::Week));
        assert!("fortnight".parse::<Granularity>().is_err());
    }
}
