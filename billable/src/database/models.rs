//! Database models
//!
//! Rust structs representing database entities and the request types
//! the services accept. All models use serde for serialization.

use crate::clock::duration_minutes;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// An account; only approved users may write
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Billing counterparty
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub hourly_rate_usd: f64,
    /// External user granted read-only portal access
    pub invited_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub hourly_rate_usd: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub hourly_rate_usd: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub client_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kanban lifecycle of a task. `Done` is the only completed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum TaskStatus {
    Backlog,
    Todo,
    Progress,
    Done,
}

impl TaskStatus {
    pub fn is_completed(self) -> bool {
        self == TaskStatus::Done
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "backlog" => Ok(TaskStatus::Backlog),
            "todo" => Ok(TaskStatus::Todo),
            "progress" => Ok(TaskStatus::Progress),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub status: TaskStatus,
    pub description: Option<String>,
    pub assignee_id: Option<String>,
    /// Sequential per project, starting at 1
    pub task_number: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Legacy boolean view of the status
    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTaskRequest {
    pub name: String,
    pub description: Option<String>,
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
}

/// Task edit; `Some(None)` clears an optional field
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub assignee_id: Option<Option<String>>,
    pub status: Option<TaskStatus>,
}

/// User-scoped label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

/// How a time entry came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum EntrySource {
    /// Materialized by stopping a running timer
    Automatic,
    /// Entered with explicit bounds
    Manual,
    /// Automatic entry whose bounds were edited afterwards
    Corrected,
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntrySource::Automatic => "automatic",
            EntrySource::Manual => "manual",
            EntrySource::Corrected => "corrected",
        };
        f.write_str(name)
    }
}

/// A completed span of tracked time
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TimeEntry {
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    pub task_id: Option<String>,
    /// Ad-hoc description, preferred over the referenced task's name
    pub task_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub source: EntrySource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    pub fn duration_minutes(&self) -> f64 {
        duration_minutes(self.start_time, self.end_time)
    }
}

/// Insert payload for a time entry, validated by the ledger before use
#[derive(Debug, Clone)]
pub struct NewTimeEntry {
    pub user_id: String,
    pub project_id: String,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub source: EntrySource,
    pub tag_ids: Vec<String>,
}

/// Directly authored entry
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEntryRequest {
    pub project_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    #[serde(default)]
    pub tag_ids: Vec<String>,
    /// Defaults to [`EntrySource::Manual`]
    #[serde(default)]
    pub source: Option<EntrySource>,
}

/// Partial update of an entry.
///
/// `Some(None)` clears an optional field; `tag_ids` replaces the whole set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEntryRequest {
    #[serde(default)]
    pub task_id: Option<Option<String>>,
    #[serde(default)]
    pub task_name: Option<Option<String>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub tag_ids: Option<Vec<String>>,
}

/// Entry listing filter; the owning user is always implied
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub project_id: Option<String>,
    pub client_id: Option<String>,
    /// Half-open `[lower, upper)` overlap window
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

/// The single in-progress span of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveTimer {
    pub id: String,
    pub user_id: String,
    /// `None` once the project was deleted under a running timer
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Tags applied to the entry when the timer stops
    pub tag_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Storage shape of [`ActiveTimer`]; tag ids are a JSON array
#[derive(Debug, FromRow)]
pub(crate) struct ActiveTimerRow {
    pub id: String,
    pub user_id: String,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub tag_ids: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ActiveTimerRow> for ActiveTimer {
    type Error = serde_json::Error;

    fn try_from(row: ActiveTimerRow) -> Result<Self, Self::Error> {
        Ok(ActiveTimer {
            tag_ids: serde_json::from_str(&row.tag_ids)?,
            id: row.id,
            user_id: row.user_id,
            project_id: row.project_id,
            task_id: row.task_id,
            task_name: row.task_name,
            started_at: row.started_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartTimerRequest {
    pub project_id: String,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    /// Explicit tag snapshot; `None` copies the task's tags
    pub tag_ids: Option<Vec<String>>,
}

/// Immutable billing snapshot of a project and period
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_minutes: f64,
    pub amount_usd: f64,
    pub is_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Completed entry joined with what billing and grouping need
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BillableEntry {
    pub id: String,
    pub project_id: String,
    pub project_name: String,
    pub client_id: String,
    pub hourly_rate_usd: f64,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    /// Name of the referenced task, if it still exists
    pub task_title: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub source: EntrySource,
    #[sqlx(skip)]
    pub tags: Vec<EntryTag>,
}

impl BillableEntry {
    pub fn duration_minutes(&self) -> f64 {
        duration_minutes(self.start_time, self.end_time)
    }
}

/// Tag attached to an entry, flattened for grouping
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct EntryTag {
    pub time_entry_id: String,
    pub tag_id: String,
    pub name: String,
    pub color: String,
}
