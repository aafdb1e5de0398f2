//! Timer service
//!
//! Owns the single running timer of each user. Starting a timer while one
//! runs stops the old one first; stopping materializes an automatic entry.
//! Both happen in one transaction whose first statement removes the current
//! timer row, so concurrent starts for the same user are serialized by the
//! database write lock and every superseded timer yields exactly one entry.

use super::access::{ensure_approved, owned_project, owned_tags, task_in_project};
use crate::clock::elapsed_seconds;
use crate::database::repository::entries::insert_time_entry;
use crate::database::repository::timers::{take_active_timer, upsert_active_timer, NewActiveTimer};
use crate::database::{ActiveTimer, EntrySource, NewTimeEntry, Repository, StartTimerRequest, TimeEntry};
use crate::error::{AppError, Result};
use crate::format::format_duration_with_seconds;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;

/// Snapshot of the running timer for polling displays.
///
/// The elapsed time is cosmetic; the entry duration is computed from the
/// stored start when the timer stops.
#[derive(Debug, Clone, Serialize)]
pub struct TimerStatus {
    pub timer: ActiveTimer,
    pub project_name: Option<String>,
    pub elapsed_seconds: i64,
    pub elapsed_display: String,
}

/// Turn a removed timer row into its automatic entry.
///
/// A timer whose project was deleted, or whose span is not positive, leaves
/// no entry behind.
async fn materialize(
    conn: &mut SqliteConnection,
    timer: &ActiveTimer,
    now: DateTime<Utc>,
) -> Result<Option<TimeEntry>> {
    let Some(project_id) = timer.project_id.clone() else {
        tracing::warn!("Discarding timer {} without a project", timer.id);
        return Ok(None);
    };

    if now <= timer.started_at {
        tracing::warn!(
            "Discarding timer {} with non-positive span (started {}, stopped {})",
            timer.id,
            timer.started_at,
            now
        );
        return Ok(None);
    }

    let new = NewTimeEntry {
        user_id: timer.user_id.clone(),
        project_id,
        task_id: timer.task_id.clone(),
        task_name: timer.task_name.clone(),
        start_time: timer.started_at,
        end_time: now,
        source: EntrySource::Automatic,
        tag_ids: timer.tag_ids.clone(),
    };

    let entry = insert_time_entry(conn, &new).await?;
    Ok(Some(entry))
}

/// Service for starting, stopping and observing timers
#[derive(Clone)]
pub struct TimerService {
    repo: Repository,
}

impl TimerService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Start a timer on a project, stopping any timer already running.
    pub async fn start_timer(&self, user_id: &str, req: StartTimerRequest) -> Result<ActiveTimer> {
        self.start(user_id, req, None).await
    }

    /// [`Self::start_timer`] with an explicit start instant
    pub async fn start_timer_at(
        &self,
        user_id: &str,
        req: StartTimerRequest,
        now: DateTime<Utc>,
    ) -> Result<ActiveTimer> {
        self.start(user_id, req, Some(now)).await
    }

    async fn start(
        &self,
        user_id: &str,
        req: StartTimerRequest,
        now: Option<DateTime<Utc>>,
    ) -> Result<ActiveTimer> {
        ensure_approved(&self.repo, user_id).await?;

        let project = match owned_project(&self.repo, user_id, &req.project_id).await {
            Ok(project) => project,
            Err(AppError::NotFound { .. } | AppError::Authorization(_)) => {
                return Err(AppError::validation(format!(
                    "invalid project {}",
                    req.project_id
                )))
            }
            Err(e) => return Err(e),
        };

        let task = match &req.task_id {
            Some(task_id) => Some(task_in_project(&self.repo, task_id, &project.id).await?),
            None => None,
        };

        let tag_ids = match (req.tag_ids, &task) {
            (Some(explicit), _) => explicit,
            (None, Some(task)) => self.repo.task_tag_ids(&task.id).await?,
            (None, None) => Vec::new(),
        };
        owned_tags(&self.repo, user_id, &tag_ids).await?;

        let task_name = req.task_name.filter(|name| !name.trim().is_empty());

        let mut tx = self.repo.begin().await?;

        // Takes the write lock; the clock is read only once it is held
        let previous = take_active_timer(&mut *tx, user_id).await?;
        let now = now.unwrap_or_else(Utc::now);

        let stopped = match &previous {
            Some(timer) => materialize(&mut *tx, timer, now).await?,
            None => None,
        };

        let timer = upsert_active_timer(
            &mut *tx,
            &NewActiveTimer {
                user_id,
                project_id: &project.id,
                task_id: req.task_id.as_deref(),
                task_name: task_name.as_deref(),
                started_at: now,
                tag_ids: &tag_ids,
            },
        )
        .await?;

        tx.commit().await?;

        if let Some(entry) = stopped {
            tracing::info!(
                "Stopped previous timer into entry {} ({:.1} min)",
                entry.id,
                entry.duration_minutes()
            );
        }
        tracing::info!("Timer started on project {} for user {}", project.name, user_id);

        Ok(timer)
    }

    /// Stop the running timer.
    ///
    /// Returns `None` when nothing was running, so stopping twice is harmless.
    pub async fn stop_timer(&self, user_id: &str) -> Result<Option<TimeEntry>> {
        self.stop(user_id, None).await
    }

    /// [`Self::stop_timer`] with an explicit stop instant
    pub async fn stop_timer_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<TimeEntry>> {
        self.stop(user_id, Some(now)).await
    }

    async fn stop(&self, user_id: &str, now: Option<DateTime<Utc>>) -> Result<Option<TimeEntry>> {
        ensure_approved(&self.repo, user_id).await?;

        let mut tx = self.repo.begin().await?;

        let Some(timer) = take_active_timer(&mut *tx, user_id).await? else {
            tracing::debug!("No running timer for user {}", user_id);
            return Ok(None);
        };
        let now = now.unwrap_or_else(Utc::now);

        let entry = materialize(&mut *tx, &timer, now).await?;
        tx.commit().await?;

        match &entry {
            Some(entry) => tracing::info!(
                "Timer stopped into entry {} ({:.1} min)",
                entry.id,
                entry.duration_minutes()
            ),
            None => tracing::info!("Timer {} removed without an entry", timer.id),
        }

        Ok(entry)
    }

    /// The running timer, if any
    pub async fn get_active_timer(&self, user_id: &str) -> Result<Option<ActiveTimer>> {
        self.repo.get_active_timer(user_id).await
    }

    /// Read-refresh view for polling callers
    pub async fn status(&self, user_id: &str, now: DateTime<Utc>) -> Result<Option<TimerStatus>> {
        let Some(timer) = self.repo.get_active_timer(user_id).await? else {
            return Ok(None);
        };

        let project_name = match &timer.project_id {
            Some(project_id) => match self.repo.get_project(project_id).await {
                Ok(project) => Some(project.name),
                Err(AppError::NotFound { .. }) => None,
                Err(e) => return Err(e),
            },
            None => None,
        };

        let elapsed = elapsed_seconds(timer.started_at, now);
        Ok(Some(TimerStatus {
            timer,
            project_name,
            elapsed_seconds: elapsed,
            elapsed_display: format_duration_with_seconds(elapsed),
        }))
    }
}
