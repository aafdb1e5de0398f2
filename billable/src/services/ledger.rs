//! Time entry ledger
//!
//! Completed spans of tracked time with their provenance. Entries are
//! created directly (manual) or by the timer (automatic); editing the bounds
//! of an automatic entry turns it into a corrected one.

use super::access::{ensure_approved, owned_entry, owned_project, owned_tags, task_in_project};
use crate::clock::DateRange;
use crate::database::{
    CreateEntryRequest, EntryFilter, EntrySource, NewTimeEntry, Repository, TimeEntry,
    UpdateEntryRequest,
};
use crate::error::{AppError, Result};
use chrono::{DateTime, TimeZone, Utc};

/// `end > start` strictly; zero-length spans are rejected too
pub(crate) fn validate_bounds(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end <= start {
        return Err(AppError::validation("end before start"));
    }
    Ok(())
}

/// Service for the completed time entries of a user
#[derive(Clone)]
pub struct LedgerService {
    repo: Repository,
}

impl LedgerService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Record a span with explicit bounds
    pub async fn create_entry(&self, user_id: &str, req: CreateEntryRequest) -> Result<TimeEntry> {
        ensure_approved(&self.repo, user_id).await?;
        validate_bounds(req.start_time, req.end_time)?;
        owned_project(&self.repo, user_id, &req.project_id).await?;
        if let Some(task_id) = &req.task_id {
            task_in_project(&self.repo, task_id, &req.project_id).await?;
        }
        owned_tags(&self.repo, user_id, &req.tag_ids).await?;

        let new = NewTimeEntry {
            user_id: user_id.to_string(),
            project_id: req.project_id,
            task_id: req.task_id,
            task_name: req.task_name.filter(|name| !name.trim().is_empty()),
            start_time: req.start_time,
            end_time: req.end_time,
            source: req.source.unwrap_or(EntrySource::Manual),
            tag_ids: req.tag_ids,
        };

        let entry = self.repo.create_time_entry(&new).await?;
        tracing::info!(
            "Time entry created: {} ({:.1} min, {})",
            entry.id,
            entry.duration_minutes(),
            entry.source
        );
        Ok(entry)
    }

    pub async fn get_entry(&self, user_id: &str, entry_id: &str) -> Result<TimeEntry> {
        owned_entry(&self.repo, user_id, entry_id).await
    }

    /// Apply a partial update.
    ///
    /// Moving either bound of an automatic entry marks it corrected. Tags,
    /// when given, replace the current set.
    pub async fn update_entry(
        &self,
        user_id: &str,
        entry_id: &str,
        patch: UpdateEntryRequest,
    ) -> Result<TimeEntry> {
        ensure_approved(&self.repo, user_id).await?;
        let current = owned_entry(&self.repo, user_id, entry_id).await?;

        let start_time = patch.start_time.unwrap_or(current.start_time);
        let end_time = patch.end_time.unwrap_or(current.end_time);
        validate_bounds(start_time, end_time)?;

        if let Some(Some(task_id)) = &patch.task_id {
            task_in_project(&self.repo, task_id, &current.project_id).await?;
        }
        if let Some(tag_ids) = &patch.tag_ids {
            owned_tags(&self.repo, user_id, tag_ids).await?;
        }

        let bounds_changed = start_time != current.start_time || end_time != current.end_time;
        let source = if bounds_changed && current.source == EntrySource::Automatic {
            EntrySource::Corrected
        } else {
            current.source
        };

        let updated = TimeEntry {
            task_id: patch.task_id.unwrap_or(current.task_id.clone()),
            task_name: patch.task_name.unwrap_or(current.task_name.clone()),
            start_time,
            end_time,
            source,
            ..current
        };

        let saved = self
            .repo
            .save_time_entry(&updated, patch.tag_ids.as_deref())
            .await?;

        tracing::debug!("Time entry updated: {} (source {})", saved.id, saved.source);
        Ok(saved)
    }

    /// Irreversible; invoices already generated are unaffected
    pub async fn delete_entry(&self, user_id: &str, entry_id: &str) -> Result<()> {
        ensure_approved(&self.repo, user_id).await?;
        owned_entry(&self.repo, user_id, entry_id).await?;

        self.repo.delete_time_entry(entry_id).await?;
        tracing::info!("Time entry deleted: {}", entry_id);
        Ok(())
    }

    /// Completed entries of the user, newest first
    pub async fn list_entries(&self, user_id: &str, filter: &EntryFilter) -> Result<Vec<TimeEntry>> {
        self.repo.list_time_entries(user_id, filter).await
    }

    /// Entries overlapping the local calendar days of `range`
    pub async fn list_entries_in_range<Tz: TimeZone>(
        &self,
        user_id: &str,
        mut filter: EntryFilter,
        range: DateRange,
        tz: &Tz,
    ) -> Result<Vec<TimeEntry>> {
        let Some(window) = range.bounds(tz) else {
            return Ok(Vec::new());
        };
        filter.window = Some(window);
        self.repo.list_time_entries(user_id, &filter).await
    }

    pub async fn entry_tag_ids(&self, user_id: &str, entry_id: &str) -> Result<Vec<String>> {
        owned_entry(&self.repo, user_id, entry_id).await?;
        self.repo.entry_tag_ids(entry_id).await
    }
}
