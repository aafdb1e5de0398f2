//! Report service
//!
//! Loads billable entries for the acting user and feeds them through the
//! aggregation engine.

use super::access::{owned_client, owned_project};
use super::aggregation::{self, Bucket, DayTotal, GroupTotal, Granularity, ProjectTotal, Totals};
use crate::clock::DateRange;
use crate::database::{BillableEntry, Client, EntryFilter, Project, Repository};
use crate::error::{AppError, Result};
use chrono::{DateTime, TimeZone};
use serde::Serialize;

/// Optional narrowing of statistics and summaries
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub client_id: Option<String>,
    pub project_id: Option<String>,
}

/// Earnings over the lookback window of a granularity
#[derive(Debug, Clone, Serialize)]
pub struct EarningsStatistics {
    pub granularity: Granularity,
    /// All matching entries, including those older than the first bucket
    pub totals: Totals,
    pub buckets: Vec<Bucket>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectReport {
    pub project: Project,
    pub client: Client,
    pub range: DateRange,
    pub totals: Totals,
    pub by_day: Vec<DayTotal>,
    pub by_task: Vec<GroupTotal>,
    pub by_tag: Vec<GroupTotal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub range: DateRange,
    pub totals: Totals,
    pub projects: Vec<ProjectTotal>,
}

/// Service producing statistics and reports
#[derive(Clone)]
pub struct ReportService {
    repo: Repository,
}

impl ReportService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    async fn load(
        &self,
        user_id: &str,
        filter: &ReportFilter,
        window: Option<(DateTime<chrono::Utc>, DateTime<chrono::Utc>)>,
    ) -> Result<Vec<BillableEntry>> {
        if let Some(client_id) = &filter.client_id {
            owned_client(&self.repo, user_id, client_id).await?;
        }
        if let Some(project_id) = &filter.project_id {
            owned_project(&self.repo, user_id, project_id).await?;
        }

        let filter = EntryFilter {
            project_id: filter.project_id.clone(),
            client_id: filter.client_id.clone(),
            window,
        };
        self.repo.list_billable_entries(user_id, &filter).await
    }

    /// Totals and the dense bucket series ending at `now`
    pub async fn earnings_statistics<Tz: TimeZone>(
        &self,
        user_id: &str,
        granularity: Granularity,
        filter: &ReportFilter,
        now: &DateTime<Tz>,
    ) -> Result<EarningsStatistics> {
        let entries = self.load(user_id, filter, None).await?;

        Ok(EarningsStatistics {
            granularity,
            totals: aggregation::totals(&entries),
            buckets: aggregation::bucket_series(&entries, granularity, now),
        })
    }

    /// Totals, daily series and task/tag breakdowns of one project over
    /// the local calendar days of `range`
    pub async fn project_report<Tz: TimeZone>(
        &self,
        user_id: &str,
        project_id: &str,
        range: DateRange,
        tz: &Tz,
    ) -> Result<ProjectReport> {
        let project = owned_project(&self.repo, user_id, project_id).await?;
        let client = self.repo.get_client(&project.client_id).await?;

        let entries = match range.bounds(tz) {
            Some(window) => {
                let filter = EntryFilter {
                    project_id: Some(project.id.clone()),
                    client_id: None,
                    window: Some(window),
                };
                self.repo.list_billable_entries(user_id, &filter).await?
            }
            None => Vec::new(),
        };

        Ok(ProjectReport {
            totals: aggregation::totals(&entries),
            by_day: aggregation::by_day(&entries, range, tz),
            by_task: aggregation::by_task(&entries),
            by_tag: aggregation::by_tag(&entries),
            project,
            client,
            range,
        })
    }

    /// Per-project totals across the user's projects
    pub async fn summary<Tz: TimeZone>(
        &self,
        user_id: &str,
        filter: &ReportFilter,
        range: DateRange,
        tz: &Tz,
    ) -> Result<Summary> {
        let entries = match range.bounds(tz) {
            Some(window) => self.load(user_id, filter, Some(window)).await?,
            None => Vec::new(),
        };

        Ok(Summary {
            range,
            totals: aggregation::totals(&entries),
            projects: aggregation::by_project(&entries),
        })
    }

    /// Per-day cells of a calendar month
    pub async fn calendar_month<Tz: TimeZone>(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
        filter: &ReportFilter,
        tz: &Tz,
    ) -> Result<Vec<DayTotal>> {
        let range = aggregation::month_range(year, month)
            .ok_or_else(|| AppError::validation(format!("invalid month {year}-{month:02}")))?;

        let Some(window) = range.bounds(tz) else {
            return Ok(Vec::new());
        };
        let entries = self.load(user_id, filter, Some(window)).await?;
        Ok(aggregation::by_day(&entries, range, tz))
    }
}
