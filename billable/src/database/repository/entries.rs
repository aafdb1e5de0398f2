//! Time entries and their tag associations

use super::Repository;
use crate::database::models::*;
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use uuid::Uuid;

/// Insert an entry and its tag links on an open connection.
///
/// Callers validate bounds and ownership first.
pub(crate) async fn insert_time_entry(
    conn: &mut SqliteConnection,
    new: &NewTimeEntry,
) -> Result<TimeEntry> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    let entry = sqlx::query_as::<_, TimeEntry>(
        r#"
        INSERT INTO time_entries
            (id, user_id, project_id, task_id, task_name, start_time, end_time, source, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&id)
    .bind(&new.user_id)
    .bind(&new.project_id)
    .bind(new.task_id.as_deref())
    .bind(new.task_name.as_deref())
    .bind(new.start_time)
    .bind(new.end_time)
    .bind(new.source)
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    insert_entry_tags(conn, &id, &new.tag_ids).await?;

    tracing::debug!("Inserted {} time entry {} for project {}", new.source, id, new.project_id);
    Ok(entry)
}

/// Link tags to an entry. Ids of tags deleted in the meantime are skipped,
/// so a stale timer snapshot never blocks materializing its entry.
async fn insert_entry_tags(
    conn: &mut SqliteConnection,
    entry_id: &str,
    tag_ids: &[String],
) -> Result<()> {
    for tag_id in tag_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO time_entry_tags (time_entry_id, tag_id) SELECT ?, id FROM tags WHERE id = ?",
        )
        .bind(entry_id)
        .bind(tag_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

impl Repository {
    pub async fn create_time_entry(&self, new: &NewTimeEntry) -> Result<TimeEntry> {
        let mut tx = self.begin().await?;
        let entry = insert_time_entry(&mut *tx, new).await?;
        tx.commit().await?;
        Ok(entry)
    }

    pub async fn get_time_entry(&self, id: &str) -> Result<TimeEntry> {
        sqlx::query_as::<_, TimeEntry>("SELECT * FROM time_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Time entry", id))
    }

    /// Persist every mutable column of `entry`; with `tag_ids`, the tag set
    /// is deleted and re-inserted in the same transaction.
    pub async fn save_time_entry(
        &self,
        entry: &TimeEntry,
        tag_ids: Option<&[String]>,
    ) -> Result<TimeEntry> {
        let mut tx = self.begin().await?;

        let saved = sqlx::query_as::<_, TimeEntry>(
            r#"
            UPDATE time_entries SET
                task_id = ?, task_name = ?, start_time = ?, end_time = ?, source = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(entry.task_id.as_deref())
        .bind(entry.task_name.as_deref())
        .bind(entry.start_time)
        .bind(entry.end_time)
        .bind(entry.source)
        .bind(Utc::now())
        .bind(&entry.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Time entry", entry.id.as_str()))?;

        if let Some(tag_ids) = tag_ids {
            sqlx::query("DELETE FROM time_entry_tags WHERE time_entry_id = ?")
                .bind(&entry.id)
                .execute(&mut *tx)
                .await?;
            insert_entry_tags(&mut *tx, &entry.id, tag_ids).await?;
        }

        tx.commit().await?;

        tracing::debug!("Saved time entry: {}", entry.id);
        Ok(saved)
    }

    /// Hard delete; tag links cascade
    pub async fn delete_time_entry(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM time_entries WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Time entry", id));
        }

        tracing::debug!("Deleted time entry: {}", id);
        Ok(())
    }

    pub async fn entry_tag_ids(&self, entry_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT tag_id FROM time_entry_tags WHERE time_entry_id = ? ORDER BY tag_id",
        )
        .bind(entry_id)
        .fetch_all(self.pool())
        .await?;

        Ok(ids)
    }

    /// Entries of a user matching `filter`, newest first.
    ///
    /// The window keeps entries overlapping it: `start < upper AND end >= lower`.
    pub async fn list_time_entries(&self, user_id: &str, filter: &EntryFilter) -> Result<Vec<TimeEntry>> {
        let (lower, upper) = filter.window.unzip();

        let entries = sqlx::query_as::<_, TimeEntry>(
            r#"
            SELECT e.* FROM time_entries e
            JOIN projects p ON p.id = e.project_id
            WHERE e.user_id = ?
              AND (? IS NULL OR e.project_id = ?)
              AND (? IS NULL OR p.client_id = ?)
              AND (? IS NULL OR e.start_time < ?)
              AND (? IS NULL OR e.end_time >= ?)
            ORDER BY e.start_time DESC
            "#,
        )
        .bind(user_id)
        .bind(filter.project_id.as_deref())
        .bind(filter.project_id.as_deref())
        .bind(filter.client_id.as_deref())
        .bind(filter.client_id.as_deref())
        .bind(upper)
        .bind(upper)
        .bind(lower)
        .bind(lower)
        .fetch_all(self.pool())
        .await?;

        Ok(entries)
    }

    /// Entries of one project regardless of owner, for portal views
    pub async fn list_project_entries(&self, project_id: &str) -> Result<Vec<TimeEntry>> {
        let entries = sqlx::query_as::<_, TimeEntry>(
            "SELECT * FROM time_entries WHERE project_id = ? ORDER BY start_time DESC",
        )
        .bind(project_id)
        .fetch_all(self.pool())
        .await?;

        Ok(entries)
    }

    /// Entries joined with project, client rate, task name and tags,
    /// oldest first
    pub async fn list_billable_entries(
        &self,
        user_id: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<BillableEntry>> {
        let (lower, upper) = filter.window.unzip();

        let mut entries = sqlx::query_as::<_, BillableEntry>(
            r#"
            SELECT e.id, e.project_id, p.name AS project_name, p.client_id,
                   c.hourly_rate_usd, e.task_id, e.task_name, t.name AS task_title,
                   e.start_time, e.end_time, e.source
            FROM time_entries e
            JOIN projects p ON p.id = e.project_id
            JOIN clients c ON c.id = p.client_id
            LEFT JOIN tasks t ON t.id = e.task_id
            WHERE e.user_id = ?
              AND (? IS NULL OR e.project_id = ?)
              AND (? IS NULL OR p.client_id = ?)
              AND (? IS NULL OR e.start_time < ?)
              AND (? IS NULL OR e.end_time >= ?)
            ORDER BY e.start_time ASC
            "#,
        )
        .bind(user_id)
        .bind(filter.project_id.as_deref())
        .bind(filter.project_id.as_deref())
        .bind(filter.client_id.as_deref())
        .bind(filter.client_id.as_deref())
        .bind(upper)
        .bind(upper)
        .bind(lower)
        .bind(lower)
        .fetch_all(self.pool())
        .await?;

        if entries.is_empty() {
            return Ok(entries);
        }

        let links = self.list_entry_tags(user_id, filter).await?;

        let mut by_entry: HashMap<String, Vec<EntryTag>> = HashMap::new();
        for link in links {
            by_entry.entry(link.time_entry_id.clone()).or_default().push(link);
        }

        for entry in &mut entries {
            entry.tags = by_entry.remove(&entry.id).unwrap_or_default();
        }

        Ok(entries)
    }

    /// Tag links of the entries matching `filter`, by tag name
    pub(crate) async fn list_entry_tags(
        &self,
        user_id: &str,
        filter: &EntryFilter,
    ) -> Result<Vec<EntryTag>> {
        let (lower, upper) = filter.window.unzip();

        let links = sqlx::query_as::<_, EntryTag>(
            r#"
            SELECT tet.time_entry_id, tg.id AS tag_id, tg.name, tg.color
            FROM time_entry_tags tet
            JOIN tags tg ON tg.id = tet.tag_id
            JOIN time_entries e ON e.id = tet.time_entry_id
            JOIN projects p ON p.id = e.project_id
            WHERE e.user_id = ?
              AND (? IS NULL OR e.project_id = ?)
              AND (? IS NULL OR p.client_id = ?)
              AND (? IS NULL OR e.start_time < ?)
              AND (? IS NULL OR e.end_time >= ?)
            ORDER BY tg.name
            "#,
        )
        .bind(user_id)
        .bind(filter.project_id.as_deref())
        .bind(filter.project_id.as_deref())
        .bind(filter.client_id.as_deref())
        .bind(filter.client_id.as_deref())
        .bind(upper)
        .bind(upper)
        .bind(lower)
        .bind(lower)
        .fetch_all(self.pool())
        .await?;

        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use crate::database::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, h, m, 0).unwrap()
    }

    async fn seed(repo: &Repository) -> (User, Project) {
        let user = repo.create_user("ann@example.com", None).await.unwrap();
        let client = repo
            .create_client(
                &user.id,
                &CreateClientRequest {
                    name: "Acme".to_string(),
                    email: "billing@acme.test".to_string(),
                    hourly_rate_usd: 60.0,
                },
            )
            .await
            .unwrap();
        let project = repo.create_project(&user.id, &client.id, "Fence").await.unwrap();
        (user, project)
    }

    fn manual(user: &User, project: &Project, start: DateTime<Utc>, end: DateTime<Utc>) -> NewTimeEntry {
        NewTimeEntry {
            user_id: user.id.clone(),
            project_id: project.id.clone(),
            task_id: None,
            task_name: None,
            start_time: start,
            end_time: end,
            source: EntrySource::Manual,
            tag_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_window_selects_overlapping_entries() {
        let repo = memory_repository().await;
        let (user, project) = seed(&repo).await;

        // Before, straddling the lower edge, inside, after
        repo.create_time_entry(&manual(&user, &project, at(1, 9, 0), at(1, 10, 0))).await.unwrap();
        repo.create_time_entry(&manual(&user, &project, at(1, 23, 30), at(2, 0, 30))).await.unwrap();
        repo.create_time_entry(&manual(&user, &project, at(2, 9, 0), at(2, 10, 0))).await.unwrap();
        repo.create_time_entry(&manual(&user, &project, at(3, 9, 0), at(3, 10, 0))).await.unwrap();

        let filter = EntryFilter {
            window: Some((at(2, 0, 0), at(3, 0, 0))),
            ..Default::default()
        };
        let entries = repo.list_time_entries(&user.id, &filter).await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start_time, at(2, 9, 0));
        assert_eq!(entries[1].start_time, at(1, 23, 30));
    }

    #[tokio::test]
    async fn test_billable_entries_carry_rate_and_tags() {
        let repo = memory_repository().await;
        let (user, project) = seed(&repo).await;
        let tag = repo.create_tag(&user.id, "design", "#ff0000").await.unwrap();

        let mut new = manual(&user, &project, at(2, 9, 0), at(2, 10, 30));
        new.tag_ids = vec![tag.id.clone()];
        repo.create_time_entry(&new).await.unwrap();
        repo.create_time_entry(&manual(&user, &project, at(2, 11, 0), at(2, 11, 15))).await.unwrap();

        let rows = repo
            .list_billable_entries(&user.id, &EntryFilter::default())
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].hourly_rate_usd, 60.0);
        assert_eq!(rows[0].project_name, "Fence");
        assert_eq!(rows[0].duration_minutes(), 90.0);
        assert_eq!(rows[0].tags.len(), 1);
        assert_eq!(rows[0].tags[0].name, "design");
        assert!(rows[1].tags.is_empty());
    }

    #[tokio::test]
    async fn test_tag_links_follow_the_entry_filter() {
        let repo = memory_repository().await;
        let (user, fence) = seed(&repo).await;
        let shed = repo.create_project(&user.id, &fence.client_id, "Shed").await.unwrap();
        let tag = repo.create_tag(&user.id, "design", "#ff0000").await.unwrap();

        let tagged = |project: &Project, day: u32| {
            let mut new = manual(&user, project, at(day, 9, 0), at(day, 10, 0));
            new.tag_ids = vec![tag.id.clone()];
            new
        };
        let inside = repo.create_time_entry(&tagged(&fence, 2)).await.unwrap();
        repo.create_time_entry(&tagged(&fence, 5)).await.unwrap();
        repo.create_time_entry(&tagged(&shed, 2)).await.unwrap();

        let filter = EntryFilter {
            project_id: Some(fence.id.clone()),
            window: Some((at(2, 0, 0), at(3, 0, 0))),
            ..Default::default()
        };
        let links = repo.list_entry_tags(&user.id, &filter).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].time_entry_id, inside.id);

        let all = repo
            .list_entry_tags(&user.id, &EntryFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_save_replaces_tags_wholesale() {
        let repo = memory_repository().await;
        let (user, project) = seed(&repo).await;
        let a = repo.create_tag(&user.id, "a", "#000000").await.unwrap();
        let b = repo.create_tag(&user.id, "b", "#ffffff").await.unwrap();

        let mut new = manual(&user, &project, at(2, 9, 0), at(2, 10, 0));
        new.tag_ids = vec![a.id.clone()];
        let entry = repo.create_time_entry(&new).await.unwrap();

        repo.save_time_entry(&entry, Some(std::slice::from_ref(&b.id)))
            .await
            .unwrap();
        assert_eq!(repo.entry_tag_ids(&entry.id).await.unwrap(), vec![b.id.clone()]);

        repo.save_time_entry(&entry, None).await.unwrap();
        assert_eq!(repo.entry_tag_ids(&entry.id).await.unwrap(), vec![b.id]);

        repo.delete_time_entry(&entry.id).await.unwrap();
        assert!(repo.entry_tag_ids(&entry.id).await.unwrap().is_empty());
    }
}
