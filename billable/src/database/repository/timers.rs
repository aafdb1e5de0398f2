//! Active timer rows, one per user

use super::Repository;
use crate::database::models::*;
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

/// Fields of a timer about to be started
#[derive(Debug, Clone)]
pub(crate) struct NewActiveTimer<'a> {
    pub user_id: &'a str,
    pub project_id: &'a str,
    pub task_id: Option<&'a str>,
    pub task_name: Option<&'a str>,
    pub started_at: DateTime<Utc>,
    pub tag_ids: &'a [String],
}

/// Remove and return the user's timer row.
///
/// Being a write, this takes the database write lock as the first statement
/// of a transaction, so concurrent starts queue behind each other instead of
/// racing on a stale read.
pub(crate) async fn take_active_timer(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<ActiveTimer>> {
    let row = sqlx::query_as::<_, ActiveTimerRow>(
        "DELETE FROM active_timers WHERE user_id = ? RETURNING *",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(ActiveTimer::try_from).transpose()?)
}

/// Insert the user's timer row, replacing any row keyed by the same user.
pub(crate) async fn upsert_active_timer(
    conn: &mut SqliteConnection,
    timer: &NewActiveTimer<'_>,
) -> Result<ActiveTimer> {
    let id = Uuid::new_v4().to_string();
    let tag_ids = serde_json::to_string(timer.tag_ids)?;

    let row = sqlx::query_as::<_, ActiveTimerRow>(
        r#"
        INSERT INTO active_timers (id, user_id, project_id, task_id, task_name, started_at, tag_ids, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            id = excluded.id,
            project_id = excluded.project_id,
            task_id = excluded.task_id,
            task_name = excluded.task_name,
            started_at = excluded.started_at,
            tag_ids = excluded.tag_ids,
            created_at = excluded.created_at
        RETURNING *
        "#,
    )
    .bind(&id)
    .bind(timer.user_id)
    .bind(timer.project_id)
    .bind(timer.task_id)
    .bind(timer.task_name)
    .bind(timer.started_at)
    .bind(&tag_ids)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!("Upserted active timer {} for user {}", id, timer.user_id);
    Ok(ActiveTimer::try_from(row)?)
}

impl Repository {
    pub async fn get_active_timer(&self, user_id: &str) -> Result<Option<ActiveTimer>> {
        let row = sqlx::query_as::<_, ActiveTimerRow>(
            "SELECT * FROM active_timers WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(ActiveTimer::try_from).transpose()?)
    }

    pub async fn count_active_timers(&self, user_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM active_timers WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_user() {
        let repo = memory_repository().await;
        let user = repo.create_user("ann@example.com", None).await.unwrap();
        let client = repo
            .create_client(
                &user.id,
                &CreateClientRequest {
                    name: "Acme".to_string(),
                    email: "billing@acme.test".to_string(),
                    hourly_rate_usd: 0.0,
                },
            )
            .await
            .unwrap();
        let project = repo.create_project(&user.id, &client.id, "Fence").await.unwrap();
        let tags = vec!["t1".to_string()];

        let mut conn = repo.pool().acquire().await.unwrap();
        for minute in [0, 5] {
            upsert_active_timer(
                &mut *conn,
                &NewActiveTimer {
                    user_id: &user.id,
                    project_id: &project.id,
                    task_id: None,
                    task_name: Some("setup"),
                    started_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, minute, 0).unwrap(),
                    tag_ids: &tags,
                },
            )
            .await
            .unwrap();
        }
        drop(conn);

        assert_eq!(repo.count_active_timers(&user.id).await.unwrap(), 1);
        let timer = repo.get_active_timer(&user.id).await.unwrap().unwrap();
        assert_eq!(timer.started_at, Utc.with_ymd_and_hms(2026, 3, 2, 9, 5, 0).unwrap());
        assert_eq!(timer.tag_ids, tags);

        let mut conn = repo.pool().acquire().await.unwrap();
        let taken = take_active_timer(&mut *conn, &user.id).await.unwrap();
        assert!(taken.is_some());
        assert!(take_active_timer(&mut *conn, &user.id).await.unwrap().is_none());
    }
}
