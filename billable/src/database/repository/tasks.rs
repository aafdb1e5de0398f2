//! Tasks, tags and task-tag associations

use super::Repository;
use crate::database::models::*;
use crate::error::{AppError, Result};
use chrono::Utc;
use uuid::Uuid;

impl Repository {
    /// Create a task numbered `max(task_number in project) + 1`.
    ///
    /// The number is computed inside the INSERT so two concurrent creations
    /// cannot observe the same maximum.
    pub async fn create_task(&self, project_id: &str, req: &CreateTaskRequest) -> Result<Task> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut tx = self.begin().await?;

        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (id, project_id, name, status, description, assignee_id, task_number, created_at, updated_at)
            SELECT ?, ?, ?, 'backlog', ?, ?, COALESCE(MAX(task_number), 0) + 1, ?, ?
            FROM tasks WHERE project_id = ?
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(project_id)
        .bind(&req.name)
        .bind(req.description.as_deref())
        .bind(req.assignee_id.as_deref())
        .bind(now)
        .bind(now)
        .bind(project_id)
        .fetch_one(&mut *tx)
        .await?;

        for tag_id in &req.tag_ids {
            sqlx::query("INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?, ?)")
                .bind(&id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!("Created task {} #{:?} in project {}", id, task.task_number, project_id);
        Ok(task)
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Task", id))
    }

    pub async fn list_tasks(&self, project_id: &str) -> Result<Vec<Task>> {
        let tasks = sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE project_id = ? ORDER BY task_number ASC, created_at ASC",
        )
        .bind(project_id)
        .fetch_all(self.pool())
        .await?;

        Ok(tasks)
    }

    pub async fn set_task_status(&self, id: &str, status: TaskStatus) -> Result<Task> {
        let rows = sqlx::query("UPDATE tasks SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Task", id));
        }

        self.get_task(id).await
    }

    /// Write back a task's editable fields
    pub async fn update_task(&self, task: &Task) -> Result<Task> {
        let updated = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks SET name = ?, status = ?, description = ?, assignee_id = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&task.name)
        .bind(task.status)
        .bind(task.description.as_deref())
        .bind(task.assignee_id.as_deref())
        .bind(Utc::now())
        .bind(&task.id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::not_found("Task", &task.id))?;

        tracing::debug!("Updated task: {}", task.id);
        Ok(updated)
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Task", id));
        }

        tracing::debug!("Deleted task: {}", id);
        Ok(())
    }

    pub async fn task_tag_ids(&self, task_id: &str) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT tag_id FROM task_tags WHERE task_id = ? ORDER BY tag_id",
        )
        .bind(task_id)
        .fetch_all(self.pool())
        .await?;

        Ok(ids)
    }

    /// Replace the task's tags wholesale
    pub async fn replace_task_tags(&self, task_id: &str, tag_ids: &[String]) -> Result<()> {
        let mut tx = self.begin().await?;

        sqlx::query("DELETE FROM task_tags WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        for tag_id in tag_ids {
            sqlx::query("INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?, ?)")
                .bind(task_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    // ===== Tags =====

    pub async fn create_tag(&self, user_id: &str, name: &str, color: &str) -> Result<Tag> {
        let id = Uuid::new_v4().to_string();

        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (id, user_id, name, color, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(name)
        .bind(color)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        tracing::debug!("Created tag: {}", id);
        Ok(tag)
    }

    pub async fn get_tag(&self, id: &str) -> Result<Tag> {
        sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Tag", id))
    }

    pub async fn list_tags(&self, user_id: &str) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT * FROM tags WHERE user_id = ? ORDER BY name COLLATE NOCASE ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(tags)
    }

    pub async fn update_tag(&self, id: &str, req: &UpdateTagRequest) -> Result<Tag> {
        sqlx::query_as::<_, Tag>(
            r#"
            UPDATE tags SET name = COALESCE(?, name), color = COALESCE(?, color)
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(req.name.as_deref())
        .bind(req.color.as_deref())
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::not_found("Tag", id))
    }

    /// Delete a tag; its task and entry associations cascade
    pub async fn delete_tag(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Tag", id));
        }

        tracing::debug!("Deleted tag: {}", id);
        Ok(())
    }
}
