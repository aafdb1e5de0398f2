//! Repository layer for database operations
//!
//! CRUD operations for all entities, split per aggregate. Multi-statement
//! writes that must commit together are exposed as connection-level
//! functions so a service can compose them inside one transaction.

pub(crate) mod entries;
pub(crate) mod invoices;
pub(crate) mod tasks;
pub(crate) mod timers;

use super::models::*;
use crate::error::{AppError, Result};
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction on the pool
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    // ===== Users =====

    pub async fn create_user(&self, email: &str, full_name: Option<&str>) -> Result<User> {
        let id = Uuid::new_v4().to_string();

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, full_name, is_approved, created_at)
            VALUES (?, ?, ?, 0, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(full_name)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created user: {}", id);
        Ok(user)
    }

    pub async fn get_user(&self, id: &str) -> Result<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn set_user_approved(&self, id: &str, approved: bool) -> Result<User> {
        let rows = sqlx::query("UPDATE users SET is_approved = ? WHERE id = ?")
            .bind(approved)
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("User", id));
        }

        tracing::debug!("Set approval of user {} to {}", id, approved);
        self.get_user(id).await
    }

    // ===== Clients =====

    pub async fn create_client(&self, user_id: &str, req: &CreateClientRequest) -> Result<Client> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let client = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (id, user_id, name, email, hourly_rate_usd, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&req.name)
        .bind(&req.email)
        .bind(req.hourly_rate_usd)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created client: {}", id);
        Ok(client)
    }

    pub async fn get_client(&self, id: &str) -> Result<Client> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Client", id))
    }

    pub async fn list_clients(&self, user_id: &str) -> Result<Vec<Client>> {
        let clients = sqlx::query_as::<_, Client>(
            "SELECT * FROM clients WHERE user_id = ? ORDER BY name COLLATE NOCASE ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(clients)
    }

    /// Update the given fields, leaving `None` fields untouched
    pub async fn update_client(&self, id: &str, req: &UpdateClientRequest) -> Result<Client> {
        let rows = sqlx::query(
            r#"
            UPDATE clients SET
                name = COALESCE(?, name),
                email = COALESCE(?, email),
                hourly_rate_usd = COALESCE(?, hourly_rate_usd),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(req.name.as_deref())
        .bind(req.email.as_deref())
        .bind(req.hourly_rate_usd)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Client", id));
        }

        self.get_client(id).await
    }

    pub async fn set_client_portal_user(
        &self,
        id: &str,
        invited_user_id: Option<&str>,
    ) -> Result<Client> {
        let rows = sqlx::query("UPDATE clients SET invited_user_id = ?, updated_at = ? WHERE id = ?")
            .bind(invited_user_id)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Client", id));
        }

        tracing::debug!("Client {} portal user set to {:?}", id, invited_user_id);
        self.get_client(id).await
    }

    pub async fn count_client_projects(&self, client_id: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE client_id = ?")
            .bind(client_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn delete_client(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM clients WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Client", id));
        }

        tracing::debug!("Deleted client: {}", id);
        Ok(())
    }

    // ===== Projects =====

    pub async fn create_project(&self, user_id: &str, client_id: &str, name: &str) -> Result<Project> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (id, user_id, client_id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(client_id)
        .bind(name)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Created project: {} for client: {}", id, client_id);
        Ok(project)
    }

    pub async fn get_project(&self, id: &str) -> Result<Project> {
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("Project", id))
    }

    /// Projects of a user, optionally narrowed to one client
    pub async fn list_projects(&self, user_id: &str, client_id: Option<&str>) -> Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT * FROM projects
            WHERE user_id = ? AND (? IS NULL OR client_id = ?)
            ORDER BY name COLLATE NOCASE ASC
            "#,
        )
        .bind(user_id)
        .bind(client_id)
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(projects)
    }

    /// Projects whose client has granted portal access to `invited_user_id`
    pub async fn list_portal_projects(&self, invited_user_id: &str) -> Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT p.* FROM projects p
            JOIN clients c ON c.id = p.client_id
            WHERE c.invited_user_id = ?
            ORDER BY p.name COLLATE NOCASE ASC
            "#,
        )
        .bind(invited_user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(projects)
    }

    pub async fn rename_project(&self, id: &str, name: &str) -> Result<Project> {
        let rows = sqlx::query("UPDATE projects SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Project", id));
        }

        self.get_project(id).await
    }

    /// Delete a project; tasks, time entries and invoices cascade
    pub async fn delete_project(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Project", id));
        }

        tracing::debug!("Deleted project: {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::database::memory_repository;
    use crate::database::CreateClientRequest;
    use crate::error::AppError;

    #[tokio::test]
    async fn test_user_approval() {
        let repo = memory_repository().await;

        let user = repo.create_user("ann@example.com", Some("Ann")).await.unwrap();
        assert!(!user.is_approved);

        let approved = repo.set_user_approved(&user.id, true).await.unwrap();
        assert!(approved.is_approved);

        let found = repo.find_user_by_email("ann@example.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_client_partial_update() {
        let repo = memory_repository().await;
        let user = repo.create_user("ann@example.com", None).await.unwrap();

        let client = repo
            .create_client(
                &user.id,
                &CreateClientRequest {
                    name: "Acme".to_string(),
                    email: "billing@acme.test".to_string(),
                    hourly_rate_usd: 50.0,
                },
            )
            .await
            .unwrap();

        let updated = repo
            .update_client(
                &client.id,
                &crate::database::UpdateClientRequest {
                    hourly_rate_usd: Some(65.5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Acme");
        assert_eq!(updated.hourly_rate_usd, 65.5);
    }

    #[tokio::test]
    async fn test_client_with_projects_cannot_be_deleted() {
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
        let project = repo.create_project(&user.id, &client.id, "Site").await.unwrap();

        assert_eq!(repo.count_client_projects(&client.id).await.unwrap(), 1);
        assert!(matches!(
            repo.delete_client(&client.id).await,
            Err(AppError::Database(_))
        ));

        repo.delete_project(&project.id).await.unwrap();
        repo.delete_client(&client.id).await.unwrap();
        assert!(matches!(
            repo.get_client(&client.id).await,
            Err(AppError::NotFound { .. })
        ));
    }
}
