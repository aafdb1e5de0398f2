//! Invoice snapshots

use super::Repository;
use crate::database::models::*;
use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

impl Repository {
    pub async fn create_invoice(
        &self,
        user_id: &str,
        project_id: &str,
        period_start: NaiveDate,
        period_end: NaiveDate,
        total_minutes: f64,
        amount_usd: f64,
    ) -> Result<Invoice> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices
                (id, project_id, user_id, period_start, period_end, total_minutes, amount_usd,
                 is_sent, is_paid, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(project_id)
        .bind(user_id)
        .bind(period_start)
        .bind(period_end)
        .bind(total_minutes)
        .bind(amount_usd)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        tracing::debug!("Created invoice: {} for project: {}", id, project_id);
        Ok(invoice)
    }

    pub async fn get_invoice(&self, id: &str) -> Result<Invoice> {
        sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| AppError::not_found("Invoice", id))
    }

    /// Invoices of a project, latest period first
    pub async fn list_invoices(&self, project_id: &str) -> Result<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE project_id = ? ORDER BY period_end DESC, created_at DESC",
        )
        .bind(project_id)
        .fetch_all(self.pool())
        .await?;

        Ok(invoices)
    }

    /// Set or clear the sent flag; `sent_at` follows the flag
    pub async fn set_invoice_sent(&self, id: &str, sent_at: Option<DateTime<Utc>>) -> Result<Invoice> {
        sqlx::query_as::<_, Invoice>(
            "UPDATE invoices SET is_sent = ?, sent_at = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(sent_at.is_some())
        .bind(sent_at)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::not_found("Invoice", id))
    }

    /// Set or clear the paid flag; `paid_at` follows the flag
    pub async fn set_invoice_paid(&self, id: &str, paid_at: Option<DateTime<Utc>>) -> Result<Invoice> {
        sqlx::query_as::<_, Invoice>(
            "UPDATE invoices SET is_paid = ?, paid_at = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(paid_at.is_some())
        .bind(paid_at)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| AppError::not_found("Invoice", id))
    }

    pub async fn delete_invoice(&self, id: &str) -> Result<()> {
        let rows = sqlx::query("DELETE FROM invoices WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::not_found("Invoice", id));
        }

        tracing::debug!("Deleted invoice: {}", id);
        Ok(())
    }
}
