//! Invoice service
//!
//! Snapshots a project's billable time for an inclusive date range. The
//! stored totals are never recomputed; later edits to entries only affect
//! invoices generated afterwards.

use super::access::{ensure_approved, owned_invoice, owned_project};
use crate::clock::{billed_amount, round_cents, round_minutes, DateRange};
use crate::database::{EntryFilter, Invoice, Repository};
use crate::error::{AppError, Result};
use crate::format::{format_currency, format_duration};
use chrono::{DateTime, TimeZone, Utc};

/// Service for generating invoices and tracking their delivery and payment
#[derive(Clone)]
pub struct InvoiceService {
    repo: Repository,
}

impl InvoiceService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Snapshot the project's time within the local calendar days of `period`.
    ///
    /// Fails with `EmptyPeriod` when there is nothing to bill; no row is
    /// written in that case.
    pub async fn generate_invoice<Tz: TimeZone>(
        &self,
        user_id: &str,
        project_id: &str,
        period: DateRange,
        tz: &Tz,
    ) -> Result<Invoice> {
        ensure_approved(&self.repo, user_id).await?;
        let project = owned_project(&self.repo, user_id, project_id).await?;
        let client = self.repo.get_client(&project.client_id).await?;

        let empty = || AppError::EmptyPeriod {
            start: period.start,
            end: period.end,
        };
        let window = period.bounds(tz).ok_or_else(empty)?;

        let filter = EntryFilter {
            project_id: Some(project.id.clone()),
            client_id: None,
            window: Some(window),
        };
        let entries = self.repo.list_billable_entries(user_id, &filter).await?;

        let total_minutes = round_cents(entries.iter().map(|e| e.duration_minutes()).sum());
        if total_minutes <= 0.0 {
            tracing::info!(
                "No billable time for project {} between {} and {}",
                project.name,
                period.start,
                period.end
            );
            return Err(empty());
        }

        let amount_usd = round_cents(billed_amount(total_minutes, client.hourly_rate_usd));

        let invoice = self
            .repo
            .create_invoice(
                user_id,
                &project.id,
                period.start,
                period.end,
                total_minutes,
                amount_usd,
            )
            .await?;

        tracing::info!(
            "Invoice {} generated for {}: {} min, {}",
            invoice.id,
            project.name,
            invoice.total_minutes,
            format_currency(invoice.amount_usd)
        );
        Ok(invoice)
    }

    pub async fn get_invoice(&self, user_id: &str, invoice_id: &str) -> Result<Invoice> {
        owned_invoice(&self.repo, user_id, invoice_id).await
    }

    /// Invoices of a project, latest period first
    pub async fn list_invoices(&self, user_id: &str, project_id: &str) -> Result<Vec<Invoice>> {
        owned_project(&self.repo, user_id, project_id).await?;
        self.repo.list_invoices(project_id).await
    }

    /// Toggle the sent flag; turning it on stamps the time, off clears it
    pub async fn mark_sent(&self, user_id: &str, invoice_id: &str, sent: bool) -> Result<Invoice> {
        self.mark_sent_at(user_id, invoice_id, sent, Utc::now()).await
    }

    pub async fn mark_sent_at(
        &self,
        user_id: &str,
        invoice_id: &str,
        sent: bool,
        now: DateTime<Utc>,
    ) -> Result<Invoice> {
        ensure_approved(&self.repo, user_id).await?;
        owned_invoice(&self.repo, user_id, invoice_id).await?;

        let invoice = self
            .repo
            .set_invoice_sent(invoice_id, sent.then_some(now))
            .await?;
        tracing::info!("Invoice {} sent: {}", invoice_id, sent);
        Ok(invoice)
    }

    /// Toggle the paid flag; independent of the sent flag
    pub async fn mark_paid(&self, user_id: &str, invoice_id: &str, paid: bool) -> Result<Invoice> {
        self.mark_paid_at(user_id, invoice_id, paid, Utc::now()).await
    }

    pub async fn mark_paid_at(
        &self,
        user_id: &str,
        invoice_id: &str,
        paid: bool,
        now: DateTime<Utc>,
    ) -> Result<Invoice> {
        ensure_approved(&self.repo, user_id).await?;
        owned_invoice(&self.repo, user_id, invoice_id).await?;

        let invoice = self
            .repo
            .set_invoice_paid(invoice_id, paid.then_some(now))
            .await?;
        tracing::info!("Invoice {} paid: {}", invoice_id, paid);
        Ok(invoice)
    }

    /// Remove the invoice; the entries it was computed from stay
    pub async fn delete_invoice(&self, user_id: &str, invoice_id: &str) -> Result<()> {
        ensure_approved(&self.repo, user_id).await?;
        owned_invoice(&self.repo, user_id, invoice_id).await?;

        self.repo.delete_invoice(invoice_id).await?;
        tracing::info!("Invoice deleted: {}", invoice_id);
        Ok(())
    }

    /// Plain-text summary handed to the delivery collaborator
    pub async fn invoice_summary(&self, user_id: &str, invoice_id: &str) -> Result<String> {
        let invoice = owned_invoice(&self.repo, user_id, invoice_id).await?;
        let project = self.repo.get_project(&invoice.project_id).await?;
        let client = self.repo.get_client(&project.client_id).await?;

        let mut lines = vec![
            format!("Invoice {}", invoice.id),
            format!("Client: {} <{}>", client.name, client.email),
            format!("Project: {}", project.name),
            format!("Period: {} to {}", invoice.period_start, invoice.period_end),
            format!("Time: {}", format_duration(round_minutes(invoice.total_minutes))),
            format!("Amount due: {}", format_currency(invoice.amount_usd)),
        ];
        if let Some(sent_at) = invoice.sent_at {
            lines.push(format!("Sent: {}", sent_at.format("%Y-%m-%d")));
        }
        if let Some(paid_at) = invoice.paid_at {
            lines.push(format!("Paid: {}", paid_at.format("%Y-%m-%d")));
        }

        Ok(lines.join("\n"))
    }
}
