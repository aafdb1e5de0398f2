// Billable - client-billing time tracker
// Command-line front end over the application services

use anyhow::{anyhow, bail, Context};
use billable::app::AppState;
use billable::clock::{round_cents, round_minutes, truncate_cents, DateRange};
use billable::config::{DATA_DIR_ENV, DEFAULT_DATA_DIR};
use billable::database::{
    CreateClientRequest, CreateEntryRequest, CreateTaskRequest, EntryFilter, StartTimerRequest,
    TaskStatus, UpdateEntryRequest, UpdateTagRequest, UpdateTaskRequest, User,
};
use billable::format::{format_currency, format_duration, task_identifier};
use billable::services::{Granularity, ReportFilter};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "billable", about = "Track billable time and generate invoices")]
struct Cli {
    /// Data directory holding the database and settings
    #[arg(long, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Email of the acting user
    #[arg(long, env = "BILLABLE_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register a user (writes need approval first)
    AddUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Approve or revoke a registered user
    ApproveUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        revoke: bool,
    },
    AddClient {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value_t = 0.0)]
        rate: f64,
    },
    Clients,
    DeleteClient {
        #[arg(long)]
        client: String,
    },
    /// Grant a registered user read-only access to a client's projects
    PortalLink {
        #[arg(long)]
        client: String,
        /// Omit to revoke access
        #[arg(long)]
        email: Option<String>,
    },
    /// Projects and entries visible through portal links
    Portal {
        #[arg(long)]
        project: Option<String>,
    },
    AddProject {
        #[arg(long)]
        client: String,
        #[arg(long)]
        name: String,
    },
    Projects {
        #[arg(long)]
        client: Option<String>,
    },
    DeleteProject {
        #[arg(long)]
        project: String,
    },
    AddTask {
        #[arg(long)]
        project: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    Tasks {
        #[arg(long)]
        project: String,
    },
    /// Edit a task's name, description, assignee or status
    EditTask {
        #[arg(long)]
        task: String,
        #[arg(long)]
        name: Option<String>,
        /// Empty to clear
        #[arg(long)]
        description: Option<String>,
        /// Assignee email, empty to clear
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
    },
    TaskStatus {
        #[arg(long)]
        task: String,
        /// backlog, todo, progress or done
        #[arg(long)]
        status: TaskStatus,
    },
    AddTag {
        #[arg(long)]
        name: String,
        #[arg(long)]
        color: Option<String>,
    },
    EditTag {
        #[arg(long)]
        tag: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    Tags,
    /// Start a timer, stopping the running one first
    Start {
        #[arg(long)]
        project: String,
        #[arg(long)]
        task: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// Overrides the task's tags when given
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,
    },
    Stop,
    Status,
    /// Record an entry with explicit bounds
    Log {
        #[arg(long)]
        project: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        task: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    EditEntry {
        #[arg(long)]
        entry: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        note: Option<String>,
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,
    },
    DeleteEntry {
        #[arg(long)]
        entry: String,
    },
    Entries {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Earnings over the lookback window of a granularity
    Stats {
        #[arg(long)]
        granularity: Option<Granularity>,
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        project: Option<String>,
    },
    Report {
        #[arg(long)]
        project: String,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    Summary {
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    Calendar {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
    },
    /// Snapshot a project's time for a period
    Invoice {
        #[arg(long)]
        project: String,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    Invoices {
        #[arg(long)]
        project: String,
    },
    MarkInvoice {
        #[arg(long)]
        invoice: String,
        #[arg(long)]
        sent: Option<bool>,
        #[arg(long)]
        paid: Option<bool>,
    },
    ShowInvoice {
        #[arg(long)]
        invoice: String,
    },
    DeleteInvoice {
        #[arg(long)]
        invoice: String,
    },
}

/// RFC 3339, or local wall-clock "YYYY-MM-DD HH:MM"
fn parse_instant(value: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .with_context(|| format!("invalid time {value:?}, expected \"YYYY-MM-DD HH:MM\""))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("{value} does not exist in the local time zone"))
}

fn print_hours(label: &str, minutes: f64, amount: f64) {
    println!(
        "{label:<24} {:>10} {:>14}",
        format_duration(round_minutes(minutes)),
        format_currency(round_cents(amount))
    );
}

struct Session {
    state: AppState,
    user: Option<String>,
}

impl Session {
    async fn user(&self) -> anyhow::Result<User> {
        let email = self
            .user
            .as_deref()
            .context("no acting user; pass --user or set BILLABLE_USER")?;
        Ok(self.state.catalog.find_user_by_email(email).await?)
    }

    /// Explicit bounds, else the configured number of days ending today
    async fn range(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> anyhow::Result<DateRange> {
        let today = Local::now().date_naive();
        let days = self.state.settings.get_reports().await?.default_range_days;
        let default = DateRange::last_days(today, days);
        Ok(DateRange::new(from.unwrap_or(default.start), to.unwrap_or(default.end)))
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = cli.data_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    let state = AppState::initialize(&data_dir)
        .await
        .with_context(|| format!("failed to open data directory {}", data_dir.display()))?;
    let ctx = Session {
        state,
        user: cli.user,
    };
    let app = &ctx.state;

    match cli.command {
        Command::AddUser { email, name } => {
            let user = app.catalog.register_user(&email, name.as_deref()).await?;
            println!("registered {} ({}), awaiting approval", user.email, user.id);
        }
        Command::ApproveUser { email, revoke } => {
            let user = app.catalog.find_user_by_email(&email).await?;
            let user = app.catalog.approve_user(&user.id, !revoke).await?;
            println!("{} approved: {}", user.email, user.is_approved);
        }
        Command::AddClient { name, email, rate } => {
            let user = ctx.user().await?;
            let client = app
                .catalog
                .create_client(
                    &user.id,
                    CreateClientRequest {
                        name,
                        email,
                        hourly_rate_usd: rate,
                    },
                )
                .await?;
            println!("created client {}", client.id);
        }
        Command::Clients => {
            let user = ctx.user().await?;
            for client in app.catalog.list_clients(&user.id).await? {
                println!(
                    "{}  {:<24} {:<28} {}/h",
                    client.id,
                    client.name,
                    client.email,
                    format_currency(client.hourly_rate_usd)
                );
            }
        }
        Command::DeleteClient { client } => {
            let user = ctx.user().await?;
            app.catalog.delete_client(&user.id, &client).await?;
            println!("deleted client {client}");
        }
        Command::PortalLink { client, email } => {
            let user = ctx.user().await?;
            app.catalog.set_portal_user(&user.id, &client, email.as_deref()).await?;
            match email {
                Some(email) => println!("{email} can now view projects of client {client}"),
                None => println!("portal access of client {client} revoked"),
            }
        }
        Command::Portal { project } => {
            let user = ctx.user().await?;
            match project {
                Some(project) => {
                    for entry in app.catalog.portal_entries(&user.id, &project).await? {
                        println!(
                            "{}  {}  {}",
                            entry.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                            format_duration(round_minutes(entry.duration_minutes())),
                            entry.task_name.as_deref().unwrap_or("")
                        );
                    }
                }
                None => {
                    for project in app.catalog.portal_projects(&user.id).await? {
                        println!("{}  {}", project.id, project.name);
                    }
                }
            }
        }
        Command::AddProject { client, name } => {
            let user = ctx.user().await?;
            let project = app.catalog.create_project(&user.id, &client, &name).await?;
            println!("created project {}", project.id);
        }
        Command::Projects { client } => {
            let user = ctx.user().await?;
            for project in app.catalog.list_projects(&user.id, client.as_deref()).await? {
                println!("{}  {}", project.id, project.name);
            }
        }
        Command::DeleteProject { project } => {
            let user = ctx.user().await?;
            app.catalog.delete_project(&user.id, &project).await?;
            println!("deleted project {project}");
        }
        Command::AddTask {
            project,
            name,
            description,
            tags,
        } => {
            let user = ctx.user().await?;
            let owner = app.catalog.get_project(&user.id, &project).await?;
            let task = app
                .catalog
                .create_task(
                    &user.id,
                    &project,
                    CreateTaskRequest {
                        name,
                        description,
                        assignee_id: None,
                        tag_ids: tags,
                    },
                )
                .await?;
            println!(
                "created task {} ({})",
                task_identifier(task.task_number, &owner.name),
                task.id
            );
        }
        Command::Tasks { project } => {
            let user = ctx.user().await?;
            let owner = app.catalog.get_project(&user.id, &project).await?;
            for task in app.catalog.list_tasks(&user.id, &project).await? {
                println!(
                    "{:<10} {:<9} {}  {}",
                    task_identifier(task.task_number, &owner.name),
                    format!("{:?}", task.status).to_lowercase(),
                    task.name,
                    task.id
                );
            }
        }
        Command::EditTask {
            task,
            name,
            description,
            assignee,
            status,
        } => {
            let user = ctx.user().await?;
            let assignee_id = match assignee.as_deref() {
                None => None,
                Some("") => Some(None),
                Some(email) => Some(Some(app.catalog.find_user_by_email(email).await?.id)),
            };
            let patch = UpdateTaskRequest {
                name,
                description: description.map(|d| Some(d).filter(|d| !d.is_empty())),
                assignee_id,
                status,
            };
            let task = app.catalog.update_task(&user.id, &task, patch).await?;
            println!("updated task {} ({})", task.name, task.id);
        }
        Command::TaskStatus { task, status } => {
            let user = ctx.user().await?;
            let task = app.catalog.set_task_status(&user.id, &task, status).await?;
            println!("task {} is now {:?}", task.id, task.status);
        }
        Command::AddTag { name, color } => {
            let user = ctx.user().await?;
            let tag = app.catalog.create_tag(&user.id, &name, color.as_deref()).await?;
            println!("created tag {} ({})", tag.name, tag.id);
        }
        Command::EditTag { tag, name, color } => {
            let user = ctx.user().await?;
            let tag = app
                .catalog
                .update_tag(&user.id, &tag, UpdateTagRequest { name, color })
                .await?;
            println!("updated tag {} {} ({})", tag.color, tag.name, tag.id);
        }
        Command::Tags => {
            let user = ctx.user().await?;
            for tag in app.catalog.list_tags(&user.id).await? {
                println!("{}  {} {}", tag.id, tag.color, tag.name);
            }
        }
        Command::Start {
            project,
            task,
            note,
            tags,
        } => {
            let user = ctx.user().await?;
            let timer = app
                .timer
                .start_timer(
                    &user.id,
                    StartTimerRequest {
                        project_id: project,
                        task_id: task,
                        task_name: note,
                        tag_ids: tags,
                    },
                )
                .await?;
            println!(
                "timer started at {}",
                timer.started_at.with_timezone(&Local).format("%H:%M:%S")
            );
        }
        Command::Stop => {
            let user = ctx.user().await?;
            match app.timer.stop_timer(&user.id).await? {
                Some(entry) => println!(
                    "stopped: {} recorded ({})",
                    format_duration(round_minutes(entry.duration_minutes())),
                    entry.id
                ),
                None => println!("no timer running"),
            }
        }
        Command::Status => {
            let user = ctx.user().await?;
            let poll = app.settings.get_timer().await?.poll_interval_secs;
            match app.timer.status(&user.id, Utc::now()).await? {
                Some(status) => println!(
                    "{} running on {} (refresh every {poll}s)",
                    status.elapsed_display,
                    status.project_name.as_deref().unwrap_or("a deleted project")
                ),
                None => println!("no timer running"),
            }
        }
        Command::Log {
            project,
            start,
            end,
            task,
            note,
            tags,
        } => {
            let user = ctx.user().await?;
            let entry = app
                .ledger
                .create_entry(
                    &user.id,
                    CreateEntryRequest {
                        project_id: project,
                        start_time: parse_instant(&start)?,
                        end_time: parse_instant(&end)?,
                        task_id: task,
                        task_name: note,
                        tag_ids: tags,
                        source: None,
                    },
                )
                .await?;
            println!(
                "logged {} ({})",
                format_duration(round_minutes(entry.duration_minutes())),
                entry.id
            );
        }
        Command::EditEntry {
            entry,
            start,
            end,
            note,
            tags,
        } => {
            let user = ctx.user().await?;
            let patch = UpdateEntryRequest {
                task_id: None,
                task_name: note.map(Some),
                start_time: start.as_deref().map(parse_instant).transpose()?,
                end_time: end.as_deref().map(parse_instant).transpose()?,
                tag_ids: tags,
            };
            let entry = app.ledger.update_entry(&user.id, &entry, patch).await?;
            println!("updated {} ({})", entry.id, entry.source);
        }
        Command::DeleteEntry { entry } => {
            let user = ctx.user().await?;
            app.ledger.delete_entry(&user.id, &entry).await?;
            println!("deleted entry {entry}");
        }
        Command::Entries { project, from, to } => {
            let user = ctx.user().await?;
            let range = ctx.range(from, to).await?;
            let filter = EntryFilter {
                project_id: project,
                ..Default::default()
            };
            let entries = app
                .ledger
                .list_entries_in_range(&user.id, filter, range, &Local)
                .await?;
            for entry in entries {
                println!(
                    "{}  {} - {}  {:>8}  {:<9}  {}",
                    entry.id,
                    entry.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    entry.end_time.with_timezone(&Local).format("%H:%M"),
                    format_duration(round_minutes(entry.duration_minutes())),
                    entry.source,
                    entry.task_name.as_deref().unwrap_or("")
                );
            }
        }
        Command::Stats {
            granularity,
            client,
            project,
        } => {
            let user = ctx.user().await?;
            let granularity = match granularity {
                Some(granularity) => granularity,
                None => app.settings.get_reports().await?.default_granularity,
            };
            let filter = ReportFilter {
                client_id: client,
                project_id: project,
            };
            let stats = app
                .reports
                .earnings_statistics(&user.id, granularity, &filter, &Local::now())
                .await?;
            for bucket in &stats.buckets {
                print_hours(&bucket.label, bucket.minutes, bucket.amount_usd);
            }
            println!(
                "Total: {} earned {}",
                format_duration(round_minutes(stats.totals.minutes)),
                format_currency(truncate_cents(stats.totals.amount_usd))
            );
        }
        Command::Report { project, from, to } => {
            let user = ctx.user().await?;
            let range = ctx.range(from, to).await?;
            let report = app
                .reports
                .project_report(&user.id, &project, range, &Local)
                .await?;

            println!(
                "{} for {} ({} to {})",
                report.project.name, report.client.name, range.start, range.end
            );
            print_hours("Total", report.totals.minutes, report.totals.amount_usd);
            println!("\nBy day");
            for day in report.by_day.iter().filter(|d| d.entry_count > 0) {
                print_hours(&day.day.to_string(), day.minutes, day.amount_usd);
            }
            println!("\nBy task");
            for group in &report.by_task {
                println!("{:<24} {:>10}", group.label, format_duration(round_minutes(group.minutes)));
            }
            println!("\nBy tag");
            for group in &report.by_tag {
                println!("{:<24} {:>10}", group.label, format_duration(round_minutes(group.minutes)));
            }
        }
        Command::Summary { client, from, to } => {
            let user = ctx.user().await?;
            let range = ctx.range(from, to).await?;
            let filter = ReportFilter {
                client_id: client,
                project_id: None,
            };
            let summary = app.reports.summary(&user.id, &filter, range, &Local).await?;
            for project in &summary.projects {
                print_hours(&project.project_name, project.minutes, project.amount_usd);
            }
            print_hours("Total", summary.totals.minutes, summary.totals.amount_usd);
        }
        Command::Calendar { year, month } => {
            let user = ctx.user().await?;
            let cells = app
                .reports
                .calendar_month(&user.id, year, month, &ReportFilter::default(), &Local)
                .await?;
            for cell in cells.iter().filter(|c| c.entry_count > 0) {
                println!(
                    "{}  {:>8}  {} entr{}",
                    cell.day,
                    format_duration(round_minutes(cell.minutes)),
                    cell.entry_count,
                    if cell.entry_count == 1 { "y" } else { "ies" }
                );
            }
        }
        Command::Invoice { project, from, to } => {
            let user = ctx.user().await?;
            let period = ctx.range(from, to).await?;
            let invoice = app
                .invoices
                .generate_invoice(&user.id, &project, period, &Local)
                .await?;
            println!("{}", app.invoices.invoice_summary(&user.id, &invoice.id).await?);
        }
        Command::Invoices { project } => {
            let user = ctx.user().await?;
            for invoice in app.invoices.list_invoices(&user.id, &project).await? {
                println!(
                    "{}  {} to {}  {:>14}  sent: {:<5} paid: {}",
                    invoice.id,
                    invoice.period_start,
                    invoice.period_end,
                    format_currency(invoice.amount_usd),
                    invoice.is_sent,
                    invoice.is_paid
                );
            }
        }
        Command::MarkInvoice { invoice, sent, paid } => {
            let user = ctx.user().await?;
            if sent.is_none() && paid.is_none() {
                bail!("pass --sent and/or --paid");
            }
            if let Some(sent) = sent {
                app.invoices.mark_sent(&user.id, &invoice, sent).await?;
            }
            if let Some(paid) = paid {
                app.invoices.mark_paid(&user.id, &invoice, paid).await?;
            }
            println!("{}", app.invoices.invoice_summary(&user.id, &invoice).await?);
        }
        Command::ShowInvoice { invoice } => {
            let user = ctx.user().await?;
            println!("{}", app.invoices.invoice_summary(&user.id, &invoice).await?);
        }
        Command::DeleteInvoice { invoice } => {
            let user = ctx.user().await?;
            app.invoices.delete_invoice(&user.id, &invoice).await?;
            println!("deleted invoice {invoice}");
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "billable=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    run(cli).await
}
