//! Ownership and approval checks shared by the services
//!
//! Every check runs before any mutation. A record that exists but belongs to
//! someone else is an `Authorization` error; a missing id stays `NotFound`.

use crate::database::{Client, Invoice, Project, Repository, Tag, Task, TimeEntry, User};
use crate::error::{AppError, Result};

/// The acting user must exist and be approved before writing anything.
pub(crate) async fn ensure_approved(repo: &Repository, user_id: &str) -> Result<User> {
    let user = match repo.get_user(user_id).await {
        Ok(user) => user,
        Err(AppError::NotFound { .. }) => {
            return Err(AppError::Authorization(format!("unknown user {user_id}")))
        }
        Err(e) => return Err(e),
    };

    if !user.is_approved {
        tracing::warn!("Rejected write by unapproved user {}", user_id);
        return Err(AppError::Authorization(format!(
            "user {} is awaiting approval",
            user.email
        )));
    }

    Ok(user)
}

pub(crate) async fn owned_client(repo: &Repository, user_id: &str, client_id: &str) -> Result<Client> {
    let client = repo.get_client(client_id).await?;
    if client.user_id != user_id {
        return Err(AppError::Authorization(format!("client {client_id} belongs to another user")));
    }
    Ok(client)
}

pub(crate) async fn owned_project(repo: &Repository, user_id: &str, project_id: &str) -> Result<Project> {
    let project = repo.get_project(project_id).await?;
    if project.user_id != user_id {
        return Err(AppError::Authorization(format!("project {project_id} belongs to another user")));
    }
    Ok(project)
}

/// A task together with its (owned) project
pub(crate) async fn owned_task(repo: &Repository, user_id: &str, task_id: &str) -> Result<(Task, Project)> {
    let task = repo.get_task(task_id).await?;
    let project = owned_project(repo, user_id, &task.project_id).await?;
    Ok((task, project))
}

pub(crate) async fn owned_tag(repo: &Repository, user_id: &str, tag_id: &str) -> Result<Tag> {
    let tag = repo.get_tag(tag_id).await?;
    if tag.user_id != user_id {
        return Err(AppError::Authorization(format!("tag {tag_id} belongs to another user")));
    }
    Ok(tag)
}

pub(crate) async fn owned_entry(repo: &Repository, user_id: &str, entry_id: &str) -> Result<TimeEntry> {
    let entry = repo.get_time_entry(entry_id).await?;
    if entry.user_id != user_id {
        return Err(AppError::Authorization(format!("entry {entry_id} belongs to another user")));
    }
    Ok(entry)
}

pub(crate) async fn owned_invoice(repo: &Repository, user_id: &str, invoice_id: &str) -> Result<Invoice> {
    let invoice = repo.get_invoice(invoice_id).await?;
    if invoice.user_id != user_id {
        return Err(AppError::Authorization(format!("invoice {invoice_id} belongs to another user")));
    }
    Ok(invoice)
}

/// Every tag id must name one of the user's tags
pub(crate) async fn owned_tags(repo: &Repository, user_id: &str, tag_ids: &[String]) -> Result<()> {
    for tag_id in tag_ids {
        let tag = match repo.get_tag(tag_id).await {
            Ok(tag) => tag,
            Err(AppError::NotFound { .. }) => {
                return Err(AppError::validation(format!("unknown tag {tag_id}")))
            }
            Err(e) => return Err(e),
        };
        if tag.user_id != user_id {
            return Err(AppError::Authorization(format!("tag {tag_id} belongs to another user")));
        }
    }
    Ok(())
}

/// A task referenced from an entry or timer must sit in that project
pub(crate) async fn task_in_project(repo: &Repository, task_id: &str, project_id: &str) -> Result<Task> {
    let task = match repo.get_task(task_id).await {
        Ok(task) => task,
        Err(AppError::NotFound { .. }) => {
            return Err(AppError::validation(format!("unknown task {task_id}")))
        }
        Err(e) => return Err(e),
    };
    if task.project_id != project_id {
        return Err(AppError::validation(format!(
            "task {task_id} is not part of project {project_id}"
        )));
    }
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{memory_repository, CreateClientRequest};

    #[tokio::test]
    async fn test_unapproved_and_unknown_users_cannot_write() {
        let repo = memory_repository().await;
        let user = repo.create_user("ann@example.com", None).await.unwrap();

        assert!(matches!(
            ensure_approved(&repo, &user.id).await,
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            ensure_approved(&repo, "missing").await,
            Err(AppError::Authorization(_))
        ));

        repo.set_user_approved(&user.id, true).await.unwrap();
        assert!(ensure_approved(&repo, &user.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_foreign_records_are_unauthorized() {
        let repo = memory_repository().await;
        let ann = repo.create_user("ann@example.com", None).await.unwrap();
        let bob = repo.create_user("bob@example.com", None).await.unwrap();
        let client = repo
            .create_client(
                &ann.id,
                &CreateClientRequest {
                    name: "Acme".to_string(),
                    email: "billing@acme.test".to_string(),
                    hourly_rate_usd: 10.0,
                },
            )
            .await
            .unwrap();
        let project = repo.create_project(&ann.id, &client.id, "Fence").await.unwrap();

        assert!(owned_project(&repo, &ann.id, &project.id).await.is_ok());
        assert!(matches!(
            owned_project(&repo, &bob.id, &project.id).await,
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            owned_client(&repo, &ann.id, "nope").await,
            Err(AppError::NotFound { .. })
        ));
        assert!(matches!(
            owned_tags(&repo, &ann.id, &["nope".to_string()]).await,
            Err(AppError::Validation(_))
        ));
    }
}
