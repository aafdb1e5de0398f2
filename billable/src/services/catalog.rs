//! Catalog service
//!
//! Users, clients, projects, tasks and tags: the records time is tracked
//! against. Also serves the read-only client portal.

use super::access::{
    ensure_approved, owned_client, owned_project, owned_tag, owned_tags, owned_task,
};
use crate::config::DEFAULT_TAG_COLOR;
use crate::database::{
    Client, CreateClientRequest, CreateTaskRequest, Project, Repository, Tag, Task, TaskStatus,
    TimeEntry, UpdateClientRequest, UpdateTagRequest, UpdateTaskRequest, User,
};
use crate::error::{AppError, Result};

/// Service for the records time is tracked against
#[derive(Clone)]
pub struct CatalogService {
    repo: Repository,
}

fn require_text(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    require_text(email, "email")?;
    if !email.contains('@') {
        return Err(AppError::validation(format!("invalid email address: {email}")));
    }
    Ok(())
}

fn validate_rate(rate: f64) -> Result<()> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(AppError::validation("hourly rate must be a non-negative amount"));
    }
    Ok(())
}

impl CatalogService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    // ===== Users =====

    /// Sign up a user; writes are refused until the user is approved
    pub async fn register_user(&self, email: &str, full_name: Option<&str>) -> Result<User> {
        validate_email(email)?;
        if self.repo.find_user_by_email(email).await?.is_some() {
            return Err(AppError::validation(format!("{email} is already registered")));
        }

        let user = self.repo.create_user(email.trim(), full_name).await?;
        tracing::info!("Registered user {} ({})", user.id, user.email);
        Ok(user)
    }

    /// Out-of-band approval step
    pub async fn approve_user(&self, user_id: &str, approved: bool) -> Result<User> {
        let user = self.repo.set_user_approved(user_id, approved).await?;
        tracing::info!("User {} approval set to {}", user.email, approved);
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<User> {
        self.repo
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::not_found("User", email))
    }

    // ===== Clients =====

    pub async fn create_client(&self, user_id: &str, req: CreateClientRequest) -> Result<Client> {
        ensure_approved(&self.repo, user_id).await?;
        require_text(&req.name, "client name")?;
        validate_email(&req.email)?;
        validate_rate(req.hourly_rate_usd)?;

        let client = self.repo.create_client(user_id, &req).await?;
        tracing::info!("Client created: {} ({})", client.name, client.id);
        Ok(client)
    }

    pub async fn get_client(&self, user_id: &str, client_id: &str) -> Result<Client> {
        owned_client(&self.repo, user_id, client_id).await
    }

    pub async fn list_clients(&self, user_id: &str) -> Result<Vec<Client>> {
        self.repo.list_clients(user_id).await
    }

    pub async fn update_client(
        &self,
        user_id: &str,
        client_id: &str,
        req: UpdateClientRequest,
    ) -> Result<Client> {
        ensure_approved(&self.repo, user_id).await?;
        owned_client(&self.repo, user_id, client_id).await?;

        if let Some(name) = &req.name {
            require_text(name, "client name")?;
        }
        if let Some(email) = &req.email {
            validate_email(email)?;
        }
        if let Some(rate) = req.hourly_rate_usd {
            validate_rate(rate)?;
        }

        self.repo.update_client(client_id, &req).await
    }

    /// Delete a client that no longer owns projects
    pub async fn delete_client(&self, user_id: &str, client_id: &str) -> Result<()> {
        ensure_approved(&self.repo, user_id).await?;
        let client = owned_client(&self.repo, user_id, client_id).await?;

        let projects = self.repo.count_client_projects(client_id).await?;
        if projects > 0 {
            return Err(AppError::validation(format!(
                "client {} still has {} project(s)",
                client.name, projects
            )));
        }

        self.repo.delete_client(client_id).await?;
        tracing::info!("Client deleted: {}", client_id);
        Ok(())
    }

    /// Grant (or with `None`, revoke) read-only portal access to a registered user
    pub async fn set_portal_user(
        &self,
        user_id: &str,
        client_id: &str,
        portal_email: Option<&str>,
    ) -> Result<Client> {
        ensure_approved(&self.repo, user_id).await?;
        owned_client(&self.repo, user_id, client_id).await?;

        let invited = match portal_email {
            Some(email) => Some(
                self.repo
                    .find_user_by_email(email)
                    .await?
                    .ok_or_else(|| AppError::validation(format!("no registered user {email}")))?,
            ),
            None => None,
        };

        let client = self
            .repo
            .set_client_portal_user(client_id, invited.as_ref().map(|u| u.id.as_str()))
            .await?;
        tracing::info!(
            "Portal access of client {} set to {:?}",
            client.id,
            invited.map(|u| u.email)
        );
        Ok(client)
    }

    // ===== Projects =====

    pub async fn create_project(&self, user_id: &str, client_id: &str, name: &str) -> Result<Project> {
        ensure_approved(&self.repo, user_id).await?;
        owned_client(&self.repo, user_id, client_id).await?;
        require_text(name, "project name")?;

        let project = self.repo.create_project(user_id, client_id, name.trim()).await?;
        tracing::info!("Project created: {} ({})", project.name, project.id);
        Ok(project)
    }

    pub async fn get_project(&self, user_id: &str, project_id: &str) -> Result<Project> {
        owned_project(&self.repo, user_id, project_id).await
    }

    pub async fn list_projects(&self, user_id: &str, client_id: Option<&str>) -> Result<Vec<Project>> {
        if let Some(client_id) = client_id {
            owned_client(&self.repo, user_id, client_id).await?;
        }
        self.repo.list_projects(user_id, client_id).await
    }

    pub async fn rename_project(&self, user_id: &str, project_id: &str, name: &str) -> Result<Project> {
        ensure_approved(&self.repo, user_id).await?;
        owned_project(&self.repo, user_id, project_id).await?;
        require_text(name, "project name")?;

        self.repo.rename_project(project_id, name.trim()).await
    }

    /// Delete a project with its tasks, entries and invoices
    pub async fn delete_project(&self, user_id: &str, project_id: &str) -> Result<()> {
        ensure_approved(&self.repo, user_id).await?;
        owned_project(&self.repo, user_id, project_id).await?;

        self.repo.delete_project(project_id).await?;
        tracing::info!("Project deleted: {}", project_id);
        Ok(())
    }

    // ===== Tasks =====

    pub async fn create_task(
        &self,
        user_id: &str,
        project_id: &str,
        req: CreateTaskRequest,
    ) -> Result<Task> {
        ensure_approved(&self.repo, user_id).await?;
        owned_project(&self.repo, user_id, project_id).await?;
        require_text(&req.name, "task name")?;
        owned_tags(&self.repo, user_id, &req.tag_ids).await?;

        let task = self.repo.create_task(project_id, &req).await?;
        tracing::info!("Task created: {} #{:?}", task.id, task.task_number);
        Ok(task)
    }

    pub async fn list_tasks(&self, user_id: &str, project_id: &str) -> Result<Vec<Task>> {
        owned_project(&self.repo, user_id, project_id).await?;
        self.repo.list_tasks(project_id).await
    }

    pub async fn set_task_status(&self, user_id: &str, task_id: &str, status: TaskStatus) -> Result<Task> {
        ensure_approved(&self.repo, user_id).await?;
        owned_task(&self.repo, user_id, task_id).await?;

        self.repo.set_task_status(task_id, status).await
    }

    /// Edit name, description, assignee and status in one save
    pub async fn update_task(
        &self,
        user_id: &str,
        task_id: &str,
        req: UpdateTaskRequest,
    ) -> Result<Task> {
        ensure_approved(&self.repo, user_id).await?;
        let (current, _) = owned_task(&self.repo, user_id, task_id).await?;

        if let Some(name) = &req.name {
            require_text(name, "task name")?;
        }
        if let Some(Some(assignee_id)) = &req.assignee_id {
            match self.repo.get_user(assignee_id).await {
                Ok(_) => {}
                Err(AppError::NotFound { .. }) => {
                    return Err(AppError::validation(format!("unknown assignee {assignee_id}")))
                }
                Err(e) => return Err(e),
            }
        }

        let task = Task {
            name: req.name.map(|name| name.trim().to_string()).unwrap_or(current.name),
            description: req.description.unwrap_or(current.description),
            assignee_id: req.assignee_id.unwrap_or(current.assignee_id),
            status: req.status.unwrap_or(current.status),
            ..current
        };

        let task = self.repo.update_task(&task).await?;
        tracing::info!("Task updated: {}", task.id);
        Ok(task)
    }

    /// Replace the task's tags; later timers on the task copy this set
    pub async fn set_task_tags(&self, user_id: &str, task_id: &str, tag_ids: &[String]) -> Result<()> {
        ensure_approved(&self.repo, user_id).await?;
        owned_task(&self.repo, user_id, task_id).await?;
        owned_tags(&self.repo, user_id, tag_ids).await?;

        self.repo.replace_task_tags(task_id, tag_ids).await
    }

    pub async fn task_tag_ids(&self, user_id: &str, task_id: &str) -> Result<Vec<String>> {
        owned_task(&self.repo, user_id, task_id).await?;
        self.repo.task_tag_ids(task_id).await
    }

    /// Entries and timers referencing the task keep their ad-hoc name only
    pub async fn delete_task(&self, user_id: &str, task_id: &str) -> Result<()> {
        ensure_approved(&self.repo, user_id).await?;
        owned_task(&self.repo, user_id, task_id).await?;

        self.repo.delete_task(task_id).await?;
        tracing::info!("Task deleted: {}", task_id);
        Ok(())
    }

    // ===== Tags =====

    pub async fn create_tag(&self, user_id: &str, name: &str, color: Option<&str>) -> Result<Tag> {
        ensure_approved(&self.repo, user_id).await?;
        require_text(name, "tag name")?;

        let color = color.unwrap_or(DEFAULT_TAG_COLOR);
        self.repo.create_tag(user_id, name.trim(), color).await
    }

    pub async fn list_tags(&self, user_id: &str) -> Result<Vec<Tag>> {
        self.repo.list_tags(user_id).await
    }

    /// Rename or recolour a tag
    pub async fn update_tag(&self, user_id: &str, tag_id: &str, req: UpdateTagRequest) -> Result<Tag> {
        ensure_approved(&self.repo, user_id).await?;
        owned_tag(&self.repo, user_id, tag_id).await?;

        let name = match &req.name {
            Some(name) => {
                require_text(name, "tag name")?;
                Some(name.trim().to_string())
            }
            None => None,
        };
        if let Some(color) = &req.color {
            require_text(color, "tag color")?;
        }

        self.repo
            .update_tag(
                tag_id,
                &UpdateTagRequest {
                    name,
                    color: req.color,
                },
            )
            .await
    }

    pub async fn delete_tag(&self, user_id: &str, tag_id: &str) -> Result<()> {
        ensure_approved(&self.repo, user_id).await?;
        owned_tag(&self.repo, user_id, tag_id).await?;

        self.repo.delete_tag(tag_id).await
    }

    // ===== Client portal =====

    /// Projects visible to an external user through client portal links
    pub async fn portal_projects(&self, portal_user_id: &str) -> Result<Vec<Project>> {
        self.repo.list_portal_projects(portal_user_id).await
    }

    /// Completed entries of a project the external user may see
    pub async fn portal_entries(&self, portal_user_id: &str, project_id: &str) -> Result<Vec<TimeEntry>> {
        let project = self.repo.get_project(project_id).await?;
        let client = self.repo.get_client(&project.client_id).await?;

        if client.invited_user_id.as_deref() != Some(portal_user_id) {
            return Err(AppError::Authorization(format!(
                "no portal access to project {project_id}"
            )));
        }

        self.repo.list_project_entries(project_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory_repository;

    async fn create_test_service() -> (CatalogService, User) {
        let service = CatalogService::new(memory_repository().await);
        let user = service.register_user("ann@example.com", Some("Ann")).await.unwrap();
        let user = service.approve_user(&user.id, true).await.unwrap();
        (service, user)
    }

    fn acme() -> CreateClientRequest {
        CreateClientRequest {
            name: "Acme".to_string(),
            email: "billing@acme.test".to_string(),
            hourly_rate_usd: 50.0,
        }
    }

    #[tokio::test]
    async fn test_client_validation() {
        let (service, user) = create_test_service().await;

        let negative = CreateClientRequest {
            hourly_rate_usd: -1.0,
            ..acme()
        };
        assert!(matches!(
            service.create_client(&user.id, negative).await,
            Err(AppError::Validation(_))
        ));

        let nameless = CreateClientRequest {
            name: "  ".to_string(),
            ..acme()
        };
        assert!(matches!(
            service.create_client(&user.id, nameless).await,
            Err(AppError::Validation(_))
        ));

        let client = service.create_client(&user.id, acme()).await.unwrap();
        assert!(matches!(
            service
                .update_client(
                    &user.id,
                    &client.id,
                    UpdateClientRequest {
                        hourly_rate_usd: Some(f64::NAN),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unapproved_user_cannot_create_clients() {
        let service = CatalogService::new(memory_repository().await);
        let user = service.register_user("new@example.com", None).await.unwrap();

        assert!(matches!(
            service.create_client(&user.id, acme()).await,
            Err(AppError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_client_delete_guard() {
        let (service, user) = create_test_service().await;
        let client = service.create_client(&user.id, acme()).await.unwrap();
        let project = service.create_project(&user.id, &client.id, "Fence").await.unwrap();

        assert!(matches!(
            service.delete_client(&user.id, &client.id).await,
            Err(AppError::Validation(_))
        ));

        service.delete_project(&user.id, &project.id).await.unwrap();
        service.delete_client(&user.id, &client.id).await.unwrap();
        assert!(service.list_clients(&user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_projects_require_own_client() {
        let (service, ann) = create_test_service().await;
        let bob = service.register_user("bob@example.com", None).await.unwrap();
        let bob = service.approve_user(&bob.id, true).await.unwrap();
        let client = service.create_client(&ann.id, acme()).await.unwrap();

        assert!(matches!(
            service.create_project(&bob.id, &client.id, "Sneaky").await,
            Err(AppError::Authorization(_))
        ));
    }

    #[tokio::test]
    async fn test_task_status_and_tags() {
        let (service, user) = create_test_service().await;
        let client = service.create_client(&user.id, acme()).await.unwrap();
        let project = service.create_project(&user.id, &client.id, "Fence").await.unwrap();
        let tag = service.create_tag(&user.id, "design", None).await.unwrap();
        assert_eq!(tag.color, DEFAULT_TAG_COLOR);

        let task = service
            .create_task(
                &user.id,
                &project.id,
                CreateTaskRequest {
                    name: "Posts".to_string(),
                    tag_ids: vec![tag.id.clone()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(task.task_number, Some(1));
        assert_eq!(service.task_tag_ids(&user.id, &task.id).await.unwrap(), vec![tag.id]);

        let done = service
            .set_task_status(&user.id, &task.id, TaskStatus::Done)
            .await
            .unwrap();
        assert!(done.is_completed());

        service.set_task_tags(&user.id, &task.id, &[]).await.unwrap();
        assert!(service.task_tag_ids(&user.id, &task.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_task_edits_fields_in_one_save() {
        let (service, user) = create_test_service().await;
        let client = service.create_client(&user.id, acme()).await.unwrap();
        let project = service.create_project(&user.id, &client.id, "Fence").await.unwrap();
        let task = service
            .create_task(
                &user.id,
                &project.id,
                CreateTaskRequest {
                    name: "Posts".to_string(),
                    description: Some("Dig holes".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let updated = service
            .update_task(
                &user.id,
                &task.id,
                UpdateTaskRequest {
                    name: Some(" Gate posts ".to_string()),
                    description: Some(None),
                    assignee_id: Some(Some(user.id.clone())),
                    status: Some(TaskStatus::Progress),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Gate posts");
        assert_eq!(updated.description, None);
        assert_eq!(updated.assignee_id.as_deref(), Some(user.id.as_str()));
        assert_eq!(updated.status, TaskStatus::Progress);
        assert_eq!(updated.task_number, task.task_number);

        // Omitted fields stay as they are
        let renamed = service
            .update_task(
                &user.id,
                &task.id,
                UpdateTaskRequest {
                    name: Some("Gate".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.status, TaskStatus::Progress);
        assert_eq!(renamed.assignee_id, updated.assignee_id);

        assert!(matches!(
            service
                .update_task(
                    &user.id,
                    &task.id,
                    UpdateTaskRequest {
                        name: Some("   ".to_string()),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service
                .update_task(
                    &user.id,
                    &task.id,
                    UpdateTaskRequest {
                        assignee_id: Some(Some("nobody".to_string())),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_tag_renames_and_recolours() {
        let (service, ann) = create_test_service().await;
        let bob = service.register_user("bob@example.com", None).await.unwrap();
        let bob = service.approve_user(&bob.id, true).await.unwrap();
        let tag = service.create_tag(&ann.id, "design", None).await.unwrap();
        assert_eq!(tag.color, "#3ECF8E");

        let recoloured = service
            .update_tag(
                &ann.id,
                &tag.id,
                UpdateTagRequest {
                    color: Some("#ff0000".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(recoloured.name, "design");
        assert_eq!(recoloured.color, "#ff0000");

        let renamed = service
            .update_tag(
                &ann.id,
                &tag.id,
                UpdateTagRequest {
                    name: Some(" research ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "research");
        assert_eq!(renamed.color, "#ff0000");

        assert!(matches!(
            service
                .update_tag(
                    &ann.id,
                    &tag.id,
                    UpdateTagRequest {
                        name: Some(String::new()),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service
                .update_tag(
                    &bob.id,
                    &tag.id,
                    UpdateTagRequest {
                        name: Some("mine".to_string()),
                        ..Default::default()
                    },
                )
                .await,
            Err(AppError::Authorization(_))
        ));
        assert!(matches!(
            service
                .update_tag(&ann.id, "missing", UpdateTagRequest::default())
                .await,
            Err(AppError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_portal_access_follows_client_link() {
        let (service, user) = create_test_service().await;
        let guest = service.register_user("client@acme.test", None).await.unwrap();
        let client = service.create_client(&user.id, acme()).await.unwrap();
        let project = service.create_project(&user.id, &client.id, "Fence").await.unwrap();

        assert!(service.portal_projects(&guest.id).await.unwrap().is_empty());
        assert!(matches!(
            service.portal_entries(&guest.id, &project.id).await,
            Err(AppError::Authorization(_))
        ));

        service
            .set_portal_user(&user.id, &client.id, Some("client@acme.test"))
            .await
            .unwrap();
        let visible = service.portal_projects(&guest.id).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, project.id);
        assert!(service.portal_entries(&guest.id, &project.id).await.unwrap().is_empty());

        service.set_portal_user(&user.id, &client.id, None).await.unwrap();
        assert!(service.portal_projects(&guest.id).await.unwrap().is_empty());
    }
}
