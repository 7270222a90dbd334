//! Project operations.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    is_valid_project_key, AppError, CreateProjectRequest, DatabaseError, EntityId, NewProject,
    Page, Project, ProjectListQuery, ProjectRepository, Reference, Resource,
    UpdateProjectRequest, UserRepository,
};

/// Orchestrates project validation, key uniqueness, and owner checks.
#[derive(Clone)]
pub struct ProjectService {
    projects: Arc<dyn ProjectRepository>,
    users: Arc<dyn UserRepository>,
}

impl ProjectService {
    #[must_use]
    pub fn new(projects: Arc<dyn ProjectRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { projects, users }
    }

    /// Creates a project. The key is uppercased during normalization and
    /// must be 2-5 ASCII letters; the owner must exist.
    ///
    /// # Errors
    ///
    /// `AppError::Validation` for malformed fields, `MissingReference` for
    /// an unknown owner, `DuplicateKey` when the key is taken.
    #[instrument(skip(self, payload), fields(key = %payload.key))]
    pub async fn create(&self, mut payload: CreateProjectRequest) -> Result<Project, AppError> {
        payload.normalize();
        payload.validate().map_err(|err| {
            warn!(error = %err, "invalid create project request");
            AppError::from(err)
        })?;
        if !is_valid_project_key(&payload.key) {
            return Err(AppError::invalid_field(
                "key",
                "Key must be 2-5 uppercase letters",
            ));
        }

        if !self.users.exists(payload.owner_id).await? {
            return Err(AppError::MissingReference(Reference::Owner));
        }
        if self.projects.find_by_key(&payload.key).await?.is_some() {
            return Err(AppError::DuplicateKey);
        }

        let new_project = NewProject {
            name: payload.name,
            key: payload.key,
            description: payload.description,
            status: payload.status.unwrap_or_default(),
            owner_id: payload.owner_id,
        };
        let project = self
            .projects
            .create(&new_project)
            .await
            .map_err(map_constraint_violation)?;
        info!(project_id = project.id, key = %project.key, "project created");
        Ok(project)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: EntityId) -> Result<Project, AppError> {
        self.projects
            .get(id)
            .await?
            .ok_or(AppError::NotFound(Resource::Project))
    }

    /// Lists projects matching the query's status/search filters, newest first.
    #[instrument(skip(self, query))]
    pub async fn list(&self, query: ProjectListQuery) -> Result<Page<Project>, AppError> {
        let window = query.window();
        let filter = query.filter();
        let (projects, total) = self
            .projects
            .list(&filter, window.limit(), window.offset())
            .await?;
        Ok(Page::new(projects, window.pagination(total)))
    }

    /// Applies a partial update. A changed key is re-validated and checked
    /// for uniqueness excluding this project's own row; a changed owner
    /// must exist.
    #[instrument(skip(self, payload))]
    pub async fn update(
        &self,
        id: EntityId,
        mut payload: UpdateProjectRequest,
    ) -> Result<Project, AppError> {
        payload.normalize();
        payload.validate().map_err(|err| {
            warn!(error = %err, "invalid update project request");
            AppError::from(err)
        })?;
        if payload.is_empty() {
            return Err(AppError::invalid_field("body", "No fields to update"));
        }

        if let Some(key) = &payload.key {
            if !is_valid_project_key(key) {
                return Err(AppError::invalid_field(
                    "key",
                    "Key must be 2-5 uppercase letters",
                ));
            }
            if let Some(existing) = self.projects.find_by_key(key).await? {
                if existing.id != id {
                    return Err(AppError::DuplicateKey);
                }
            }
        }
        if let Some(owner_id) = payload.owner_id {
            if !self.users.exists(owner_id).await? {
                return Err(AppError::MissingReference(Reference::Owner));
            }
        }

        let project = self
            .projects
            .update(id, &payload)
            .await
            .map_err(map_constraint_violation)?
            .ok_or(AppError::NotFound(Resource::Project))?;
        info!(project_id = project.id, "project updated");
        Ok(project)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: EntityId) -> Result<Project, AppError> {
        let project = self
            .projects
            .delete(id)
            .await?
            .ok_or(AppError::NotFound(Resource::Project))?;
        info!(project_id = project.id, key = %project.key, "project deleted");
        Ok(project)
    }
}

/// Store-level constraint violations map to the same codes the pre-checks
/// produce, so races between check and write stay observable as conflicts.
fn map_constraint_violation(err: AppError) -> AppError {
    match err {
        AppError::Database(DatabaseError::Duplicate(_)) => AppError::DuplicateKey,
        AppError::Database(DatabaseError::ForeignKey(_)) => {
            AppError::MissingReference(Reference::Owner)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProjectStatus;
    use crate::test_utils::{
        sample_project, sample_user, MockProjectRepository, MockUserRepository,
    };

    fn service_with(
        projects: MockProjectRepository,
        users: MockUserRepository,
    ) -> ProjectService {
        ProjectService::new(Arc::new(projects), Arc::new(users))
    }

    fn request(name: &str, key: &str, owner_id: EntityId) -> CreateProjectRequest {
        CreateProjectRequest {
            name: name.to_string(),
            key: key.to_string(),
            description: None,
            status: None,
            owner_id,
        }
    }

    #[tokio::test]
    async fn test_create_uppercases_key_and_defaults_status() {
        let service = service_with(
            MockProjectRepository::new(),
            MockUserRepository::with_rows(vec![sample_user(1)]),
        );
        let project = service.create(request("Demo", "dem", 1)).await.unwrap();
        assert_eq!(project.key, "DEM");
        assert_eq!(project.status, ProjectStatus::Active);
    }

    #[tokio::test]
    async fn test_create_rejects_malformed_key() {
        let service = service_with(
            MockProjectRepository::new(),
            MockUserRepository::with_rows(vec![sample_user(1)]),
        );
        let err = service.create(request("Demo", "D3M", 1)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_owner() {
        let service = service_with(MockProjectRepository::new(), MockUserRepository::new());
        let err = service.create(request("Demo", "DEM", 9)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::MissingReference(Reference::Owner)
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_key() {
        let mut existing = sample_project(1, 1);
        existing.key = "DEM".to_string();
        let service = service_with(
            MockProjectRepository::with_rows(vec![existing]),
            MockUserRepository::with_rows(vec![sample_user(1)]),
        );
        let err = service.create(request("Demo", "DEM", 1)).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey));
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let mut archived = sample_project(2, 1);
        archived.status = ProjectStatus::Archived;
        let service = service_with(
            MockProjectRepository::with_rows(vec![sample_project(1, 1), archived]),
            MockUserRepository::new(),
        );

        let query = ProjectListQuery {
            status: Some("archived".to_string()),
            ..Default::default()
        };
        let page = service.list(query).await.unwrap();
        assert_eq!(page.pagination.total, 1);
        assert_eq!(page.data[0].id, 2);
    }

    #[tokio::test]
    async fn test_update_key_uniqueness_excludes_own_row() {
        let mut first = sample_project(1, 1);
        first.key = "ONE".to_string();
        let mut second = sample_project(2, 1);
        second.key = "TWO".to_string();
        let service = service_with(
            MockProjectRepository::with_rows(vec![first, second]),
            MockUserRepository::new(),
        );

        let own = UpdateProjectRequest {
            key: Some("one".to_string()),
            ..Default::default()
        };
        assert!(service.update(1, own).await.is_ok());

        let taken = UpdateProjectRequest {
            key: Some("TWO".to_string()),
            ..Default::default()
        };
        let err = service.update(1, taken).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey));
    }

    #[tokio::test]
    async fn test_update_requires_at_least_one_field() {
        let service = service_with(
            MockProjectRepository::with_rows(vec![sample_project(1, 1)]),
            MockUserRepository::new(),
        );
        let err = service
            .update(1, UpdateProjectRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_project_is_not_found() {
        let service = service_with(MockProjectRepository::new(), MockUserRepository::new());
        let err = service.delete(5).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::Project)));
    }

    #[tokio::test]
    async fn test_store_duplicate_maps_to_conflict() {
        // Pre-check passes against an empty pre-seeded view, the store
        // itself reports the duplicate.
        let mut existing = sample_project(1, 1);
        existing.key = "DEM".to_string();
        let projects = MockProjectRepository::with_rows(vec![existing]);
        let service = service_with(projects, MockUserRepository::with_rows(vec![sample_user(1)]));

        let err = service.create(request("Demo", "DEM", 1)).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateKey));
    }
}
