//! Project membership operations.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AddMemberRequest, AppError, DatabaseError, EntityId, MemberRepository, MemberWithUser,
    NewMember, ProjectMember, ProjectRepository, RemoveMemberRequest, Resource, UserRepository,
};

/// Orchestrates membership checks and the (project, user) uniqueness rule.
#[derive(Clone)]
pub struct MemberService {
    members: Arc<dyn MemberRepository>,
    projects: Arc<dyn ProjectRepository>,
    users: Arc<dyn UserRepository>,
}

impl MemberService {
    #[must_use]
    pub fn new(
        members: Arc<dyn MemberRepository>,
        projects: Arc<dyn ProjectRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            members,
            projects,
            users,
        }
    }

    /// All members of a project with their joined users, oldest first.
    #[instrument(skip(self))]
    pub async fn list(&self, project_id: EntityId) -> Result<Vec<MemberWithUser>, AppError> {
        if !self.projects.exists(project_id).await? {
            return Err(AppError::NotFound(Resource::Project));
        }
        self.members.list_for_project(project_id).await
    }

    /// Adds a user to a project.
    ///
    /// # Errors
    ///
    /// `NotFound` when the project or user does not exist,
    /// `MemberExists` when the pair is already present.
    #[instrument(skip(self, payload), fields(user_id = payload.user_id))]
    pub async fn add(
        &self,
        project_id: EntityId,
        payload: AddMemberRequest,
    ) -> Result<MemberWithUser, AppError> {
        payload.validate().map_err(|err| {
            warn!(error = %err, "invalid add member request");
            AppError::from(err)
        })?;

        if !self.projects.exists(project_id).await? {
            return Err(AppError::NotFound(Resource::Project));
        }
        if !self.users.exists(payload.user_id).await? {
            return Err(AppError::NotFound(Resource::User));
        }
        if self.members.find(project_id, payload.user_id).await?.is_some() {
            return Err(AppError::MemberExists);
        }

        let new_member = NewMember {
            project_id,
            user_id: payload.user_id,
            role: payload.role,
        };
        let member = self
            .members
            .add(&new_member)
            .await
            .map_err(map_constraint_violation)?;
        info!(member_id = member.id, project_id, "member added");

        self.members
            .get_with_user(member.id)
            .await?
            .ok_or_else(|| AppError::Internal("member row missing after insert".to_string()))
    }

    /// Removes a membership identified by the user id in the request body.
    #[instrument(skip(self, payload), fields(user_id = payload.user_id))]
    pub async fn remove(
        &self,
        project_id: EntityId,
        payload: RemoveMemberRequest,
    ) -> Result<ProjectMember, AppError> {
        payload.validate().map_err(|err| {
            warn!(error = %err, "invalid remove member request");
            AppError::from(err)
        })?;

        let member = self
            .members
            .remove(project_id, payload.user_id)
            .await?
            .ok_or(AppError::NotFound(Resource::Member))?;
        info!(member_id = member.id, project_id, "member removed");
        Ok(member)
    }
}

/// Maps store rejections from the membership table's constraints back to
/// the entity-specific codes; which foreign key fired is read from the
/// constraint name.
fn map_constraint_violation(err: AppError) -> AppError {
    match err {
        AppError::Database(DatabaseError::Duplicate(_)) => AppError::MemberExists,
        AppError::Database(DatabaseError::ForeignKey(constraint)) => {
            if constraint.contains("user") {
                AppError::NotFound(Resource::User)
            } else {
                AppError::NotFound(Resource::Project)
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MemberRole;
    use crate::test_utils::{
        sample_member, sample_project, sample_user, MockMemberRepository, MockProjectRepository,
        MockUserRepository,
    };

    fn service_with(
        members: MockMemberRepository,
        projects: MockProjectRepository,
        users: MockUserRepository,
    ) -> MemberService {
        MemberService::new(Arc::new(members), Arc::new(projects), Arc::new(users))
    }

    fn add_request(user_id: EntityId) -> AddMemberRequest {
        AddMemberRequest {
            user_id,
            role: MemberRole::Contributor,
        }
    }

    #[tokio::test]
    async fn test_list_requires_existing_project() {
        let service = service_with(
            MockMemberRepository::new(),
            MockProjectRepository::new(),
            MockUserRepository::new(),
        );
        let err = service.list(1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::Project)));
    }

    #[tokio::test]
    async fn test_list_returns_joined_members() {
        let service = service_with(
            MockMemberRepository::with_rows(vec![sample_member(1, 1, 5)]),
            MockProjectRepository::with_rows(vec![sample_project(1, 1)]),
            MockUserRepository::new(),
        );
        let members = service.list(1).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user.id, 5);
    }

    #[tokio::test]
    async fn test_add_returns_member_with_user() {
        let service = service_with(
            MockMemberRepository::new(),
            MockProjectRepository::with_rows(vec![sample_project(1, 1)]),
            MockUserRepository::with_rows(vec![sample_user(5)]),
        );
        let member = service.add(1, add_request(5)).await.unwrap();
        assert_eq!(member.user_id, 5);
        assert_eq!(member.role, MemberRole::Contributor);
        assert_eq!(member.user.email, "user5@example.com");
    }

    #[tokio::test]
    async fn test_add_rejects_unknown_user() {
        let service = service_with(
            MockMemberRepository::new(),
            MockProjectRepository::with_rows(vec![sample_project(1, 1)]),
            MockUserRepository::new(),
        );
        let err = service.add(1, add_request(9)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::User)));
    }

    #[tokio::test]
    async fn test_add_rejects_existing_pair() {
        let service = service_with(
            MockMemberRepository::with_rows(vec![sample_member(1, 1, 5)]),
            MockProjectRepository::with_rows(vec![sample_project(1, 1)]),
            MockUserRepository::with_rows(vec![sample_user(5)]),
        );
        let err = service.add(1, add_request(5)).await.unwrap_err();
        assert!(matches!(err, AppError::MemberExists));
    }

    #[tokio::test]
    async fn test_remove_returns_removed_row() {
        let service = service_with(
            MockMemberRepository::with_rows(vec![sample_member(1, 1, 5)]),
            MockProjectRepository::new(),
            MockUserRepository::new(),
        );
        let removed = service
            .remove(1, RemoveMemberRequest { user_id: 5 })
            .await
            .unwrap();
        assert_eq!(removed.user_id, 5);
    }

    #[tokio::test]
    async fn test_remove_missing_membership_is_not_found() {
        let service = service_with(
            MockMemberRepository::new(),
            MockProjectRepository::new(),
            MockUserRepository::new(),
        );
        let err = service
            .remove(1, RemoveMemberRequest { user_id: 5 })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::Member)));
    }

    #[test]
    fn test_constraint_mapping_picks_entity_from_name() {
        let err = map_constraint_violation(AppError::Database(DatabaseError::ForeignKey(
            "project_members_user_id_fkey".to_string(),
        )));
        assert!(matches!(err, AppError::NotFound(Resource::User)));

        let err = map_constraint_violation(AppError::Database(DatabaseError::ForeignKey(
            "project_members_project_id_fkey".to_string(),
        )));
        assert!(matches!(err, AppError::NotFound(Resource::Project)));
    }
}
