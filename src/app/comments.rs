//! Bug comment operations.

use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::domain::{
    AppError, BugRepository, Comment, CommentRepository, CommentWithAuthor,
    CreateCommentRequest, EntityId, NewComment, Resource, UpdateCommentRequest, UserRepository,
};

/// Orchestrates comment validation and author/bug existence checks.
#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    bugs: Arc<dyn BugRepository>,
    users: Arc<dyn UserRepository>,
}

impl CommentService {
    #[must_use]
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        bugs: Arc<dyn BugRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            comments,
            bugs,
            users,
        }
    }

    /// All comments on a bug with joined authors, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_bug(
        &self,
        bug_id: EntityId,
    ) -> Result<Vec<CommentWithAuthor>, AppError> {
        if !self.bugs.exists(bug_id).await? {
            return Err(AppError::NotFound(Resource::Bug));
        }
        self.comments.list_for_bug(bug_id).await
    }

    /// Adds a comment to a bug and returns it with the joined author.
    #[instrument(skip(self, payload), fields(author_id = payload.author_id))]
    pub async fn create(
        &self,
        bug_id: EntityId,
        mut payload: CreateCommentRequest,
    ) -> Result<CommentWithAuthor, AppError> {
        payload.normalize();
        payload.validate().map_err(|err| {
            warn!(error = %err, "invalid create comment request");
            AppError::from(err)
        })?;

        if !self.bugs.exists(bug_id).await? {
            return Err(AppError::NotFound(Resource::Bug));
        }
        if !self.users.exists(payload.author_id).await? {
            return Err(AppError::NotFound(Resource::User));
        }

        let new_comment = NewComment {
            bug_id,
            author_id: payload.author_id,
            body: payload.body,
        };
        let comment = self.comments.create(&new_comment).await?;
        info!(comment_id = comment.id, bug_id, "comment created");

        self.comments
            .get_with_author(comment.id)
            .await?
            .ok_or_else(|| AppError::Internal("comment row missing after insert".to_string()))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: EntityId) -> Result<CommentWithAuthor, AppError> {
        self.comments
            .get_with_author(id)
            .await?
            .ok_or(AppError::NotFound(Resource::Comment))
    }

    /// Replaces a comment body.
    #[instrument(skip(self, payload))]
    pub async fn update(
        &self,
        id: EntityId,
        mut payload: UpdateCommentRequest,
    ) -> Result<Comment, AppError> {
        payload.normalize();
        payload.validate().map_err(|err| {
            warn!(error = %err, "invalid update comment request");
            AppError::from(err)
        })?;

        let comment = self
            .comments
            .update_body(id, &payload.body)
            .await?
            .ok_or(AppError::NotFound(Resource::Comment))?;
        info!(comment_id = comment.id, "comment updated");
        Ok(comment)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: EntityId) -> Result<Comment, AppError> {
        let comment = self
            .comments
            .delete(id)
            .await?
            .ok_or(AppError::NotFound(Resource::Comment))?;
        info!(comment_id = comment.id, "comment deleted");
        Ok(comment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        sample_bug, sample_comment, sample_user, MockBugRepository, MockCommentRepository,
        MockUserRepository,
    };

    fn service_with(
        comments: MockCommentRepository,
        bugs: MockBugRepository,
        users: MockUserRepository,
    ) -> CommentService {
        CommentService::new(Arc::new(comments), Arc::new(bugs), Arc::new(users))
    }

    fn request(author_id: EntityId, body: &str) -> CreateCommentRequest {
        CreateCommentRequest {
            author_id,
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_returns_comment_with_author() {
        let service = service_with(
            MockCommentRepository::new(),
            MockBugRepository::with_rows(vec![sample_bug(1, 1, 1)]),
            MockUserRepository::with_rows(vec![sample_user(3)]),
        );
        let comment = service
            .create(1, request(3, "  Reproduced on main.  "))
            .await
            .unwrap();
        assert_eq!(comment.comment.body, "Reproduced on main.");
        assert_eq!(comment.author.id, 3);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_body() {
        let service = service_with(
            MockCommentRepository::new(),
            MockBugRepository::with_rows(vec![sample_bug(1, 1, 1)]),
            MockUserRepository::with_rows(vec![sample_user(3)]),
        );
        let err = service.create(1, request(3, "   ")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_create_requires_existing_bug() {
        let service = service_with(
            MockCommentRepository::new(),
            MockBugRepository::new(),
            MockUserRepository::with_rows(vec![sample_user(3)]),
        );
        let err = service.create(9, request(3, "hello")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::Bug)));
    }

    #[tokio::test]
    async fn test_create_requires_existing_author() {
        let service = service_with(
            MockCommentRepository::new(),
            MockBugRepository::with_rows(vec![sample_bug(1, 1, 1)]),
            MockUserRepository::new(),
        );
        let err = service.create(1, request(9, "hello")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::User)));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let service = service_with(
            MockCommentRepository::with_rows(vec![
                sample_comment(1, 1, 2),
                sample_comment(2, 1, 3),
                sample_comment(3, 2, 2),
            ]),
            MockBugRepository::with_rows(vec![sample_bug(1, 1, 1)]),
            MockUserRepository::new(),
        );
        let comments = service.list_for_bug(1).await.unwrap();
        let ids: Vec<EntityId> = comments.iter().map(|c| c.comment.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_update_replaces_body() {
        let service = service_with(
            MockCommentRepository::with_rows(vec![sample_comment(1, 1, 2)]),
            MockBugRepository::new(),
            MockUserRepository::new(),
        );
        let comment = service
            .update(
                1,
                UpdateCommentRequest {
                    body: "Edited".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(comment.body, "Edited");
    }

    #[tokio::test]
    async fn test_update_missing_comment_is_not_found() {
        let service = service_with(
            MockCommentRepository::new(),
            MockBugRepository::new(),
            MockUserRepository::new(),
        );
        let err = service
            .update(
                9,
                UpdateCommentRequest {
                    body: "Edited".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::Comment)));
    }

    #[tokio::test]
    async fn test_delete_returns_removed_row() {
        let service = service_with(
            MockCommentRepository::with_rows(vec![sample_comment(1, 1, 2)]),
            MockBugRepository::new(),
            MockUserRepository::new(),
        );
        let comment = service.delete(1).await.unwrap();
        assert_eq!(comment.id, 1);

        let err = service.delete(1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(Resource::Comment)));
    }
}
