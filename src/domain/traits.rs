//! Domain traits defining contracts for persistence and file storage.

use async_trait::async_trait;

use super::error::AppError;
use super::pagination::{
    AttachmentFilter, AttachmentSort, BugFilter, ProjectFilter, SortOrder, UserFilter,
};
use super::types::{
    Attachment, AttachmentDetail, AttachmentWithUploader, Bug, BugWithRefs, Comment,
    CommentWithAuthor, EntityId, HistoryWithActor, MemberWithUser, NewAttachment, NewBug,
    NewComment, NewHistoryEntry, NewMember, NewProject, NewUser, Project, ProjectMember,
    UpdateBugRequest, UpdateProjectRequest, UpdateUserRequest, User,
};

/// Persistence operations for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user
    async fn create(&self, user: &NewUser) -> Result<User, AppError>;

    /// Fetch a user by id
    async fn get(&self, id: EntityId) -> Result<Option<User>, AppError>;

    /// Fetch a user by normalized email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// List matching users newest-first, plus the total match count
    async fn list(
        &self,
        filter: &UserFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<User>, u64), AppError>;

    /// Apply a partial update, returning the new row if it existed
    async fn update(
        &self,
        id: EntityId,
        patch: &UpdateUserRequest,
    ) -> Result<Option<User>, AppError>;

    /// Delete a user, returning the removed row if it existed
    async fn delete(&self, id: EntityId) -> Result<Option<User>, AppError>;

    /// Cheap existence probe for reference checks
    async fn exists(&self, id: EntityId) -> Result<bool, AppError>;
}

/// Persistence operations for projects.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Insert a new project
    async fn create(&self, project: &NewProject) -> Result<Project, AppError>;

    /// Fetch a project by id
    async fn get(&self, id: EntityId) -> Result<Option<Project>, AppError>;

    /// Fetch a project by its uppercase key
    async fn find_by_key(&self, key: &str) -> Result<Option<Project>, AppError>;

    /// List matching projects newest-first, plus the total match count
    async fn list(
        &self,
        filter: &ProjectFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Project>, u64), AppError>;

    /// Apply a partial update, returning the new row if it existed
    async fn update(
        &self,
        id: EntityId,
        patch: &UpdateProjectRequest,
    ) -> Result<Option<Project>, AppError>;

    /// Delete a project, returning the removed row if it existed
    async fn delete(&self, id: EntityId) -> Result<Option<Project>, AppError>;

    /// Cheap existence probe for reference checks
    async fn exists(&self, id: EntityId) -> Result<bool, AppError>;
}

/// Persistence operations for project membership.
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Insert a membership row
    async fn add(&self, member: &NewMember) -> Result<ProjectMember, AppError>;

    /// Fetch one membership with its joined user
    async fn get_with_user(&self, id: EntityId) -> Result<Option<MemberWithUser>, AppError>;

    /// All members of a project with joined users, oldest-first
    async fn list_for_project(
        &self,
        project_id: EntityId,
    ) -> Result<Vec<MemberWithUser>, AppError>;

    /// Fetch a membership by (project, user)
    async fn find(
        &self,
        project_id: EntityId,
        user_id: EntityId,
    ) -> Result<Option<ProjectMember>, AppError>;

    /// Remove a membership by (project, user), returning the removed row
    async fn remove(
        &self,
        project_id: EntityId,
        user_id: EntityId,
    ) -> Result<Option<ProjectMember>, AppError>;
}

/// Persistence operations for bugs.
#[async_trait]
pub trait BugRepository: Send + Sync {
    /// Insert a new bug
    async fn create(&self, bug: &NewBug) -> Result<Bug, AppError>;

    /// Fetch a bug row by id
    async fn get(&self, id: EntityId) -> Result<Option<Bug>, AppError>;

    /// Fetch a bug with its joined project and reporter
    async fn get_with_refs(&self, id: EntityId) -> Result<Option<BugWithRefs>, AppError>;

    /// List matching bugs newest-first with joins, plus the total match count
    async fn list(
        &self,
        filter: &BugFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<BugWithRefs>, u64), AppError>;

    /// Apply a partial update, returning the new row if it existed
    async fn update(&self, id: EntityId, patch: &UpdateBugRequest)
        -> Result<Option<Bug>, AppError>;

    /// Delete a bug, returning the removed row if it existed
    async fn delete(&self, id: EntityId) -> Result<Option<Bug>, AppError>;

    /// Cheap existence probe for reference checks
    async fn exists(&self, id: EntityId) -> Result<bool, AppError>;
}

/// Persistence operations for bug comments.
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Insert a new comment
    async fn create(&self, comment: &NewComment) -> Result<Comment, AppError>;

    /// Fetch one comment with its joined author
    async fn get_with_author(&self, id: EntityId)
        -> Result<Option<CommentWithAuthor>, AppError>;

    /// All comments on a bug with joined authors, newest-first
    async fn list_for_bug(&self, bug_id: EntityId) -> Result<Vec<CommentWithAuthor>, AppError>;

    /// Replace a comment body, returning the new row if it existed
    async fn update_body(&self, id: EntityId, body: &str) -> Result<Option<Comment>, AppError>;

    /// Delete a comment, returning the removed row if it existed
    async fn delete(&self, id: EntityId) -> Result<Option<Comment>, AppError>;
}

/// Append-only audit trail of bug field changes.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Append one row per changed field
    async fn record(&self, entries: &[NewHistoryEntry]) -> Result<(), AppError>;

    /// All history rows for a bug with joined actors, newest-first
    async fn list_for_bug(&self, bug_id: EntityId) -> Result<Vec<HistoryWithActor>, AppError>;
}

/// Persistence operations for file attachments.
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    /// Insert attachment metadata after the file is stored
    async fn create(&self, attachment: &NewAttachment) -> Result<Attachment, AppError>;

    /// Fetch an attachment row by id
    async fn get(&self, id: EntityId) -> Result<Option<Attachment>, AppError>;

    /// Fetch an attachment with joined uploader, bug, and project
    async fn get_detail(&self, id: EntityId) -> Result<Option<AttachmentDetail>, AppError>;

    /// List matching attachments, plus the total match count
    async fn list(
        &self,
        filter: &AttachmentFilter,
        sort: AttachmentSort,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Attachment>, u64), AppError>;

    /// Attachments on a bug with joined uploaders, plus the total count
    async fn list_for_bug(
        &self,
        bug_id: EntityId,
        sort: AttachmentSort,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<AttachmentWithUploader>, u64), AppError>;

    /// Attachments on a project with joined uploaders, plus the total count
    async fn list_for_project(
        &self,
        project_id: EntityId,
        sort: AttachmentSort,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<AttachmentWithUploader>, u64), AppError>;

    /// Delete an attachment row, returning the removed row if it existed
    async fn delete(&self, id: EntityId) -> Result<Option<Attachment>, AppError>;
}

/// Blob storage for uploaded files.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Persist file bytes under the generated stored name
    async fn save(&self, stored_name: &str, bytes: &[u8]) -> Result<(), AppError>;

    /// Remove a stored file. Removing a missing file is not an error.
    async fn remove(&self, stored_name: &str) -> Result<(), AppError>;
}
