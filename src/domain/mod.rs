//! Domain layer: entities, list contracts, errors, and repository traits.
//!
//! This layer has no knowledge of HTTP or SQL. Everything here is plain
//! data and trait contracts that the outer layers implement.

pub mod error;
pub mod pagination;
pub mod traits;
pub mod types;

pub use error::{AppError, ConfigError, DatabaseError, Reference, Resource};
pub use pagination::{
    AttachmentFilter, AttachmentListQuery, AttachmentSort, BugFilter, BugListQuery, ListWindow,
    Page, Pagination, ProjectFilter, ProjectListQuery, ScopedAttachmentQuery, SortOrder,
    UserFilter, UserListQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, SCOPED_PAGE_SIZE,
};
pub use traits::{
    AttachmentRepository, BugRepository, CommentRepository, FileStore, HistoryRepository,
    MemberRepository, ProjectRepository, UserRepository,
};
pub use types::{
    AddMemberRequest, Attachment, AttachmentDetail, AttachmentWithUploader, Bug, BugHistoryEntry,
    BugPriority, BugRef, BugStatus, BugWithRefs, Comment, CommentWithAuthor, CreateBugRequest,
    CreateCommentRequest, CreateProjectRequest, CreateUserRequest, DataBody, DeletedBody,
    EntityId, ErrorBody, HealthPayload, HistoryWithActor, MemberRole, MemberWithUser,
    NewAttachment, NewBug, NewComment, NewHistoryEntry, NewMember, NewProject, NewUser, Project,
    ProjectMember, ProjectRef, ProjectStatus, RemoveMemberRequest, UpdateBugRequest,
    UpdateCommentRequest, UpdateProjectRequest, UpdateUserRequest, User, UserRef, UserRole,
    UserSummary, is_valid_project_key,
};
