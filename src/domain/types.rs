use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Identifier type for all persisted entities.
pub type EntityId = i64;

/// Role assigned to a user account.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    #[default]
    Developer,
    Tester,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Manager => "manager",
            UserRole::Developer => "developer",
            UserRole::Tester => "tester",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(UserRole::Admin),
            "manager" => Ok(UserRole::Manager),
            "developer" => Ok(UserRole::Developer),
            "tester" => Ok(UserRole::Tester),
            _ => Err(()),
        }
    }
}

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
        }
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "archived" => Ok(ProjectStatus::Archived),
            _ => Err(()),
        }
    }
}

/// Role a user holds within a project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Owner,
    Maintainer,
    Contributor,
    Viewer,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Maintainer => "maintainer",
            MemberRole::Contributor => "contributor",
            MemberRole::Viewer => "viewer",
        }
    }
}

impl std::str::FromStr for MemberRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(MemberRole::Owner),
            "maintainer" => Ok(MemberRole::Maintainer),
            "contributor" => Ok(MemberRole::Contributor),
            "viewer" => Ok(MemberRole::Viewer),
            _ => Err(()),
        }
    }
}

/// Severity of a bug.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BugPriority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl BugPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            BugPriority::Low => "low",
            BugPriority::Medium => "medium",
            BugPriority::High => "high",
            BugPriority::Critical => "critical",
        }
    }
}

impl std::str::FromStr for BugPriority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(BugPriority::Low),
            "medium" => Ok(BugPriority::Medium),
            "high" => Ok(BugPriority::High),
            "critical" => Ok(BugPriority::Critical),
            _ => Err(()),
        }
    }
}

/// Workflow state of a bug.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BugStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl BugStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BugStatus::Open => "open",
            BugStatus::InProgress => "in_progress",
            BugStatus::Resolved => "resolved",
            BugStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for BugStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(BugStatus::Open),
            "in_progress" => Ok(BugStatus::InProgress),
            "resolved" => Ok(BugStatus::Resolved),
            "closed" => Ok(BugStatus::Closed),
            _ => Err(()),
        }
    }
}

/// A registered user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A project that bugs are filed against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: EntityId,
    pub name: String,
    pub key: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub owner_id: EntityId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's membership in a project. Unique per (project, user).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMember {
    pub id: EntityId,
    pub project_id: EntityId,
    pub user_id: EntityId,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A tracked bug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bug {
    pub id: EntityId,
    pub project_id: EntityId,
    pub title: String,
    pub description: String,
    pub priority: BugPriority,
    pub status: BugStatus,
    pub reporter_id: EntityId,
    pub assignee_id: Option<EntityId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment on a bug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: EntityId,
    pub bug_id: EntityId,
    pub author_id: EntityId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One field-level change in a bug's audit trail. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BugHistoryEntry {
    pub id: EntityId,
    pub bug_id: EntityId,
    pub user_id: Option<EntityId>,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An uploaded file linked to a bug and/or project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: EntityId,
    pub filename: String,
    pub stored_name: String,
    pub path: String,
    pub mime: String,
    pub size: i64,
    pub issue_id: Option<EntityId>,
    pub project_id: Option<EntityId>,
    pub uploader_id: Option<EntityId>,
    pub created_at: DateTime<Utc>,
}

/// Minimal user reference embedded in other resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: EntityId,
    pub name: String,
    pub email: String,
}

/// User reference with role and avatar, embedded in member and comment rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: EntityId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub image: Option<String>,
}

/// Minimal project reference embedded in bug rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRef {
    pub id: EntityId,
    pub name: String,
    pub key: String,
}

/// Minimal bug reference embedded in attachment detail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BugRef {
    pub id: EntityId,
    pub title: String,
    pub status: BugStatus,
}

/// Bug row with its joined project and reporter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BugWithRefs {
    #[serde(flatten)]
    pub bug: Bug,
    pub project: ProjectRef,
    pub reporter: UserRef,
}

/// Membership row with its joined user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberWithUser {
    pub id: EntityId,
    pub user_id: EntityId,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
    pub user: UserSummary,
}

/// Comment row with its joined author.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentWithAuthor {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: UserSummary,
}

/// History row with the user who made the change, when still known.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryWithActor {
    #[serde(flatten)]
    pub entry: BugHistoryEntry,
    pub user: Option<UserSummary>,
}

/// Attachment row with its joined uploader.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentWithUploader {
    #[serde(flatten)]
    pub attachment: Attachment,
    pub uploader: Option<UserSummary>,
}

/// Attachment row with every joined reference, returned by the detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentDetail {
    #[serde(flatten)]
    pub attachment: Attachment,
    pub uploader: Option<UserSummary>,
    pub issue: Option<BugRef>,
    pub project: Option<ProjectRef>,
}

/// Deserializes a present-but-possibly-null field into `Some(None)`,
/// keeping it distinct from an absent field (`None`).
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Request payload for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub role: Option<UserRole>,
    #[validate(url)]
    pub image: Option<String>,
}

impl CreateUserRequest {
    /// Trims the name and lowercases the email before validation.
    pub fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
    }
}

/// Request payload for updating a user. All fields optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub role: Option<UserRole>,
    #[validate(url)]
    pub image: Option<String>,
}

impl UpdateUserRequest {
    pub fn normalize(&mut self) {
        if let Some(name) = &self.name {
            self.name = Some(name.trim().to_string());
        }
        if let Some(email) = &self.email {
            self.email = Some(email.trim().to_lowercase());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.role.is_none() && self.image.is_none()
    }
}

/// True when `key` is 2-5 uppercase ASCII letters. Keys are uppercased
/// during normalization, so lowercase input is accepted upstream.
pub fn is_valid_project_key(key: &str) -> bool {
    (2..=5).contains(&key.len()) && key.chars().all(|c| c.is_ascii_uppercase())
}

/// Request payload for creating a project.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 2, max = 5))]
    pub key: String,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    #[validate(range(min = 1))]
    pub owner_id: EntityId,
}

impl CreateProjectRequest {
    /// Trims text fields and uppercases the key, mirroring what clients
    /// are allowed to send. Must run before `validate()`.
    pub fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.key = self.key.trim().to_uppercase();
        if let Some(description) = &self.description {
            self.description = Some(description.trim().to_string());
        }
    }
}

/// Request payload for updating a project. All fields optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 2, max = 5))]
    pub key: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    #[validate(range(min = 1))]
    pub owner_id: Option<EntityId>,
}

impl UpdateProjectRequest {
    pub fn normalize(&mut self) {
        if let Some(name) = &self.name {
            self.name = Some(name.trim().to_string());
        }
        if let Some(key) = &self.key {
            self.key = Some(key.trim().to_uppercase());
        }
        if let Some(description) = &self.description {
            self.description = Some(description.trim().to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.key.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.owner_id.is_none()
    }
}

/// Request payload for adding a project member.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    #[validate(range(min = 1))]
    pub user_id: EntityId,
    pub role: MemberRole,
}

/// Request payload for removing a project member.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMemberRequest {
    #[validate(range(min = 1))]
    pub user_id: EntityId,
}

/// Request payload for filing a bug.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBugRequest {
    #[validate(range(min = 1))]
    pub project_id: EntityId,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    pub priority: Option<BugPriority>,
    pub status: Option<BugStatus>,
    #[validate(range(min = 1))]
    pub reporter_id: EntityId,
    #[validate(range(min = 1))]
    pub assignee_id: Option<EntityId>,
}

impl CreateBugRequest {
    pub fn normalize(&mut self) {
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
    }
}

/// Request payload for updating a bug. All fields optional; `assigneeId`
/// distinguishes "field absent" from an explicit null (unassign).
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBugRequest {
    #[validate(range(min = 1))]
    pub project_id: Option<EntityId>,
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    pub priority: Option<BugPriority>,
    pub status: Option<BugStatus>,
    #[validate(range(min = 1))]
    pub reporter_id: Option<EntityId>,
    #[serde(default, deserialize_with = "double_option")]
    pub assignee_id: Option<Option<EntityId>>,
}

impl UpdateBugRequest {
    pub fn normalize(&mut self) {
        if let Some(title) = &self.title {
            self.title = Some(title.trim().to_string());
        }
        if let Some(description) = &self.description {
            self.description = Some(description.trim().to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.project_id.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.reporter_id.is_none()
            && self.assignee_id.is_none()
    }
}

/// Request payload for commenting on a bug.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[validate(range(min = 1))]
    pub author_id: EntityId,
    #[validate(length(min = 1))]
    pub body: String,
}

impl CreateCommentRequest {
    /// Trims surrounding whitespace so whitespace-only bodies fail validation.
    pub fn normalize(&mut self) {
        self.body = self.body.trim().to_string();
    }
}

/// Request payload for editing a comment body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1))]
    pub body: String,
}

impl UpdateCommentRequest {
    pub fn normalize(&mut self) {
        self.body = self.body.trim().to_string();
    }
}

/// Normalized user insert, defaults already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub image: Option<String>,
}

/// Normalized project insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub key: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub owner_id: EntityId,
}

/// Normalized membership insert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewMember {
    pub project_id: EntityId,
    pub user_id: EntityId,
    pub role: MemberRole,
}

/// Normalized bug insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBug {
    pub project_id: EntityId,
    pub title: String,
    pub description: String,
    pub priority: BugPriority,
    pub status: BugStatus,
    pub reporter_id: EntityId,
    pub assignee_id: Option<EntityId>,
}

/// Normalized comment insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub bug_id: EntityId,
    pub author_id: EntityId,
    pub body: String,
}

/// One audit-trail row to append when a bug field changes.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub bug_id: EntityId,
    pub user_id: Option<EntityId>,
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Normalized attachment insert, produced after the file is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttachment {
    pub filename: String,
    pub stored_name: String,
    pub path: String,
    pub mime: String,
    pub size: i64,
    pub issue_id: Option<EntityId>,
    pub project_id: Option<EntityId>,
    pub uploader_id: Option<EntityId>,
}

/// Success envelope: `{ "data": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataBody<T> {
    pub data: T,
}

impl<T> DataBody<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Deletion envelope: `{ "message": ..., "data": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedBody<T> {
    pub message: String,
    pub data: T,
}

impl<T> DeletedBody<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

/// Failure envelope with a stable machine-readable code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Liveness payload served by the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthPayload {
    pub status: String,
    pub uptime: f64,
    pub timestamp: i64,
}

impl HealthPayload {
    pub fn ok(uptime_secs: f64) -> Self {
        Self {
            status: "ok".to_string(),
            uptime: uptime_secs,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}
