//! Mock implementations for testing.
//!
//! In-memory implementations of the persistence traits that can be
//! configured to simulate success and failure scenarios. Rows live behind
//! a `Mutex<Vec<_>>`, ids come from an atomic counter, and list operations
//! reuse the same filter/sort logic the real repositories express in SQL.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    AppError, Attachment, AttachmentDetail, AttachmentFilter, AttachmentRepository,
    AttachmentSort, AttachmentWithUploader, Bug, BugFilter, BugHistoryEntry, BugRef,
    BugRepository, BugStatus, BugWithRefs, Comment, CommentRepository, CommentWithAuthor,
    DatabaseError, EntityId, FileStore, HistoryRepository, HistoryWithActor, MemberRepository,
    MemberRole, MemberWithUser, NewAttachment, NewBug, NewComment, NewHistoryEntry, NewMember,
    NewProject, NewUser, Project, ProjectFilter, ProjectMember, ProjectRef, ProjectRepository,
    SortOrder, UpdateBugRequest, UpdateProjectRequest, UpdateUserRequest, User, UserFilter,
    UserRef, UserRepository, UserRole, UserSummary,
};

/// Configuration for mock behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// If true, operations will fail.
    pub should_fail: bool,
    /// Custom error message for failures.
    pub error_message: Option<String>,
}

impl MockConfig {
    /// Creates a config that always succeeds.
    #[must_use]
    pub fn success() -> Self {
        Self::default()
    }

    /// Creates a config that always fails.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            should_fail: true,
            error_message: Some(message.into()),
        }
    }
}

fn fail_error(config: &MockConfig) -> AppError {
    let msg = config
        .error_message
        .clone()
        .unwrap_or_else(|| "Mock database error".to_string());
    AppError::Database(DatabaseError::Query(msg))
}

/// Deterministic timestamp `n` minutes after a fixed base, so ordering
/// assertions do not depend on wall-clock time.
pub fn stamp(n: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + n * 60, 0).unwrap()
}

/// Builds a user row with predictable fields derived from the id.
pub fn sample_user(id: EntityId) -> User {
    User {
        id,
        name: format!("User {id}"),
        email: format!("user{id}@example.com"),
        role: UserRole::Developer,
        image: None,
        created_at: stamp(id),
        updated_at: stamp(id),
    }
}

/// The summary shape joined repositories embed for a user id.
pub fn summary_for(id: EntityId) -> UserSummary {
    UserSummary {
        id,
        name: format!("User {id}"),
        email: format!("user{id}@example.com"),
        role: UserRole::Developer,
        image: None,
    }
}

pub fn sample_project(id: EntityId, owner_id: EntityId) -> Project {
    Project {
        id,
        name: format!("Project {id}"),
        key: format!("PR{id}"),
        description: None,
        status: Default::default(),
        owner_id,
        created_at: stamp(id),
        updated_at: stamp(id),
    }
}

pub fn sample_member(id: EntityId, project_id: EntityId, user_id: EntityId) -> ProjectMember {
    ProjectMember {
        id,
        project_id,
        user_id,
        role: MemberRole::Contributor,
        created_at: stamp(id),
        updated_at: stamp(id),
    }
}

pub fn sample_bug(id: EntityId, project_id: EntityId, reporter_id: EntityId) -> Bug {
    Bug {
        id,
        project_id,
        title: format!("Bug {id}"),
        description: format!("Description {id}"),
        priority: Default::default(),
        status: Default::default(),
        reporter_id,
        assignee_id: None,
        created_at: stamp(id),
        updated_at: stamp(id),
    }
}

pub fn sample_comment(id: EntityId, bug_id: EntityId, author_id: EntityId) -> Comment {
    Comment {
        id,
        bug_id,
        author_id,
        body: format!("Comment {id}"),
        created_at: stamp(id),
        updated_at: stamp(id),
    }
}

pub fn sample_attachment(id: EntityId) -> Attachment {
    Attachment {
        id,
        filename: format!("file-{id}.png"),
        stored_name: format!("1700000000000-abcdef-file-{id}.png"),
        path: format!("/uploads/1700000000000-abcdef-file-{id}.png"),
        mime: "image/png".to_string(),
        size: 1024 * id,
        issue_id: None,
        project_id: None,
        uploader_id: None,
        created_at: stamp(id),
    }
}

fn project_ref_for(id: EntityId) -> ProjectRef {
    ProjectRef {
        id,
        name: format!("Project {id}"),
        key: format!("PR{id}"),
    }
}

fn user_ref_for(id: EntityId) -> UserRef {
    UserRef {
        id,
        name: format!("User {id}"),
        email: format!("user{id}@example.com"),
    }
}

fn bug_ref_for(id: EntityId) -> BugRef {
    BugRef {
        id,
        title: format!("Bug {id}"),
        status: BugStatus::Open,
    }
}

fn next_id_after<I: Iterator<Item = EntityId>>(ids: I) -> i64 {
    ids.max().unwrap_or(0) + 1
}

/// Mock user repository backed by a `Vec`.
///
/// # Example
///
/// ```
/// use bugtrack::test_utils::{sample_user, MockUserRepository};
///
/// let mock = MockUserRepository::with_rows(vec![sample_user(1)]);
/// let failing = MockUserRepository::failing("connection refused");
/// ```
pub struct MockUserRepository {
    rows: Mutex<Vec<User>>,
    next_id: AtomicI64,
    config: MockConfig,
    call_count: AtomicU64,
}

impl MockUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    #[must_use]
    pub fn with_rows(rows: Vec<User>) -> Self {
        let next_id = next_id_after(rows.iter().map(|u| u.id));
        Self {
            rows: Mutex::new(rows),
            next_id: AtomicI64::new(next_id),
            config: MockConfig::success(),
            call_count: AtomicU64::new(0),
        }
    }

    /// Creates a mock that always fails.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            config: MockConfig::failure(message),
            call_count: AtomicU64::new(0),
        }
    }

    /// Number of times any method was called.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> Vec<User> {
        self.rows.lock().unwrap().clone()
    }

    fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.config.should_fail {
            return Err(fail_error(&self.config));
        }
        Ok(())
    }
}

impl Default for MockUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn create(&self, user: &NewUser) -> Result<User, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.email == user.email) {
            return Err(AppError::Database(DatabaseError::Duplicate(
                "users_email_key".to_string(),
            )));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let row = User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            image: user.image.clone(),
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: EntityId) -> Result<Option<User>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|u| u.email == email).cloned())
    }

    async fn list(
        &self,
        filter: &UserFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<User>, u64), AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<User> = rows.iter().filter(|u| filter.matches(u)).cloned().collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn update(
        &self,
        id: EntityId,
        patch: &UpdateUserRequest,
    ) -> Result<Option<User>, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            row.name = name.clone();
        }
        if let Some(email) = &patch.email {
            row.email = email.clone();
        }
        if let Some(role) = patch.role {
            row.role = role;
        }
        if let Some(image) = &patch.image {
            row.image = Some(image.clone());
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: EntityId) -> Result<Option<User>, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        let pos = rows.iter().position(|u| u.id == id);
        Ok(pos.map(|p| rows.remove(p)))
    }

    async fn exists(&self, id: EntityId) -> Result<bool, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().any(|u| u.id == id))
    }
}

/// Mock project repository backed by a `Vec`.
pub struct MockProjectRepository {
    rows: Mutex<Vec<Project>>,
    next_id: AtomicI64,
    config: MockConfig,
    call_count: AtomicU64,
}

impl MockProjectRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    #[must_use]
    pub fn with_rows(rows: Vec<Project>) -> Self {
        let next_id = next_id_after(rows.iter().map(|p| p.id));
        Self {
            rows: Mutex::new(rows),
            next_id: AtomicI64::new(next_id),
            config: MockConfig::success(),
            call_count: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            config: MockConfig::failure(message),
            call_count: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> Vec<Project> {
        self.rows.lock().unwrap().clone()
    }

    fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.config.should_fail {
            return Err(fail_error(&self.config));
        }
        Ok(())
    }
}

impl Default for MockProjectRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProjectRepository for MockProjectRepository {
    async fn create(&self, project: &NewProject) -> Result<Project, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|p| p.key == project.key) {
            return Err(AppError::Database(DatabaseError::Duplicate(
                "projects_key_key".to_string(),
            )));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let row = Project {
            id,
            name: project.name.clone(),
            key: project.key.clone(),
            description: project.description.clone(),
            status: project.status,
            owner_id: project.owner_id,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: EntityId) -> Result<Option<Project>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<Project>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|p| p.key == key).cloned())
    }

    async fn list(
        &self,
        filter: &ProjectFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Project>, u64), AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<Project> =
            rows.iter().filter(|p| filter.matches(p)).cloned().collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn update(
        &self,
        id: EntityId,
        patch: &UpdateProjectRequest,
    ) -> Result<Option<Project>, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            row.name = name.clone();
        }
        if let Some(key) = &patch.key {
            row.key = key.clone();
        }
        if let Some(description) = &patch.description {
            row.description = Some(description.clone());
        }
        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(owner_id) = patch.owner_id {
            row.owner_id = owner_id;
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: EntityId) -> Result<Option<Project>, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        let pos = rows.iter().position(|p| p.id == id);
        Ok(pos.map(|p| rows.remove(p)))
    }

    async fn exists(&self, id: EntityId) -> Result<bool, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().any(|p| p.id == id))
    }
}

/// Mock membership repository. Joined user fields are synthesized from the
/// user id the same way `sample_user` builds them.
pub struct MockMemberRepository {
    rows: Mutex<Vec<ProjectMember>>,
    next_id: AtomicI64,
    config: MockConfig,
    call_count: AtomicU64,
}

impl MockMemberRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    #[must_use]
    pub fn with_rows(rows: Vec<ProjectMember>) -> Self {
        let next_id = next_id_after(rows.iter().map(|m| m.id));
        Self {
            rows: Mutex::new(rows),
            next_id: AtomicI64::new(next_id),
            config: MockConfig::success(),
            call_count: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            config: MockConfig::failure(message),
            call_count: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> Vec<ProjectMember> {
        self.rows.lock().unwrap().clone()
    }

    fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.config.should_fail {
            return Err(fail_error(&self.config));
        }
        Ok(())
    }

    fn join(member: &ProjectMember) -> MemberWithUser {
        MemberWithUser {
            id: member.id,
            user_id: member.user_id,
            role: member.role,
            created_at: member.created_at,
            user: summary_for(member.user_id),
        }
    }
}

impl Default for MockMemberRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemberRepository for MockMemberRepository {
    async fn add(&self, member: &NewMember) -> Result<ProjectMember, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|m| m.project_id == member.project_id && m.user_id == member.user_id)
        {
            return Err(AppError::Database(DatabaseError::Duplicate(
                "project_members_project_id_user_id_key".to_string(),
            )));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let row = ProjectMember {
            id,
            project_id: member.project_id,
            user_id: member.user_id,
            role: member.role,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn get_with_user(&self, id: EntityId) -> Result<Option<MemberWithUser>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|m| m.id == id).map(Self::join))
    }

    async fn list_for_project(
        &self,
        project_id: EntityId,
    ) -> Result<Vec<MemberWithUser>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        let mut members: Vec<&ProjectMember> =
            rows.iter().filter(|m| m.project_id == project_id).collect();
        members.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(members.into_iter().map(Self::join).collect())
    }

    async fn find(
        &self,
        project_id: EntityId,
        user_id: EntityId,
    ) -> Result<Option<ProjectMember>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .cloned())
    }

    async fn remove(
        &self,
        project_id: EntityId,
        user_id: EntityId,
    ) -> Result<Option<ProjectMember>, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        let pos = rows
            .iter()
            .position(|m| m.project_id == project_id && m.user_id == user_id);
        Ok(pos.map(|p| rows.remove(p)))
    }
}

/// Mock bug repository. Joined project/reporter references are synthesized
/// from the foreign key ids.
pub struct MockBugRepository {
    rows: Mutex<Vec<Bug>>,
    next_id: AtomicI64,
    config: MockConfig,
    call_count: AtomicU64,
}

impl MockBugRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    #[must_use]
    pub fn with_rows(rows: Vec<Bug>) -> Self {
        let next_id = next_id_after(rows.iter().map(|b| b.id));
        Self {
            rows: Mutex::new(rows),
            next_id: AtomicI64::new(next_id),
            config: MockConfig::success(),
            call_count: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            config: MockConfig::failure(message),
            call_count: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> Vec<Bug> {
        self.rows.lock().unwrap().clone()
    }

    fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.config.should_fail {
            return Err(fail_error(&self.config));
        }
        Ok(())
    }

    fn join(bug: &Bug) -> BugWithRefs {
        BugWithRefs {
            bug: bug.clone(),
            project: project_ref_for(bug.project_id),
            reporter: user_ref_for(bug.reporter_id),
        }
    }
}

impl Default for MockBugRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BugRepository for MockBugRepository {
    async fn create(&self, bug: &NewBug) -> Result<Bug, AppError> {
        self.enter()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let row = Bug {
            id,
            project_id: bug.project_id,
            title: bug.title.clone(),
            description: bug.description.clone(),
            priority: bug.priority,
            status: bug.status,
            reporter_id: bug.reporter_id,
            assignee_id: bug.assignee_id,
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: EntityId) -> Result<Option<Bug>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|b| b.id == id).cloned())
    }

    async fn get_with_refs(&self, id: EntityId) -> Result<Option<BugWithRefs>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|b| b.id == id).map(Self::join))
    }

    async fn list(
        &self,
        filter: &BugFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<BugWithRefs>, u64), AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<&Bug> = rows.iter().filter(|b| filter.matches(b)).collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .map(Self::join)
            .collect();
        Ok((page, total))
    }

    async fn update(
        &self,
        id: EntityId,
        patch: &UpdateBugRequest,
    ) -> Result<Option<Bug>, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|b| b.id == id) else {
            return Ok(None);
        };
        if let Some(project_id) = patch.project_id {
            row.project_id = project_id;
        }
        if let Some(title) = &patch.title {
            row.title = title.clone();
        }
        if let Some(description) = &patch.description {
            row.description = description.clone();
        }
        if let Some(priority) = patch.priority {
            row.priority = priority;
        }
        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(reporter_id) = patch.reporter_id {
            row.reporter_id = reporter_id;
        }
        match patch.assignee_id {
            Some(Some(assignee_id)) => row.assignee_id = Some(assignee_id),
            Some(None) => row.assignee_id = None,
            None => {}
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: EntityId) -> Result<Option<Bug>, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        let pos = rows.iter().position(|b| b.id == id);
        Ok(pos.map(|p| rows.remove(p)))
    }

    async fn exists(&self, id: EntityId) -> Result<bool, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().any(|b| b.id == id))
    }
}

/// Mock comment repository.
pub struct MockCommentRepository {
    rows: Mutex<Vec<Comment>>,
    next_id: AtomicI64,
    config: MockConfig,
    call_count: AtomicU64,
}

impl MockCommentRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    #[must_use]
    pub fn with_rows(rows: Vec<Comment>) -> Self {
        let next_id = next_id_after(rows.iter().map(|c| c.id));
        Self {
            rows: Mutex::new(rows),
            next_id: AtomicI64::new(next_id),
            config: MockConfig::success(),
            call_count: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            config: MockConfig::failure(message),
            call_count: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> Vec<Comment> {
        self.rows.lock().unwrap().clone()
    }

    fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.config.should_fail {
            return Err(fail_error(&self.config));
        }
        Ok(())
    }

    fn join(comment: &Comment) -> CommentWithAuthor {
        CommentWithAuthor {
            comment: comment.clone(),
            author: summary_for(comment.author_id),
        }
    }
}

impl Default for MockCommentRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommentRepository for MockCommentRepository {
    async fn create(&self, comment: &NewComment) -> Result<Comment, AppError> {
        self.enter()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let row = Comment {
            id,
            bug_id: comment.bug_id,
            author_id: comment.author_id,
            body: comment.body.clone(),
            created_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn get_with_author(
        &self,
        id: EntityId,
    ) -> Result<Option<CommentWithAuthor>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|c| c.id == id).map(Self::join))
    }

    async fn list_for_bug(&self, bug_id: EntityId) -> Result<Vec<CommentWithAuthor>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        let mut comments: Vec<&Comment> = rows.iter().filter(|c| c.bug_id == bug_id).collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments.into_iter().map(Self::join).collect())
    }

    async fn update_body(&self, id: EntityId, body: &str) -> Result<Option<Comment>, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        row.body = body.to_string();
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: EntityId) -> Result<Option<Comment>, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        let pos = rows.iter().position(|c| c.id == id);
        Ok(pos.map(|p| rows.remove(p)))
    }
}

/// Mock audit-trail repository. Recorded entries are kept for assertions.
pub struct MockHistoryRepository {
    rows: Mutex<Vec<BugHistoryEntry>>,
    recorded: Mutex<Vec<NewHistoryEntry>>,
    next_id: AtomicI64,
    config: MockConfig,
    call_count: AtomicU64,
}

impl MockHistoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    #[must_use]
    pub fn with_rows(rows: Vec<BugHistoryEntry>) -> Self {
        let next_id = next_id_after(rows.iter().map(|h| h.id));
        Self {
            rows: Mutex::new(rows),
            recorded: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(next_id),
            config: MockConfig::success(),
            call_count: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            recorded: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            config: MockConfig::failure(message),
            call_count: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Entries passed to `record`, in order.
    pub fn recorded(&self) -> Vec<NewHistoryEntry> {
        self.recorded.lock().unwrap().clone()
    }

    fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.config.should_fail {
            return Err(fail_error(&self.config));
        }
        Ok(())
    }
}

impl Default for MockHistoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryRepository for MockHistoryRepository {
    async fn record(&self, entries: &[NewHistoryEntry]) -> Result<(), AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        let mut recorded = self.recorded.lock().unwrap();
        for entry in entries {
            recorded.push(entry.clone());
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            rows.push(BugHistoryEntry {
                id,
                bug_id: entry.bug_id,
                user_id: entry.user_id,
                field: entry.field.clone(),
                old_value: entry.old_value.clone(),
                new_value: entry.new_value.clone(),
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn list_for_bug(&self, bug_id: EntityId) -> Result<Vec<HistoryWithActor>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        let mut entries: Vec<&BugHistoryEntry> =
            rows.iter().filter(|h| h.bug_id == bug_id).collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(entries
            .into_iter()
            .map(|entry| HistoryWithActor {
                entry: entry.clone(),
                user: entry.user_id.map(summary_for),
            })
            .collect())
    }
}

fn compare_attachments(a: &Attachment, b: &Attachment, sort: AttachmentSort) -> std::cmp::Ordering {
    match sort {
        AttachmentSort::CreatedAt => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
        AttachmentSort::Filename => a
            .filename
            .to_lowercase()
            .cmp(&b.filename.to_lowercase())
            .then(a.id.cmp(&b.id)),
        AttachmentSort::Size => a.size.cmp(&b.size).then(a.id.cmp(&b.id)),
    }
}

/// Mock attachment repository.
pub struct MockAttachmentRepository {
    rows: Mutex<Vec<Attachment>>,
    next_id: AtomicI64,
    config: MockConfig,
    call_count: AtomicU64,
}

impl MockAttachmentRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_rows(Vec::new())
    }

    #[must_use]
    pub fn with_rows(rows: Vec<Attachment>) -> Self {
        let next_id = next_id_after(rows.iter().map(|a| a.id));
        Self {
            rows: Mutex::new(rows),
            next_id: AtomicI64::new(next_id),
            config: MockConfig::success(),
            call_count: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            config: MockConfig::failure(message),
            call_count: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn rows(&self) -> Vec<Attachment> {
        self.rows.lock().unwrap().clone()
    }

    fn enter(&self) -> Result<(), AppError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.config.should_fail {
            return Err(fail_error(&self.config));
        }
        Ok(())
    }

    fn paged(
        mut matched: Vec<Attachment>,
        sort: AttachmentSort,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> (Vec<Attachment>, u64) {
        matched.sort_by(|a, b| {
            let ord = compare_attachments(a, b, sort);
            match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        let total = matched.len() as u64;
        let page = matched
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        (page, total)
    }

    fn join(attachment: Attachment) -> AttachmentWithUploader {
        let uploader = attachment.uploader_id.map(summary_for);
        AttachmentWithUploader {
            attachment,
            uploader,
        }
    }
}

impl Default for MockAttachmentRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttachmentRepository for MockAttachmentRepository {
    async fn create(&self, attachment: &NewAttachment) -> Result<Attachment, AppError> {
        self.enter()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let row = Attachment {
            id,
            filename: attachment.filename.clone(),
            stored_name: attachment.stored_name.clone(),
            path: attachment.path.clone(),
            mime: attachment.mime.clone(),
            size: attachment.size,
            issue_id: attachment.issue_id,
            project_id: attachment.project_id,
            uploader_id: attachment.uploader_id,
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: EntityId) -> Result<Option<Attachment>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|a| a.id == id).cloned())
    }

    async fn get_detail(&self, id: EntityId) -> Result<Option<AttachmentDetail>, AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().find(|a| a.id == id).map(|a| AttachmentDetail {
            attachment: a.clone(),
            uploader: a.uploader_id.map(summary_for),
            issue: a.issue_id.map(bug_ref_for),
            project: a.project_id.map(project_ref_for),
        }))
    }

    async fn list(
        &self,
        filter: &AttachmentFilter,
        sort: AttachmentSort,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Attachment>, u64), AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        let matched: Vec<Attachment> =
            rows.iter().filter(|a| filter.matches(a)).cloned().collect();
        Ok(Self::paged(matched, sort, order, limit, offset))
    }

    async fn list_for_bug(
        &self,
        bug_id: EntityId,
        sort: AttachmentSort,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<AttachmentWithUploader>, u64), AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        let matched: Vec<Attachment> = rows
            .iter()
            .filter(|a| a.issue_id == Some(bug_id))
            .cloned()
            .collect();
        let (page, total) = Self::paged(matched, sort, order, limit, offset);
        Ok((page.into_iter().map(Self::join).collect(), total))
    }

    async fn list_for_project(
        &self,
        project_id: EntityId,
        sort: AttachmentSort,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<AttachmentWithUploader>, u64), AppError> {
        self.enter()?;
        let rows = self.rows.lock().unwrap();
        let matched: Vec<Attachment> = rows
            .iter()
            .filter(|a| a.project_id == Some(project_id))
            .cloned()
            .collect();
        let (page, total) = Self::paged(matched, sort, order, limit, offset);
        Ok((page.into_iter().map(Self::join).collect(), total))
    }

    async fn delete(&self, id: EntityId) -> Result<Option<Attachment>, AppError> {
        self.enter()?;
        let mut rows = self.rows.lock().unwrap();
        let pos = rows.iter().position(|a| a.id == id);
        Ok(pos.map(|p| rows.remove(p)))
    }
}

/// Mock file store that records saves and removals instead of touching disk.
pub struct MockFileStore {
    saved: Mutex<Vec<(String, usize)>>,
    removed: Mutex<Vec<String>>,
    fail_save: AtomicBool,
    fail_remove: AtomicBool,
}

impl MockFileStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
            fail_save: AtomicBool::new(false),
            fail_remove: AtomicBool::new(false),
        }
    }

    pub fn set_fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::Relaxed);
    }

    /// Stored names and byte lengths passed to `save`, in order.
    pub fn saved(&self) -> Vec<(String, usize)> {
        self.saved.lock().unwrap().clone()
    }

    /// Stored names passed to `remove`, in order.
    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

impl Default for MockFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStore for MockFileStore {
    async fn save(&self, stored_name: &str, bytes: &[u8]) -> Result<(), AppError> {
        if self.fail_save.load(Ordering::Relaxed) {
            return Err(AppError::Internal("mock file store write failure".to_string()));
        }
        self.saved
            .lock()
            .unwrap()
            .push((stored_name.to_string(), bytes.len()));
        Ok(())
    }

    async fn remove(&self, stored_name: &str) -> Result<(), AppError> {
        if self.fail_remove.load(Ordering::Relaxed) {
            return Err(AppError::Internal("mock file store remove failure".to_string()));
        }
        self.removed.lock().unwrap().push(stored_name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BugPriority;

    #[tokio::test]
    async fn test_mock_user_create_and_get() {
        let mock = MockUserRepository::new();
        let created = mock
            .create(&NewUser {
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                role: UserRole::Admin,
                image: None,
            })
            .await
            .unwrap();
        assert_eq!(created.id, 1);

        let fetched = mock.get(created.id).await.unwrap();
        assert_eq!(fetched.unwrap().email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_mock_user_duplicate_email() {
        let mock = MockUserRepository::with_rows(vec![sample_user(1)]);
        let err = mock
            .create(&NewUser {
                name: "Copy".to_string(),
                email: "user1@example.com".to_string(),
                role: UserRole::Developer,
                image: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Database(DatabaseError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_user_failure_and_call_count() {
        let mock = MockUserRepository::failing("connection refused");
        assert!(mock.get(1).await.is_err());
        assert!(mock.exists(1).await.is_err());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_user_list_is_newest_first() {
        let mock =
            MockUserRepository::with_rows(vec![sample_user(1), sample_user(2), sample_user(3)]);
        let (page, total) = mock.list(&UserFilter::default(), 10, 0).await.unwrap();
        assert_eq!(total, 3);
        let ids: Vec<i64> = page.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_mock_member_unique_pair() {
        let mock = MockMemberRepository::new();
        let member = NewMember {
            project_id: 1,
            user_id: 2,
            role: MemberRole::Viewer,
        };
        mock.add(&member).await.unwrap();
        let err = mock.add(&member).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Database(DatabaseError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_member_list_is_oldest_first() {
        let mock = MockMemberRepository::with_rows(vec![
            sample_member(2, 1, 20),
            sample_member(1, 1, 10),
            sample_member(3, 2, 30),
        ]);
        let members = mock.list_for_project(1).await.unwrap();
        let ids: Vec<i64> = members.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(members[0].user.email, "user10@example.com");
    }

    #[tokio::test]
    async fn test_mock_bug_update_applies_double_option() {
        let mut seeded = sample_bug(1, 1, 1);
        seeded.assignee_id = Some(7);
        let mock = MockBugRepository::with_rows(vec![seeded]);

        let unassign = UpdateBugRequest {
            assignee_id: Some(None),
            ..Default::default()
        };
        let updated = mock.update(1, &unassign).await.unwrap().unwrap();
        assert_eq!(updated.assignee_id, None);

        let untouched = UpdateBugRequest {
            priority: Some(BugPriority::High),
            ..Default::default()
        };
        let updated = mock.update(1, &untouched).await.unwrap().unwrap();
        assert_eq!(updated.assignee_id, None);
        assert_eq!(updated.priority, BugPriority::High);
    }

    #[tokio::test]
    async fn test_mock_history_records_entries() {
        let mock = MockHistoryRepository::new();
        mock.record(&[NewHistoryEntry {
            bug_id: 1,
            user_id: None,
            field: "status".to_string(),
            old_value: Some("open".to_string()),
            new_value: Some("resolved".to_string()),
        }])
        .await
        .unwrap();

        assert_eq!(mock.recorded().len(), 1);
        let listed = mock.list_for_bug(1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].entry.field, "status");
        assert!(listed[0].user.is_none());
    }

    #[tokio::test]
    async fn test_mock_attachment_sorting() {
        let mut a = sample_attachment(1);
        a.filename = "zebra.png".to_string();
        let mut b = sample_attachment(2);
        b.filename = "Alpha.png".to_string();
        let mock = MockAttachmentRepository::with_rows(vec![a, b]);

        let (rows, _) = mock
            .list(
                &AttachmentFilter::default(),
                AttachmentSort::Filename,
                SortOrder::Asc,
                10,
                0,
            )
            .await
            .unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, vec!["Alpha.png", "zebra.png"]);

        let (rows, _) = mock
            .list(
                &AttachmentFilter::default(),
                AttachmentSort::Size,
                SortOrder::Desc,
                10,
                0,
            )
            .await
            .unwrap();
        assert_eq!(rows[0].size, 2048);
    }

    #[tokio::test]
    async fn test_mock_file_store_records_operations() {
        let store = MockFileStore::new();
        store.save("a.bin", &[1, 2, 3]).await.unwrap();
        store.remove("a.bin").await.unwrap();

        assert_eq!(store.saved(), vec![("a.bin".to_string(), 3)]);
        assert_eq!(store.removed(), vec!["a.bin".to_string()]);

        store.set_fail_remove(true);
        assert!(store.remove("b.bin").await.is_err());
    }
}
