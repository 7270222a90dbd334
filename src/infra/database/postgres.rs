//! PostgreSQL persistence for every repository trait.
//!
//! One pooled client implements all of them, so production wiring hands
//! the same `Arc` to each `Repositories` slot. Queries are runtime-checked
//! `sqlx::query` calls with explicit row mappers; enum columns are stored
//! as their snake_case text form.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgPoolOptions, postgres::PgRow};
use std::time::Duration;
use tracing::{info, instrument};

use crate::domain::{
    AppError, Attachment, AttachmentDetail, AttachmentFilter, AttachmentRepository,
    AttachmentSort, AttachmentWithUploader, Bug, BugFilter, BugHistoryEntry, BugRef,
    BugRepository, BugWithRefs, Comment, CommentRepository, CommentWithAuthor, DatabaseError,
    EntityId, HistoryRepository, HistoryWithActor, MemberRepository, MemberRole, MemberWithUser,
    NewAttachment, NewBug, NewComment, NewHistoryEntry, NewMember, NewProject, NewUser, Project,
    ProjectFilter, ProjectMember, ProjectRef, ProjectRepository, SortOrder, UpdateBugRequest,
    UpdateProjectRequest, UpdateUserRequest, User, UserFilter, UserRef, UserRepository,
    UserSummary,
};

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

/// PostgreSQL client with connection pooling.
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Create a new PostgreSQL client with custom configuration
    pub async fn new(database_url: &str, config: PostgresConfig) -> Result<Self, AppError> {
        info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(config.max_lifetime)
            .connect(database_url)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Connection(e.to_string())))?;
        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client with default configuration
    pub async fn with_defaults(database_url: &str) -> Result<Self, AppError> {
        Self::new(database_url, PostgresConfig::default()).await
    }

    /// Run database migrations using sqlx migrate
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(DatabaseError::Migration(e.to_string())))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying connection pool (for testing)
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Escapes LIKE wildcards so a search term only ever matches literally.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn order_keyword(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    }
}

fn attachment_order_clause(sort: AttachmentSort, order: SortOrder) -> String {
    let column = match sort {
        AttachmentSort::CreatedAt => "created_at",
        AttachmentSort::Filename => "filename",
        AttachmentSort::Size => "size",
    };
    // Ties fall back to id so pages stay stable.
    format!("ORDER BY a.{column} {dir}, a.id {dir}", dir = order_keyword(order))
}

fn row_to_user(row: &PgRow) -> User {
    let role: String = row.get("role");
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role: role.parse().unwrap_or_default(),
        image: row.get("image"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_project(row: &PgRow) -> Project {
    let status: String = row.get("status");
    Project {
        id: row.get("id"),
        name: row.get("name"),
        key: row.get("key"),
        description: row.get("description"),
        status: status.parse().unwrap_or_default(),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_member(row: &PgRow) -> ProjectMember {
    let role: String = row.get("role");
    ProjectMember {
        id: row.get("id"),
        project_id: row.get("project_id"),
        user_id: row.get("user_id"),
        role: role.parse().unwrap_or(MemberRole::Viewer),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_bug(row: &PgRow) -> Bug {
    let priority: String = row.get("priority");
    let status: String = row.get("status");
    Bug {
        id: row.get("id"),
        project_id: row.get("project_id"),
        title: row.get("title"),
        description: row.get("description"),
        priority: priority.parse().unwrap_or_default(),
        status: status.parse().unwrap_or_default(),
        reporter_id: row.get("reporter_id"),
        assignee_id: row.get("assignee_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_comment(row: &PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        bug_id: row.get("bug_id"),
        author_id: row.get("author_id"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_attachment(row: &PgRow) -> Attachment {
    Attachment {
        id: row.get("id"),
        filename: row.get("filename"),
        stored_name: row.get("stored_name"),
        path: row.get("path"),
        mime: row.get("mime"),
        size: row.get("size"),
        issue_id: row.get("issue_id"),
        project_id: row.get("project_id"),
        uploader_id: row.get("uploader_id"),
        created_at: row.get("created_at"),
    }
}

/// Reads a joined user summary from `u_`-prefixed columns. Returns `None`
/// when the LEFT JOIN found no row.
fn row_to_user_summary(row: &PgRow) -> Option<UserSummary> {
    let id: Option<EntityId> = row.get("u_id");
    let role: Option<String> = row.get("u_role");
    id.map(|id| UserSummary {
        id,
        name: row.get("u_name"),
        email: row.get("u_email"),
        role: role.and_then(|r| r.parse().ok()).unwrap_or_default(),
        image: row.get("u_image"),
    })
}

/// Same columns read through an inner join, where the user must exist.
fn row_to_joined_user_summary(row: &PgRow) -> UserSummary {
    let role: String = row.get("u_role");
    UserSummary {
        id: row.get("u_id"),
        name: row.get("u_name"),
        email: row.get("u_email"),
        role: role.parse().unwrap_or_default(),
        image: row.get("u_image"),
    }
}

const USER_COLUMNS: &str = "id, name, email, role, image, created_at, updated_at";
const PROJECT_COLUMNS: &str = "id, name, key, description, status, owner_id, created_at, updated_at";
const BUG_COLUMNS: &str =
    "id, project_id, title, description, priority, status, reporter_id, assignee_id, created_at, updated_at";
const MEMBER_COLUMNS: &str = "id, project_id, user_id, role, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, bug_id, author_id, body, created_at, updated_at";
const ATTACHMENT_COLUMNS: &str =
    "filename, stored_name, path, mime, size, issue_id, project_id, uploader_id, created_at";

#[async_trait]
impl UserRepository for PostgresClient {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create(&self, user: &NewUser) -> Result<User, AppError> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (name, email, role, image) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(&user.image)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_user(&row))
    }

    #[instrument(skip(self))]
    async fn get(&self, id: EntityId) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    #[instrument(skip(self, filter))]
    async fn list(
        &self,
        filter: &UserFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<User>, u64), AppError> {
        let role = filter.role.map(|r| r.as_str());
        let search = filter.search.as_deref().map(escape_like);

        let predicate = "($1::text IS NULL OR role = $1) \
             AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%' OR email ILIKE '%' || $2 || '%')";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {predicate}"))
            .bind(role)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {predicate} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(role)
        .bind(&search)
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.iter().map(row_to_user).collect(), total as u64))
    }

    #[instrument(skip(self, patch))]
    async fn update(
        &self,
        id: EntityId,
        patch: &UpdateUserRequest,
    ) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE users SET \
                name = COALESCE($2, name), \
                email = COALESCE($3, email), \
                role = COALESCE($4, role), \
                image = COALESCE($5, image), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.email)
        .bind(patch.role.map(|r| r.as_str()))
        .bind(&patch.image)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: EntityId) -> Result<Option<User>, AppError> {
        let row = sqlx::query(&format!(
            "DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_user))
    }

    #[instrument(skip(self))]
    async fn exists(&self, id: EntityId) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl ProjectRepository for PostgresClient {
    #[instrument(skip(self, project), fields(key = %project.key))]
    async fn create(&self, project: &NewProject) -> Result<Project, AppError> {
        let row = sqlx::query(&format!(
            "INSERT INTO projects (name, key, description, status, owner_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(&project.name)
        .bind(&project.key)
        .bind(&project.description)
        .bind(project.status.as_str())
        .bind(project.owner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_project(&row))
    }

    #[instrument(skip(self))]
    async fn get(&self, id: EntityId) -> Result<Option<Project>, AppError> {
        let row = sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_project))
    }

    #[instrument(skip(self))]
    async fn find_by_key(&self, key: &str) -> Result<Option<Project>, AppError> {
        let row = sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE key = $1"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_project))
    }

    #[instrument(skip(self, filter))]
    async fn list(
        &self,
        filter: &ProjectFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Project>, u64), AppError> {
        let status = filter.status.map(|s| s.as_str());
        let search = filter.search.as_deref().map(escape_like);

        let predicate = "($1::text IS NULL OR status = $1) \
             AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%' OR key ILIKE '%' || $2 || '%')";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM projects WHERE {predicate}"))
                .bind(status)
                .bind(&search)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE {predicate} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(status)
        .bind(&search)
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.iter().map(row_to_project).collect(), total as u64))
    }

    #[instrument(skip(self, patch))]
    async fn update(
        &self,
        id: EntityId,
        patch: &UpdateProjectRequest,
    ) -> Result<Option<Project>, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE projects SET \
                name = COALESCE($2, name), \
                key = COALESCE($3, key), \
                description = COALESCE($4, description), \
                status = COALESCE($5, status), \
                owner_id = COALESCE($6, owner_id), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.key)
        .bind(&patch.description)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_project))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: EntityId) -> Result<Option<Project>, AppError> {
        let row = sqlx::query(&format!(
            "DELETE FROM projects WHERE id = $1 RETURNING {PROJECT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_project))
    }

    #[instrument(skip(self))]
    async fn exists(&self, id: EntityId) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl MemberRepository for PostgresClient {
    #[instrument(skip(self, member))]
    async fn add(&self, member: &NewMember) -> Result<ProjectMember, AppError> {
        let row = sqlx::query(&format!(
            "INSERT INTO project_members (project_id, user_id, role) \
             VALUES ($1, $2, $3) RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(member.project_id)
        .bind(member.user_id)
        .bind(member.role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_member(&row))
    }

    #[instrument(skip(self))]
    async fn get_with_user(&self, id: EntityId) -> Result<Option<MemberWithUser>, AppError> {
        let row = sqlx::query(
            "SELECT m.id, m.user_id, m.role, m.created_at, \
                    u.id AS u_id, u.name AS u_name, u.email AS u_email, \
                    u.role AS u_role, u.image AS u_image \
             FROM project_members m JOIN users u ON u.id = m.user_id \
             WHERE m.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_member_with_user))
    }

    #[instrument(skip(self))]
    async fn list_for_project(
        &self,
        project_id: EntityId,
    ) -> Result<Vec<MemberWithUser>, AppError> {
        let rows = sqlx::query(
            "SELECT m.id, m.user_id, m.role, m.created_at, \
                    u.id AS u_id, u.name AS u_name, u.email AS u_email, \
                    u.role AS u_role, u.image AS u_image \
             FROM project_members m JOIN users u ON u.id = m.user_id \
             WHERE m.project_id = $1 \
             ORDER BY m.created_at ASC, m.id ASC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_member_with_user).collect())
    }

    #[instrument(skip(self))]
    async fn find(
        &self,
        project_id: EntityId,
        user_id: EntityId,
    ) -> Result<Option<ProjectMember>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM project_members WHERE project_id = $1 AND user_id = $2"
        ))
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_member))
    }

    #[instrument(skip(self))]
    async fn remove(
        &self,
        project_id: EntityId,
        user_id: EntityId,
    ) -> Result<Option<ProjectMember>, AppError> {
        let row = sqlx::query(&format!(
            "DELETE FROM project_members WHERE project_id = $1 AND user_id = $2 \
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_member))
    }
}

fn row_to_member_with_user(row: &PgRow) -> MemberWithUser {
    let role: String = row.get("role");
    MemberWithUser {
        id: row.get("id"),
        user_id: row.get("user_id"),
        role: role.parse().unwrap_or(MemberRole::Viewer),
        created_at: row.get("created_at"),
        user: row_to_joined_user_summary(row),
    }
}

fn row_to_bug_with_refs(row: &PgRow) -> BugWithRefs {
    BugWithRefs {
        bug: row_to_bug(row),
        project: ProjectRef {
            id: row.get("p_id"),
            name: row.get("p_name"),
            key: row.get("p_key"),
        },
        reporter: UserRef {
            id: row.get("r_id"),
            name: row.get("r_name"),
            email: row.get("r_email"),
        },
    }
}

const BUG_JOIN_COLUMNS: &str = "b.id, b.project_id, b.title, b.description, b.priority, \
     b.status, b.reporter_id, b.assignee_id, b.created_at, b.updated_at, \
     p.id AS p_id, p.name AS p_name, p.key AS p_key, \
     r.id AS r_id, r.name AS r_name, r.email AS r_email";

#[async_trait]
impl BugRepository for PostgresClient {
    #[instrument(skip(self, bug), fields(project_id = bug.project_id))]
    async fn create(&self, bug: &NewBug) -> Result<Bug, AppError> {
        let row = sqlx::query(&format!(
            "INSERT INTO bugs (project_id, title, description, priority, status, reporter_id, assignee_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {BUG_COLUMNS}"
        ))
        .bind(bug.project_id)
        .bind(&bug.title)
        .bind(&bug.description)
        .bind(bug.priority.as_str())
        .bind(bug.status.as_str())
        .bind(bug.reporter_id)
        .bind(bug.assignee_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_bug(&row))
    }

    #[instrument(skip(self))]
    async fn get(&self, id: EntityId) -> Result<Option<Bug>, AppError> {
        let row = sqlx::query(&format!("SELECT {BUG_COLUMNS} FROM bugs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_bug))
    }

    #[instrument(skip(self))]
    async fn get_with_refs(&self, id: EntityId) -> Result<Option<BugWithRefs>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {BUG_JOIN_COLUMNS} FROM bugs b \
             JOIN projects p ON p.id = b.project_id \
             JOIN users r ON r.id = b.reporter_id \
             WHERE b.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_bug_with_refs))
    }

    #[instrument(skip(self, filter))]
    async fn list(
        &self,
        filter: &BugFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<BugWithRefs>, u64), AppError> {
        let status = filter.status.map(|s| s.as_str());
        let priority = filter.priority.map(|p| p.as_str());
        let search = filter.search.as_deref().map(escape_like);

        let predicate = "($1::text IS NULL OR b.status = $1) \
             AND ($2::text IS NULL OR b.priority = $2) \
             AND ($3::bigint IS NULL OR b.project_id = $3) \
             AND ($4::bigint IS NULL OR b.assignee_id = $4) \
             AND ($5::text IS NULL OR b.title ILIKE '%' || $5 || '%' \
                  OR b.description ILIKE '%' || $5 || '%')";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM bugs b WHERE {predicate}"))
                .bind(status)
                .bind(priority)
                .bind(filter.project_id)
                .bind(filter.assignee_id)
                .bind(&search)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {BUG_JOIN_COLUMNS} FROM bugs b \
             JOIN projects p ON p.id = b.project_id \
             JOIN users r ON r.id = b.reporter_id \
             WHERE {predicate} \
             ORDER BY b.created_at DESC, b.id DESC LIMIT $6 OFFSET $7"
        ))
        .bind(status)
        .bind(priority)
        .bind(filter.project_id)
        .bind(filter.assignee_id)
        .bind(&search)
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.iter().map(row_to_bug_with_refs).collect(), total as u64))
    }

    #[instrument(skip(self, patch))]
    async fn update(
        &self,
        id: EntityId,
        patch: &UpdateBugRequest,
    ) -> Result<Option<Bug>, AppError> {
        // assigneeId is tri-state: absent leaves the column alone, an
        // explicit null unassigns. COALESCE cannot express that, so the
        // "touch it at all" flag rides in a separate bind.
        let touch_assignee = patch.assignee_id.is_some();
        let assignee = patch.assignee_id.flatten();

        let row = sqlx::query(&format!(
            "UPDATE bugs SET \
                project_id = COALESCE($2, project_id), \
                title = COALESCE($3, title), \
                description = COALESCE($4, description), \
                priority = COALESCE($5, priority), \
                status = COALESCE($6, status), \
                reporter_id = COALESCE($7, reporter_id), \
                assignee_id = CASE WHEN $8 THEN $9 ELSE assignee_id END, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {BUG_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.project_id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(patch.priority.map(|p| p.as_str()))
        .bind(patch.status.map(|s| s.as_str()))
        .bind(patch.reporter_id)
        .bind(touch_assignee)
        .bind(assignee)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_bug))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: EntityId) -> Result<Option<Bug>, AppError> {
        let row = sqlx::query(&format!(
            "DELETE FROM bugs WHERE id = $1 RETURNING {BUG_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_bug))
    }

    #[instrument(skip(self))]
    async fn exists(&self, id: EntityId) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM bugs WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

fn row_to_comment_with_author(row: &PgRow) -> CommentWithAuthor {
    CommentWithAuthor {
        comment: row_to_comment(row),
        author: row_to_joined_user_summary(row),
    }
}

#[async_trait]
impl CommentRepository for PostgresClient {
    #[instrument(skip(self, comment), fields(bug_id = comment.bug_id))]
    async fn create(&self, comment: &NewComment) -> Result<Comment, AppError> {
        let row = sqlx::query(&format!(
            "INSERT INTO comments (bug_id, author_id, body) \
             VALUES ($1, $2, $3) RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(comment.bug_id)
        .bind(comment.author_id)
        .bind(&comment.body)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_comment(&row))
    }

    #[instrument(skip(self))]
    async fn get_with_author(
        &self,
        id: EntityId,
    ) -> Result<Option<CommentWithAuthor>, AppError> {
        let row = sqlx::query(
            "SELECT c.id, c.bug_id, c.author_id, c.body, c.created_at, c.updated_at, \
                    u.id AS u_id, u.name AS u_name, u.email AS u_email, \
                    u.role AS u_role, u.image AS u_image \
             FROM comments c JOIN users u ON u.id = c.author_id \
             WHERE c.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_comment_with_author))
    }

    #[instrument(skip(self))]
    async fn list_for_bug(&self, bug_id: EntityId) -> Result<Vec<CommentWithAuthor>, AppError> {
        let rows = sqlx::query(
            "SELECT c.id, c.bug_id, c.author_id, c.body, c.created_at, c.updated_at, \
                    u.id AS u_id, u.name AS u_name, u.email AS u_email, \
                    u.role AS u_role, u.image AS u_image \
             FROM comments c JOIN users u ON u.id = c.author_id \
             WHERE c.bug_id = $1 \
             ORDER BY c.created_at DESC, c.id DESC",
        )
        .bind(bug_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_comment_with_author).collect())
    }

    #[instrument(skip(self, body))]
    async fn update_body(&self, id: EntityId, body: &str) -> Result<Option<Comment>, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE comments SET body = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(body)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_comment))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: EntityId) -> Result<Option<Comment>, AppError> {
        let row = sqlx::query(&format!(
            "DELETE FROM comments WHERE id = $1 RETURNING {COMMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_comment))
    }
}

fn row_to_history_with_actor(row: &PgRow) -> HistoryWithActor {
    HistoryWithActor {
        entry: BugHistoryEntry {
            id: row.get("id"),
            bug_id: row.get("bug_id"),
            user_id: row.get("user_id"),
            field: row.get("field"),
            old_value: row.get("old_value"),
            new_value: row.get("new_value"),
            created_at: row.get("created_at"),
        },
        user: row_to_user_summary(row),
    }
}

#[async_trait]
impl HistoryRepository for PostgresClient {
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn record(&self, entries: &[NewHistoryEntry]) -> Result<(), AppError> {
        for entry in entries {
            sqlx::query(
                "INSERT INTO bug_history (bug_id, user_id, field, old_value, new_value) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(entry.bug_id)
            .bind(entry.user_id)
            .bind(&entry.field)
            .bind(&entry.old_value)
            .bind(&entry.new_value)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_for_bug(&self, bug_id: EntityId) -> Result<Vec<HistoryWithActor>, AppError> {
        let rows = sqlx::query(
            "SELECT h.id, h.bug_id, h.user_id, h.field, h.old_value, h.new_value, h.created_at, \
                    u.id AS u_id, u.name AS u_name, u.email AS u_email, \
                    u.role AS u_role, u.image AS u_image \
             FROM bug_history h LEFT JOIN users u ON u.id = h.user_id \
             WHERE h.bug_id = $1 \
             ORDER BY h.created_at DESC, h.id DESC",
        )
        .bind(bug_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_history_with_actor).collect())
    }
}

fn row_to_attachment_with_uploader(row: &PgRow) -> AttachmentWithUploader {
    AttachmentWithUploader {
        attachment: row_to_attachment(row),
        uploader: row_to_user_summary(row),
    }
}

const ATTACHMENT_JOIN_COLUMNS: &str = "a.id, a.filename, a.stored_name, a.path, a.mime, a.size, \
     a.issue_id, a.project_id, a.uploader_id, a.created_at, \
     u.id AS u_id, u.name AS u_name, u.email AS u_email, u.role AS u_role, u.image AS u_image";

#[async_trait]
impl AttachmentRepository for PostgresClient {
    #[instrument(skip(self, attachment), fields(filename = %attachment.filename))]
    async fn create(&self, attachment: &NewAttachment) -> Result<Attachment, AppError> {
        let row = sqlx::query(&format!(
            "INSERT INTO attachments ({ATTACHMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW()) \
             RETURNING id, {ATTACHMENT_COLUMNS}"
        ))
        .bind(&attachment.filename)
        .bind(&attachment.stored_name)
        .bind(&attachment.path)
        .bind(&attachment.mime)
        .bind(attachment.size)
        .bind(attachment.issue_id)
        .bind(attachment.project_id)
        .bind(attachment.uploader_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_attachment(&row))
    }

    #[instrument(skip(self))]
    async fn get(&self, id: EntityId) -> Result<Option<Attachment>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT id, {ATTACHMENT_COLUMNS} FROM attachments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_attachment))
    }

    #[instrument(skip(self))]
    async fn get_detail(&self, id: EntityId) -> Result<Option<AttachmentDetail>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {ATTACHMENT_JOIN_COLUMNS}, \
                    b.id AS b_id, b.title AS b_title, b.status AS b_status, \
                    p.id AS p_id, p.name AS p_name, p.key AS p_key \
             FROM attachments a \
             LEFT JOIN users u ON u.id = a.uploader_id \
             LEFT JOIN bugs b ON b.id = a.issue_id \
             LEFT JOIN projects p ON p.id = a.project_id \
             WHERE a.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let bug_id: Option<EntityId> = row.get("b_id");
            let project_id: Option<EntityId> = row.get("p_id");
            AttachmentDetail {
                attachment: row_to_attachment(&row),
                uploader: row_to_user_summary(&row),
                issue: bug_id.map(|id| {
                    let status: String = row.get("b_status");
                    BugRef {
                        id,
                        title: row.get("b_title"),
                        status: status.parse().unwrap_or_default(),
                    }
                }),
                project: project_id.map(|id| ProjectRef {
                    id,
                    name: row.get("p_name"),
                    key: row.get("p_key"),
                }),
            }
        }))
    }

    #[instrument(skip(self, filter))]
    async fn list(
        &self,
        filter: &AttachmentFilter,
        sort: AttachmentSort,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Attachment>, u64), AppError> {
        let predicate = "($1::bigint IS NULL OR a.issue_id = $1) \
             AND ($2::bigint IS NULL OR a.project_id = $2)";

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM attachments a WHERE {predicate}"))
                .bind(filter.issue_id)
                .bind(filter.project_id)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT a.id, a.filename, a.stored_name, a.path, a.mime, a.size, \
                    a.issue_id, a.project_id, a.uploader_id, a.created_at \
             FROM attachments a WHERE {predicate} \
             {order_clause} LIMIT $3 OFFSET $4",
            order_clause = attachment_order_clause(sort, order),
        ))
        .bind(filter.issue_id)
        .bind(filter.project_id)
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.iter().map(row_to_attachment).collect(), total as u64))
    }

    #[instrument(skip(self))]
    async fn list_for_bug(
        &self,
        bug_id: EntityId,
        sort: AttachmentSort,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<AttachmentWithUploader>, u64), AppError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM attachments WHERE issue_id = $1")
                .bind(bug_id)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {ATTACHMENT_JOIN_COLUMNS} FROM attachments a \
             LEFT JOIN users u ON u.id = a.uploader_id \
             WHERE a.issue_id = $1 \
             {order_clause} LIMIT $2 OFFSET $3",
            order_clause = attachment_order_clause(sort, order),
        ))
        .bind(bug_id)
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((
            rows.iter().map(row_to_attachment_with_uploader).collect(),
            total as u64,
        ))
    }

    #[instrument(skip(self))]
    async fn list_for_project(
        &self,
        project_id: EntityId,
        sort: AttachmentSort,
        order: SortOrder,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<AttachmentWithUploader>, u64), AppError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM attachments WHERE project_id = $1")
                .bind(project_id)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "SELECT {ATTACHMENT_JOIN_COLUMNS} FROM attachments a \
             LEFT JOIN users u ON u.id = a.uploader_id \
             WHERE a.project_id = $1 \
             {order_clause} LIMIT $2 OFFSET $3",
            order_clause = attachment_order_clause(sort, order),
        ))
        .bind(project_id)
        .bind(i64::from(limit))
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((
            rows.iter().map(row_to_attachment_with_uploader).collect(),
            total as u64,
        ))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: EntityId) -> Result<Option<Attachment>, AppError> {
        let row = sqlx::query(&format!(
            "DELETE FROM attachments WHERE id = $1 RETURNING id, {ATTACHMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_attachment))
    }
}
