//! List-endpoint contract: lenient query parsing, clamped paging windows,
//! and per-entity filters.
//!
//! Parsing never rejects a request. Values that fail to parse are treated
//! as absent, page numbers clamp to at least 1, and page sizes clamp to
//! `[1, MAX_PAGE_SIZE]`. Filters combine with AND across fields; a search
//! term matches with OR across its fields, case-insensitively.

use serde::{Deserialize, Serialize};

use super::types::{
    Attachment, Bug, BugPriority, BugStatus, Project, ProjectStatus, User, UserRole,
};

/// Default page size for paged lists.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Default page size for bug- and project-scoped attachment lists.
pub const SCOPED_PAGE_SIZE: u32 = 20;
/// Upper bound for any page size or limit.
pub const MAX_PAGE_SIZE: u32 = 100;

fn parse_u32(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|s| s.trim().parse().ok())
}

fn parse_u64(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse().ok())
}

/// Ids must be positive; zero, negative, and non-numeric input all count
/// as absent.
fn parse_id(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok()).filter(|id| *id > 0)
}

fn parse_enum<T: std::str::FromStr>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|s| s.parse().ok())
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.filter(|s| !s.is_empty()).map(str::to_string)
}

fn clamp_page(raw: Option<&str>) -> u32 {
    parse_u32(raw).unwrap_or(1).max(1)
}

fn clamp_page_size(raw: Option<&str>, default_size: u32) -> u32 {
    parse_u32(raw).unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE)
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Sort direction. Ascending unless the literal `desc` is given.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw {
            Some("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }
}

/// Sortable attachment columns.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AttachmentSort {
    #[default]
    CreatedAt,
    Filename,
    Size,
}

fn parse_sort(raw: Option<&str>, allow_size: bool) -> Option<AttachmentSort> {
    match raw {
        Some("createdAt") => Some(AttachmentSort::CreatedAt),
        Some("filename") => Some(AttachmentSort::Filename),
        Some("size") if allow_size => Some(AttachmentSort::Size),
        _ => None,
    }
}

/// Resolves the `sort`/`order` pair for an attachment list. A recognized
/// sort field orders ascending unless `order=desc`; an omitted or
/// unrecognized field falls back to newest-first upload time.
fn resolve_sort(
    raw_sort: Option<&str>,
    raw_order: Option<&str>,
    allow_size: bool,
) -> (AttachmentSort, SortOrder) {
    match parse_sort(raw_sort, allow_size) {
        Some(sort) => (sort, SortOrder::from_query(raw_order)),
        None => (AttachmentSort::CreatedAt, SortOrder::Desc),
    }
}

/// A clamped slice of a result set, in either of the two supported styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListWindow {
    /// 1-based `page`/`pageSize` query.
    Paged { page: u32, page_size: u32 },
    /// Raw `limit`/`offset` query.
    Offset { limit: u32, offset: u64 },
}

impl ListWindow {
    pub fn from_page_params(page: Option<&str>, page_size: Option<&str>, default_size: u32) -> Self {
        ListWindow::Paged {
            page: clamp_page(page),
            page_size: clamp_page_size(page_size, default_size),
        }
    }

    pub fn from_offset_params(limit: Option<&str>, offset: Option<&str>) -> Self {
        ListWindow::Offset {
            limit: clamp_page_size(limit, DEFAULT_PAGE_SIZE),
            offset: parse_u64(offset).unwrap_or(0),
        }
    }

    /// Rows to fetch.
    pub fn limit(&self) -> u32 {
        match self {
            ListWindow::Paged { page_size, .. } => *page_size,
            ListWindow::Offset { limit, .. } => *limit,
        }
    }

    /// Rows to skip.
    pub fn offset(&self) -> u64 {
        match self {
            ListWindow::Paged { page, page_size } => {
                u64::from(page.saturating_sub(1)) * u64::from(*page_size)
            }
            ListWindow::Offset { offset, .. } => *offset,
        }
    }

    /// Pagination metadata for this window over `total` matching rows.
    /// Offset-style windows echo the raw offset and derive the page number.
    pub fn pagination(&self, total: u64) -> Pagination {
        match self {
            ListWindow::Paged { page, page_size } => Pagination::new(*page, *page_size, total),
            ListWindow::Offset { limit, offset } => {
                let page = (offset / u64::from(*limit)) as u32 + 1;
                Pagination::new(page, *limit, total).with_offset(*offset)
            }
        }
    }
}

/// Pagination metadata returned alongside list data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_next: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_previous: Option<bool>,
}

impl Pagination {
    pub fn new(page: u32, page_size: u32, total: u64) -> Self {
        let total_pages = (total as f64 / page_size as f64).ceil() as u64;
        Self {
            page,
            page_size,
            total,
            total_pages,
            offset: None,
            has_next: None,
            has_previous: None,
        }
    }

    /// Adds the `hasNext`/`hasPrevious` navigation flags.
    pub fn with_nav(mut self) -> Self {
        self.has_next = Some(u64::from(self.page) < self.total_pages);
        self.has_previous = Some(self.page > 1);
        self
    }

    /// Echoes the raw offset for offset-style queries.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// One page of list data with its pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, pagination: Pagination) -> Self {
        Self { data, pagination }
    }
}

/// Raw query string for `GET /api/users`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub role: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl UserListQuery {
    pub fn window(&self) -> ListWindow {
        ListWindow::from_page_params(self.page.as_deref(), self.page_size.as_deref(), DEFAULT_PAGE_SIZE)
    }

    pub fn filter(&self) -> UserFilter {
        UserFilter {
            role: parse_enum(self.role.as_deref()),
            search: non_empty(self.search.as_deref()),
        }
    }
}

/// Equality and search filters for users.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub search: Option<String>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if self.role.is_some_and(|role| role != user.role) {
            return false;
        }
        match &self.search {
            Some(term) => contains_ci(&user.name, term) || contains_ci(&user.email, term),
            None => true,
        }
    }
}

/// Raw query string for `GET /api/projects`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl ProjectListQuery {
    pub fn window(&self) -> ListWindow {
        ListWindow::from_page_params(self.page.as_deref(), self.page_size.as_deref(), DEFAULT_PAGE_SIZE)
    }

    pub fn filter(&self) -> ProjectFilter {
        ProjectFilter {
            status: parse_enum(self.status.as_deref()),
            search: non_empty(self.search.as_deref()),
        }
    }
}

/// Equality and search filters for projects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub search: Option<String>,
}

impl ProjectFilter {
    pub fn matches(&self, project: &Project) -> bool {
        if self.status.is_some_and(|status| status != project.status) {
            return false;
        }
        match &self.search {
            Some(term) => contains_ci(&project.name, term) || contains_ci(&project.key, term),
            None => true,
        }
    }
}

/// Raw query string for `GET /api/bugs`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugListQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub project_id: Option<String>,
    pub assignee_id: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl BugListQuery {
    pub fn window(&self) -> ListWindow {
        ListWindow::from_page_params(self.page.as_deref(), self.page_size.as_deref(), DEFAULT_PAGE_SIZE)
    }

    pub fn filter(&self) -> BugFilter {
        BugFilter {
            status: parse_enum(self.status.as_deref()),
            priority: parse_enum(self.priority.as_deref()),
            project_id: parse_id(self.project_id.as_deref()),
            assignee_id: parse_id(self.assignee_id.as_deref()),
            search: non_empty(self.search.as_deref()),
        }
    }
}

/// Equality and search filters for bugs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BugFilter {
    pub status: Option<BugStatus>,
    pub priority: Option<BugPriority>,
    pub project_id: Option<i64>,
    pub assignee_id: Option<i64>,
    pub search: Option<String>,
}

impl BugFilter {
    pub fn matches(&self, bug: &Bug) -> bool {
        if self.status.is_some_and(|status| status != bug.status) {
            return false;
        }
        if self.priority.is_some_and(|priority| priority != bug.priority) {
            return false;
        }
        if self.project_id.is_some_and(|id| id != bug.project_id) {
            return false;
        }
        if self.assignee_id.is_some_and(|id| bug.assignee_id != Some(id)) {
            return false;
        }
        match &self.search {
            Some(term) => contains_ci(&bug.title, term) || contains_ci(&bug.description, term),
            None => true,
        }
    }
}

/// Raw query string for `GET /api/attachments`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentListQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub issue_id: Option<String>,
    pub project_id: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl AttachmentListQuery {
    pub fn window(&self) -> ListWindow {
        ListWindow::from_offset_params(self.limit.as_deref(), self.offset.as_deref())
    }

    pub fn filter(&self) -> AttachmentFilter {
        AttachmentFilter {
            issue_id: parse_id(self.issue_id.as_deref()),
            project_id: parse_id(self.project_id.as_deref()),
        }
    }

    pub fn sort(&self) -> (AttachmentSort, SortOrder) {
        resolve_sort(self.sort.as_deref(), self.order.as_deref(), true)
    }
}

/// Equality filters for attachments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachmentFilter {
    pub issue_id: Option<i64>,
    pub project_id: Option<i64>,
}

impl AttachmentFilter {
    pub fn matches(&self, attachment: &Attachment) -> bool {
        if self.issue_id.is_some_and(|id| attachment.issue_id != Some(id)) {
            return false;
        }
        if self.project_id.is_some_and(|id| attachment.project_id != Some(id)) {
            return false;
        }
        true
    }
}

/// Raw query string for bug- and project-scoped attachment lists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedAttachmentQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl ScopedAttachmentQuery {
    pub fn window(&self) -> ListWindow {
        ListWindow::from_page_params(self.page.as_deref(), self.page_size.as_deref(), SCOPED_PAGE_SIZE)
    }

    /// Sort for a bug-scoped list (`createdAt`, `filename`, `size`).
    pub fn bug_sort(&self) -> (AttachmentSort, SortOrder) {
        resolve_sort(self.sort.as_deref(), self.order.as_deref(), true)
    }

    /// Sort for a project-scoped list (`size` is not supported there).
    pub fn project_sort(&self) -> (AttachmentSort, SortOrder) {
        resolve_sort(self.sort.as_deref(), self.order.as_deref(), false)
    }
}
