//! HTTP request handlers for the REST surface.
//!
//! Handlers stay thin: parse the path/query/body, call the service, wrap
//! the result in the response envelope. All error rendering goes through
//! the `IntoResponse` impl at the bottom so every failure carries the
//! `{error, code, details?}` shape.

use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Query, Request, State, multipart::MultipartError},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, warn};

use crate::app::{AppState, FileUpload};
use crate::domain::{
    AddMemberRequest, AppError, Attachment, AttachmentDetail, AttachmentListQuery,
    AttachmentWithUploader, Bug, BugListQuery, BugWithRefs, Comment, CommentWithAuthor,
    CreateBugRequest, CreateCommentRequest, CreateProjectRequest, CreateUserRequest, DataBody,
    DeletedBody, EntityId, ErrorBody, HealthPayload, HistoryWithActor, MemberWithUser, Page,
    Project, ProjectListQuery, ProjectMember, RemoveMemberRequest, ScopedAttachmentQuery,
    UpdateBugRequest, UpdateCommentRequest, UpdateProjectRequest, UpdateUserRequest, User,
    UserListQuery,
};

use super::openapi;

/// Path ids must be positive integers; anything else is `INVALID_ID`.
fn parse_path_id(raw: &str) -> Result<EntityId, AppError> {
    raw.trim()
        .parse::<EntityId>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or(AppError::InvalidId)
}

/// `Json` extractor whose rejection renders as the error envelope instead
/// of axum's plain-text default.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(AppError::invalid_field("body", &rejection.body_text())),
        }
    }
}

// ---- users ----

/// List users with role/search filters.
pub async fn list_users_handler(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Page<User>>, AppError> {
    Ok(Json(state.users.list(query).await?))
}

/// Create a user.
pub async fn create_user_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<DataBody<User>>), AppError> {
    let user = state.users.create(payload).await?;
    Ok((StatusCode::CREATED, Json(DataBody::new(user))))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataBody<User>>, AppError> {
    let user = state.users.get(parse_path_id(&id)?).await?;
    Ok(Json(DataBody::new(user)))
}

pub async fn update_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> Result<Json<DataBody<User>>, AppError> {
    let user = state.users.update(parse_path_id(&id)?, payload).await?;
    Ok(Json(DataBody::new(user)))
}

pub async fn delete_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedBody<User>>, AppError> {
    let user = state.users.delete(parse_path_id(&id)?).await?;
    Ok(Json(DeletedBody::new("User deleted successfully", user)))
}

// ---- projects ----

/// List projects with status/search filters.
pub async fn list_projects_handler(
    State(state): State<AppState>,
    Query(query): Query<ProjectListQuery>,
) -> Result<Json<Page<Project>>, AppError> {
    Ok(Json(state.projects.list(query).await?))
}

/// Create a project. The key conflicts with `DUPLICATE_KEY` on reuse.
pub async fn create_project_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<DataBody<Project>>), AppError> {
    let project = state.projects.create(payload).await?;
    Ok((StatusCode::CREATED, Json(DataBody::new(project))))
}

pub async fn get_project_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataBody<Project>>, AppError> {
    let project = state.projects.get(parse_path_id(&id)?).await?;
    Ok(Json(DataBody::new(project)))
}

pub async fn update_project_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateProjectRequest>,
) -> Result<Json<DataBody<Project>>, AppError> {
    let project = state.projects.update(parse_path_id(&id)?, payload).await?;
    Ok(Json(DataBody::new(project)))
}

pub async fn delete_project_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedBody<Project>>, AppError> {
    let project = state.projects.delete(parse_path_id(&id)?).await?;
    Ok(Json(DeletedBody::new(
        "Project deleted successfully",
        project,
    )))
}

// ---- project members ----

/// List a project's members with their joined user rows, oldest first.
pub async fn list_members_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataBody<Vec<MemberWithUser>>>, AppError> {
    let members = state.members.list(parse_path_id(&id)?).await?;
    Ok(Json(DataBody::new(members)))
}

/// Add a user to a project. Re-adding conflicts with `MEMBER_EXISTS`.
pub async fn add_member_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<AddMemberRequest>,
) -> Result<(StatusCode, Json<DataBody<MemberWithUser>>), AppError> {
    let member = state.members.add(parse_path_id(&id)?, payload).await?;
    Ok((StatusCode::CREATED, Json(DataBody::new(member))))
}

/// Remove a member. The user to remove travels in the body as `{userId}`.
pub async fn remove_member_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<RemoveMemberRequest>,
) -> Result<Json<DeletedBody<ProjectMember>>, AppError> {
    let member = state.members.remove(parse_path_id(&id)?, payload).await?;
    Ok(Json(DeletedBody::new(
        "Member removed successfully",
        member,
    )))
}

// ---- bugs ----

/// List bugs with status/priority/projectId/assigneeId/search filters.
/// Rows embed the joined project and reporter.
pub async fn list_bugs_handler(
    State(state): State<AppState>,
    Query(query): Query<BugListQuery>,
) -> Result<Json<Page<BugWithRefs>>, AppError> {
    Ok(Json(state.bugs.list(query).await?))
}

/// Create a bug. Missing priority/status default to medium/open.
pub async fn create_bug_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateBugRequest>,
) -> Result<(StatusCode, Json<DataBody<Bug>>), AppError> {
    let bug = state.bugs.create(payload).await?;
    Ok((StatusCode::CREATED, Json(DataBody::new(bug))))
}

pub async fn get_bug_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataBody<BugWithRefs>>, AppError> {
    let bug = state.bugs.get(parse_path_id(&id)?).await?;
    Ok(Json(DataBody::new(bug)))
}

/// Update a bug. Changed fields are recorded as history rows.
pub async fn update_bug_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateBugRequest>,
) -> Result<Json<DataBody<Bug>>, AppError> {
    let bug = state.bugs.update(parse_path_id(&id)?, payload).await?;
    Ok(Json(DataBody::new(bug)))
}

pub async fn delete_bug_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedBody<Bug>>, AppError> {
    let bug = state.bugs.delete(parse_path_id(&id)?).await?;
    Ok(Json(DeletedBody::new("Bug deleted successfully", bug)))
}

/// Audit trail for a bug, newest first, with the joined actor.
pub async fn bug_history_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataBody<Vec<HistoryWithActor>>>, AppError> {
    let entries = state.bugs.history(parse_path_id(&id)?).await?;
    Ok(Json(DataBody::new(entries)))
}

// ---- comments ----

/// Comments on a bug, newest first, with the joined author.
pub async fn list_bug_comments_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataBody<Vec<CommentWithAuthor>>>, AppError> {
    let comments = state.comments.list_for_bug(parse_path_id(&id)?).await?;
    Ok(Json(DataBody::new(comments)))
}

pub async fn create_comment_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<DataBody<CommentWithAuthor>>), AppError> {
    let comment = state.comments.create(parse_path_id(&id)?, payload).await?;
    Ok((StatusCode::CREATED, Json(DataBody::new(comment))))
}

pub async fn get_comment_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataBody<CommentWithAuthor>>, AppError> {
    let comment = state.comments.get(parse_path_id(&id)?).await?;
    Ok(Json(DataBody::new(comment)))
}

/// Replace a comment's body.
pub async fn update_comment_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<UpdateCommentRequest>,
) -> Result<Json<DataBody<Comment>>, AppError> {
    let comment = state.comments.update(parse_path_id(&id)?, payload).await?;
    Ok(Json(DataBody::new(comment)))
}

pub async fn delete_comment_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedBody<Comment>>, AppError> {
    let comment = state.comments.delete(parse_path_id(&id)?).await?;
    Ok(Json(DeletedBody::new(
        "Comment deleted successfully",
        comment,
    )))
}

// ---- attachments ----

/// Query string for `DELETE /api/attachments?id=`.
#[derive(Debug, Default, Deserialize)]
pub struct AttachmentDeleteQuery {
    pub id: Option<String>,
}

/// Multipart link fields are lenient: non-numeric and non-positive values
/// count as absent, leaving the attachment unlinked.
fn parse_link_id(raw: &str) -> Option<EntityId> {
    raw.trim().parse::<EntityId>().ok().filter(|id| *id > 0)
}

fn multipart_error(err: MultipartError) -> AppError {
    warn!(error = %err, "malformed multipart payload");
    AppError::invalid_field("file", "Malformed multipart payload")
}

/// Pulls the `file`, `issueId` and `projectId` parts out of an upload
/// form. Unknown parts are skipped.
async fn read_upload_form(
    multipart: &mut Multipart,
) -> Result<(Option<FileUpload>, Option<EntityId>, Option<EntityId>), AppError> {
    let mut file = None;
    let mut issue_id = None;
    let mut project_id = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.name() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| "upload".to_string());
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some(FileUpload {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("issueId") => {
                issue_id = parse_link_id(&field.text().await.map_err(multipart_error)?);
            }
            Some("projectId") => {
                project_id = parse_link_id(&field.text().await.map_err(multipart_error)?);
            }
            _ => {}
        }
    }

    Ok((file, issue_id, project_id))
}

/// List attachments in the offset/limit style with optional issueId and
/// projectId filters and sortable columns.
pub async fn list_attachments_handler(
    State(state): State<AppState>,
    Query(query): Query<AttachmentListQuery>,
) -> Result<Json<Page<Attachment>>, AppError> {
    Ok(Json(state.attachments.list(query).await?))
}

/// Upload a file, optionally linked to a bug and/or project.
pub async fn upload_attachment_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DataBody<Attachment>>), AppError> {
    let (file, issue_id, project_id) = read_upload_form(&mut multipart).await?;
    let attachment = state.attachments.upload(file, issue_id, project_id).await?;
    Ok((StatusCode::CREATED, Json(DataBody::new(attachment))))
}

/// Delete an attachment addressed by the `id` query parameter.
pub async fn delete_attachment_query_handler(
    State(state): State<AppState>,
    Query(query): Query<AttachmentDeleteQuery>,
) -> Result<Json<DeletedBody<Attachment>>, AppError> {
    let id = parse_path_id(query.id.as_deref().unwrap_or_default())?;
    let attachment = state.attachments.delete(id).await?;
    Ok(Json(DeletedBody::new(
        "Attachment deleted successfully",
        attachment,
    )))
}

/// Fetch one attachment with its uploader, bug, and project references.
pub async fn get_attachment_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DataBody<AttachmentDetail>>, AppError> {
    let detail = state.attachments.get(parse_path_id(&id)?).await?;
    Ok(Json(DataBody::new(detail)))
}

pub async fn delete_attachment_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedBody<Attachment>>, AppError> {
    let attachment = state.attachments.delete(parse_path_id(&id)?).await?;
    Ok(Json(DeletedBody::new(
        "Attachment deleted successfully",
        attachment,
    )))
}

/// Attachments on a bug, paged with the uploader joined in.
pub async fn list_bug_attachments_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ScopedAttachmentQuery>,
) -> Result<Json<Page<AttachmentWithUploader>>, AppError> {
    let page = state
        .attachments
        .list_for_bug(parse_path_id(&id)?, query)
        .await?;
    Ok(Json(page))
}

/// Attachments across a project, paged with the uploader joined in.
pub async fn list_project_attachments_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ScopedAttachmentQuery>,
) -> Result<Json<Page<AttachmentWithUploader>>, AppError> {
    let page = state
        .attachments
        .list_for_project(parse_path_id(&id)?, query)
        .await?;
    Ok(Json(page))
}

// ---- meta ----

/// API index: service name, version, and the route catalogue.
pub async fn api_index_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "routes": {
            "health": "GET /api/health",
            "openapi": "GET /api/openapi",
            "users": "GET, POST /api/users | GET, PATCH, DELETE /api/users/{id}",
            "projects": "GET, POST /api/projects | GET, PATCH, DELETE /api/projects/{id}",
            "members": "GET, POST, DELETE /api/projects/{id}/members",
            "bugs": "GET, POST /api/bugs | GET, PATCH, DELETE /api/bugs/{id}",
            "comments": "GET, POST /api/bugs/{id}/comments | GET, PUT, DELETE /api/comments/{id}",
            "history": "GET /api/bugs/{id}/history",
            "attachments": "GET, POST, DELETE /api/attachments | GET, DELETE /api/attachments/{id} | GET /api/bugs/{id}/attachments | GET /api/projects/{id}/attachments"
        }
    }))
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthPayload> {
    Json(HealthPayload::ok(state.uptime_secs()))
}

pub async fn openapi_handler() -> Json<serde_json::Value> {
    Json(openapi::document())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::InvalidId
            | AppError::Validation { .. }
            | AppError::MissingReference(_)
            | AppError::MissingFile => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MemberExists | AppError::DuplicateEmail | AppError::DuplicateKey => {
                StatusCode::CONFLICT
            }
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidFileType(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Server faults are logged with full detail; the client only ever
        // sees a generic message for them.
        let message = if self.is_client_error() {
            self.to_string()
        } else {
            error!(code = self.code(), detail = %self, "request failed");
            "Internal server error".to_string()
        };

        let details = match &self {
            AppError::Validation { details } => Some(details.clone()),
            _ => None,
        };

        let body = ErrorBody {
            error: message,
            code: self.code().to_string(),
            details,
        };

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited { retry_after_ms } = &self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_ms.div_ceil(1000)),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DatabaseError, Reference, Resource};
    use http_body_util::BodyExt;

    mod id_parsing {
        use super::*;

        #[test]
        fn test_path_id_requires_positive_integer() {
            assert_eq!(parse_path_id("42").unwrap(), 42);
            assert_eq!(parse_path_id(" 7 ").unwrap(), 7);
            assert!(matches!(parse_path_id("0"), Err(AppError::InvalidId)));
            assert!(matches!(parse_path_id("-3"), Err(AppError::InvalidId)));
            assert!(matches!(parse_path_id("abc"), Err(AppError::InvalidId)));
            assert!(matches!(parse_path_id(""), Err(AppError::InvalidId)));
        }

        #[test]
        fn test_link_id_is_lenient() {
            assert_eq!(parse_link_id("5"), Some(5));
            assert_eq!(parse_link_id(" 12 "), Some(12));
            assert_eq!(parse_link_id("0"), None);
            assert_eq!(parse_link_id("-1"), None);
            assert_eq!(parse_link_id("abc"), None);
            assert_eq!(parse_link_id(""), None);
        }
    }

    mod error_responses {
        use super::*;

        async fn body_json(response: Response) -> serde_json::Value {
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            serde_json::from_slice(&bytes).unwrap()
        }

        #[tokio::test]
        async fn test_validation_error_carries_details() {
            let response =
                AppError::invalid_field("key", "Key must be 2-5 uppercase letters").into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let body = body_json(response).await;
            assert_eq!(body["code"], "VALIDATION_ERROR");
            assert_eq!(body["details"]["key"][0], "Key must be 2-5 uppercase letters");
        }

        #[tokio::test]
        async fn test_not_found_uses_entity_code() {
            let response = AppError::NotFound(Resource::Bug).into_response();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);

            let body = body_json(response).await;
            assert_eq!(body["code"], "BUG_NOT_FOUND");
            assert_eq!(body["error"], "Bug not found");
            assert!(body.get("details").is_none());
        }

        #[tokio::test]
        async fn test_missing_reference_is_bad_request() {
            let response = AppError::MissingReference(Reference::Reporter).into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let body = body_json(response).await;
            assert_eq!(body["code"], "REPORTER_NOT_FOUND");
        }

        #[tokio::test]
        async fn test_conflicts_map_to_409() {
            assert_eq!(
                AppError::DuplicateKey.into_response().status(),
                StatusCode::CONFLICT
            );
            assert_eq!(
                AppError::DuplicateEmail.into_response().status(),
                StatusCode::CONFLICT
            );
            assert_eq!(
                AppError::MemberExists.into_response().status(),
                StatusCode::CONFLICT
            );
        }

        #[tokio::test]
        async fn test_upload_failures_use_dedicated_statuses() {
            assert_eq!(
                AppError::MissingFile.into_response().status(),
                StatusCode::BAD_REQUEST
            );
            assert_eq!(
                AppError::FileTooLarge { limit_mb: 10 }.into_response().status(),
                StatusCode::PAYLOAD_TOO_LARGE
            );
            assert_eq!(
                AppError::InvalidFileType("image/bmp".to_string())
                    .into_response()
                    .status(),
                StatusCode::UNPROCESSABLE_ENTITY
            );
        }

        #[tokio::test]
        async fn test_rate_limited_sets_retry_after() {
            let response = AppError::RateLimited { retry_after_ms: 2_500 }.into_response();
            assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
            assert_eq!(response.headers().get("Retry-After").unwrap(), "3");

            let body = body_json(response).await;
            assert_eq!(body["code"], "RATE_LIMITED");
        }

        #[tokio::test]
        async fn test_server_errors_hide_detail() {
            let response = AppError::Database(DatabaseError::Query(
                "relation \"bugs\" does not exist".to_string(),
            ))
            .into_response();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

            let body = body_json(response).await;
            assert_eq!(body["code"], "INTERNAL_ERROR");
            assert_eq!(body["error"], "Internal server error");
        }

        #[tokio::test]
        async fn test_auth_statuses() {
            assert_eq!(
                AppError::Unauthorized.into_response().status(),
                StatusCode::UNAUTHORIZED
            );
            assert_eq!(
                AppError::Forbidden("read-only".to_string())
                    .into_response()
                    .status(),
                StatusCode::FORBIDDEN
            );
        }
    }
}
