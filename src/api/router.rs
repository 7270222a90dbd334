//! HTTP routing: route groups, per-group rate limits, and the shared
//! middleware stack.
//!
//! Three route groups carry independent rate-limit budgets: the resource
//! endpoints (`general`), the health probe (`health`), and the index plus
//! OpenAPI document (`meta`). The CORS/security middleware sits outermost
//! so preflights are answered before any limiter runs.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::{
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::app::{AppState, MAX_UPLOAD_BYTES};

use super::handlers::{
    add_member_handler, api_index_handler, bug_history_handler, create_bug_handler,
    create_comment_handler, create_project_handler, create_user_handler, delete_attachment_handler,
    delete_attachment_query_handler, delete_bug_handler, delete_comment_handler,
    delete_project_handler, delete_user_handler, get_attachment_handler, get_bug_handler,
    get_comment_handler, get_project_handler, get_user_handler, health_handler,
    list_attachments_handler, list_bug_attachments_handler, list_bug_comments_handler,
    list_bugs_handler, list_members_handler, list_project_attachments_handler,
    list_projects_handler, list_users_handler, openapi_handler, remove_member_handler,
    update_bug_handler, update_comment_handler, update_project_handler, update_user_handler,
    upload_attachment_handler,
};
use super::middleware::{Environment, cors_and_security_middleware};
use super::rate_limit::{
    RateLimitConfig, RateLimitState, rate_limit_general_middleware, rate_limit_health_middleware,
    rate_limit_meta_middleware,
};

/// Headroom on top of the upload cap for multipart framing, so an
/// over-cap file still reaches the handler and earns `FILE_TOO_LARGE`
/// instead of a bare 413.
const UPLOAD_BODY_MARGIN: usize = 64 * 1024;

/// Body cap for the upload route. `MAX_REQUEST_BODY_BYTES` overrides it;
/// unset or invalid values fall back to the upload cap plus margin.
fn upload_body_limit() -> usize {
    std::env::var("MAX_REQUEST_BODY_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(MAX_UPLOAD_BYTES + UPLOAD_BODY_MARGIN)
}

fn resource_routes() -> Router<AppState> {
    let users = Router::new()
        .route("/", get(list_users_handler).post(create_user_handler))
        .route(
            "/{id}",
            get(get_user_handler)
                .patch(update_user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        );

    let projects = Router::new()
        .route("/", get(list_projects_handler).post(create_project_handler))
        .route(
            "/{id}",
            get(get_project_handler)
                .patch(update_project_handler)
                .put(update_project_handler)
                .delete(delete_project_handler),
        )
        .route(
            "/{id}/members",
            get(list_members_handler)
                .post(add_member_handler)
                .delete(remove_member_handler),
        )
        .route("/{id}/attachments", get(list_project_attachments_handler));

    let bugs = Router::new()
        .route("/", get(list_bugs_handler).post(create_bug_handler))
        .route(
            "/{id}",
            get(get_bug_handler)
                .patch(update_bug_handler)
                .put(update_bug_handler)
                .delete(delete_bug_handler),
        )
        .route(
            "/{id}/comments",
            get(list_bug_comments_handler).post(create_comment_handler),
        )
        .route("/{id}/history", get(bug_history_handler))
        .route("/{id}/attachments", get(list_bug_attachments_handler));

    let comments = Router::new().route(
        "/{id}",
        get(get_comment_handler)
            .put(update_comment_handler)
            .patch(update_comment_handler)
            .delete(delete_comment_handler),
    );

    let attachments = Router::new()
        .route(
            "/",
            get(list_attachments_handler)
                .post(upload_attachment_handler)
                .delete(delete_attachment_query_handler),
        )
        .route(
            "/{id}",
            get(get_attachment_handler).delete(delete_attachment_handler),
        )
        .layer(DefaultBodyLimit::max(upload_body_limit()));

    Router::new()
        .nest("/users", users)
        .nest("/projects", projects)
        .nest("/bugs", bugs)
        .nest("/comments", comments)
        .nest("/attachments", attachments)
}

fn build_router(state: AppState, rate_limit: Option<Arc<RateLimitState>>) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ));

    let mut general = resource_routes();
    let mut health = Router::new().route("/health", get(health_handler));
    let mut meta = Router::new()
        .route("/", get(api_index_handler))
        .route("/openapi", get(openapi_handler));

    if let Some(limiter) = &rate_limit {
        general = general.layer(from_fn_with_state(
            Arc::clone(limiter),
            rate_limit_general_middleware,
        ));
        health = health.layer(from_fn_with_state(
            Arc::clone(limiter),
            rate_limit_health_middleware,
        ));
        meta = meta.layer(from_fn_with_state(
            Arc::clone(limiter),
            rate_limit_meta_middleware,
        ));
    }

    let api = Router::new().merge(general).merge(health).merge(meta);

    Router::new()
        .nest("/api", api)
        .layer(middleware_stack)
        .layer(from_fn_with_state(
            Environment::from_env(),
            cors_and_security_middleware,
        ))
        .with_state(state)
}

/// Create the router without rate limiting. Tests use this when budgets
/// would get in the way.
pub fn create_router(state: AppState) -> Router {
    build_router(state, None)
}

/// Create the router with the per-group rate limits enabled.
pub fn create_router_with_rate_limit(state: AppState, config: RateLimitConfig) -> Router {
    build_router(state, Some(Arc::new(RateLimitState::new(config))))
}
