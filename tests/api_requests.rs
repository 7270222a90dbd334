//! Request-flow tests: multi-step scenarios that chain several endpoints
//! the way a client would.

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use bugtrack::api::create_router;
use bugtrack::test_utils::MockRepos;

fn req_get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn req_json(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn req_delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn created(app: &Router, uri: &str, payload: Value) -> Value {
    let response = send(app, req_json(Method::POST, uri, payload)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let mut body = body_json(response).await;
    body["data"].take()
}

#[tokio::test]
async fn test_full_tracker_lifecycle_flow() {
    let app = create_router(MockRepos::new().state());

    // 1. Two users: a project owner and a developer.
    let owner = created(
        &app,
        "/api/users",
        json!({"name": "Alice", "email": "Alice@Example.com"}),
    )
    .await;
    assert_eq!(owner["email"], "alice@example.com");
    assert_eq!(owner["role"], "developer");

    let dev = created(
        &app,
        "/api/users",
        json!({"name": "Bob", "email": "bob@example.com", "role": "tester"}),
    )
    .await;

    // 2. A project owned by Alice, with Bob as a member.
    let project = created(
        &app,
        "/api/projects",
        json!({"name": "Tracker", "key": "TRK", "ownerId": owner["id"]}),
    )
    .await;
    created(
        &app,
        &format!("/api/projects/{}/members", project["id"]),
        json!({"userId": dev["id"], "role": "contributor"}),
    )
    .await;

    // 3. A bug reported by Alice, later assigned to Bob.
    let bug = created(
        &app,
        "/api/bugs",
        json!({
            "projectId": project["id"],
            "title": "Settings page 500s",
            "description": "Saving preferences returns an internal error",
            "reporterId": owner["id"],
            "priority": "high",
        }),
    )
    .await;

    let response = send(
        &app,
        req_json(
            Method::PATCH,
            &format!("/api/bugs/{}", bug["id"]),
            json!({"assigneeId": dev["id"], "status": "in_progress"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["data"]["assigneeId"], dev["id"]);
    assert_eq!(updated["data"]["status"], "in_progress");

    // 4. A comment from the assignee.
    let comment = created(
        &app,
        &format!("/api/bugs/{}/comments", bug["id"]),
        json!({"authorId": dev["id"], "body": "Fix is up for review."}),
    )
    .await;

    // 5. The audit trail recorded the assignment and the status change.
    let response = send(&app, req_get(&format!("/api/bugs/{}/history", bug["id"]))).await;
    let history = body_json(response).await;
    assert_eq!(history["data"].as_array().unwrap().len(), 2);

    // 6. Tear down in reverse; each delete reports the entity it removed.
    let response = send(&app, req_delete(&format!("/api/comments/{}", comment["id"]))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, req_delete(&format!("/api/bugs/{}", bug["id"]))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["data"]["title"],
        "Settings page 500s"
    );

    let response = send(&app, req_delete(&format!("/api/projects/{}", project["id"]))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, req_delete(&format!("/api/users/{}", dev["id"]))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await["message"],
        "User deleted successfully"
    );

    let response = send(&app, req_get(&format!("/api/bugs/{}", bug["id"]))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_assignee_null_unassigns_but_absent_leaves_it() {
    let app = create_router(MockRepos::new().state());
    let owner = created(
        &app,
        "/api/users",
        json!({"name": "Alice", "email": "alice@example.com"}),
    )
    .await;
    let dev = created(
        &app,
        "/api/users",
        json!({"name": "Bob", "email": "bob@example.com"}),
    )
    .await;
    let project = created(
        &app,
        "/api/projects",
        json!({"name": "Tracker", "key": "TRK", "ownerId": owner["id"]}),
    )
    .await;
    let bug = created(
        &app,
        "/api/bugs",
        json!({
            "projectId": project["id"],
            "title": "Flaky export",
            "description": "CSV export truncates rows",
            "reporterId": owner["id"],
            "assigneeId": dev["id"],
        }),
    )
    .await;
    assert_eq!(bug["assigneeId"], dev["id"]);
    let bug_uri = format!("/api/bugs/{}", bug["id"]);

    // A patch that omits assigneeId must not touch the assignment.
    let response = send(&app, req_json(Method::PATCH, &bug_uri, json!({"priority": "low"}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["assigneeId"], dev["id"]);

    // An explicit null unassigns.
    let response = send(
        &app,
        req_json(Method::PATCH, &bug_uri, json!({"assigneeId": null})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["assigneeId"], Value::Null);
}

#[tokio::test]
async fn test_duplicate_email_on_create_and_update() {
    let app = create_router(MockRepos::new().state());
    created(
        &app,
        "/api/users",
        json!({"name": "Alice", "email": "alice@example.com"}),
    )
    .await;
    let bob = created(
        &app,
        "/api/users",
        json!({"name": "Bob", "email": "bob@example.com"}),
    )
    .await;

    // Same address, different case.
    let response = send(
        &app,
        req_json(
            Method::POST,
            "/api/users",
            json!({"name": "Impostor", "email": "ALICE@example.com"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "DUPLICATE_EMAIL");

    let response = send(
        &app,
        req_json(
            Method::PATCH,
            &format!("/api/users/{}", bob["id"]),
            json!({"email": "alice@example.com"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "DUPLICATE_EMAIL");
}

#[tokio::test]
async fn test_put_and_patch_both_update_a_project() {
    let app = create_router(MockRepos::new().state());
    let owner = created(
        &app,
        "/api/users",
        json!({"name": "Alice", "email": "alice@example.com"}),
    )
    .await;
    let project = created(
        &app,
        "/api/projects",
        json!({"name": "Tracker", "key": "TRK", "ownerId": owner["id"]}),
    )
    .await;
    let uri = format!("/api/projects/{}", project["id"]);

    let response = send(&app, req_json(Method::PUT, &uri, json!({"name": "Tracker v2"}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["name"], "Tracker v2");

    let response = send(&app, req_json(Method::PATCH, &uri, json!({"status": "archived"}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["status"], "archived");
    assert_eq!(body["data"]["name"], "Tracker v2");
}

#[tokio::test]
async fn test_empty_update_bodies_are_rejected_everywhere() {
    let app = create_router(MockRepos::new().state());
    let user = created(
        &app,
        "/api/users",
        json!({"name": "Alice", "email": "alice@example.com"}),
    )
    .await;
    let project = created(
        &app,
        "/api/projects",
        json!({"name": "Tracker", "key": "TRK", "ownerId": user["id"]}),
    )
    .await;

    for uri in [
        format!("/api/users/{}", user["id"]),
        format!("/api/projects/{}", project["id"]),
    ] {
        let response = send(&app, req_json(Method::PATCH, &uri, json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR", "{uri}");
    }
}

#[tokio::test]
async fn test_malformed_json_body_is_a_clean_400() {
    let app = create_router(MockRepos::new().state());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_user_listing_filters_by_role_and_search() {
    let app = create_router(MockRepos::new().state());
    created(
        &app,
        "/api/users",
        json!({"name": "Alice Admin", "email": "alice@example.com", "role": "admin"}),
    )
    .await;
    created(
        &app,
        "/api/users",
        json!({"name": "Bob Builder", "email": "bob@example.com"}),
    )
    .await;
    created(
        &app,
        "/api/users",
        json!({"name": "Carol Tester", "email": "carol@example.com", "role": "tester"}),
    )
    .await;

    let response = send(&app, req_get("/api/users?role=admin")).await;
    let body = body_json(response).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["name"], "Alice Admin");

    let response = send(&app, req_get("/api/users?search=bob")).await;
    let body = body_json(response).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["email"], "bob@example.com");
}
