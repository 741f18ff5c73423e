//! Integration tests for the health endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{body_json, get};
use sqlx::PgPool;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
#[ignore = "requires a live PostgreSQL database"]
async fn health_check_returns_ok_with_json(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;

    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["db_healthy"], true);
    assert_eq!(json["ws_connections"], 0);
}

// ---------------------------------------------------------------------------
// Test: unknown route returns 404
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
#[ignore = "requires a live PostgreSQL database"]
async fn unknown_route_returns_404(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in the response
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
#[ignore = "requires a live PostgreSQL database"]
async fn response_contains_x_request_id_header(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("response must carry an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

// ---------------------------------------------------------------------------
// Test: protected routes reject anonymous requests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
#[ignore = "requires a live PostgreSQL database"]
async fn task_routes_require_authentication(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = get(app, "/api/v1/tasks/available?lat=29.42&lng=-98.49").await;

    common::assert_error(response, StatusCode::UNAUTHORIZED, "AUTHENTICATION_REQUIRED").await;
}

// ---------------------------------------------------------------------------
// Test: a garbage bearer token is TOKEN_INVALID, not a 500
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
#[ignore = "requires a live PostgreSQL database"]
async fn garbage_token_is_rejected_as_invalid(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/tasks/my-tasks")
                .header("authorization", "Bearer not.a.token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    common::assert_error(response, StatusCode::UNAUTHORIZED, "TOKEN_INVALID").await;
}
