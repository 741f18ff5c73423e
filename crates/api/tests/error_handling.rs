//! Tests for `AppError` -> HTTP response mapping.
//!
//! These tests verify that each `AppError` variant produces the correct HTTP
//! status code, error code, and message. They do NOT need an HTTP server --
//! they call `IntoResponse` directly on `AppError` values.

use axum::response::IntoResponse;
use dispatch_api::error::AppError;
use dispatch_core::error::CoreError;
use http_body_util::BodyExt;

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (axum::http::StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Test: CoreError::NotFound maps to 404 with NOT_FOUND code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_error_returns_404() {
    let err = AppError::Core(CoreError::NotFound {
        entity: "Task",
        id: 42,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Task with id 42 not found");
}

// ---------------------------------------------------------------------------
// Test: CoreError::Conflict maps to 409 with CONFLICT code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conflict_error_returns_409() {
    let err = AppError::Core(CoreError::Conflict("Task has already been claimed".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
    assert_eq!(json["error"], "Task has already been claimed");
}

// ---------------------------------------------------------------------------
// Test: token errors are distinguishable 401s
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expired_and_invalid_tokens_get_distinct_codes() {
    let (status, json) = error_to_response(AppError::TokenExpired).await;
    assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "TOKEN_EXPIRED");

    let (status, json) = error_to_response(AppError::TokenInvalid).await;
    assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "TOKEN_INVALID");

    let (status, json) = error_to_response(AppError::AuthenticationRequired).await;
    assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "AUTHENTICATION_REQUIRED");
}

// ---------------------------------------------------------------------------
// Test: contractor account states map to the documented codes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn contractor_account_errors_map_to_documented_codes() {
    let (status, json) = error_to_response(AppError::ContractorNotFound(9)).await;
    assert_eq!(status, axum::http::StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "CONTRACTOR_NOT_FOUND");

    let (status, json) = error_to_response(AppError::ContractorInactive).await;
    assert_eq!(status, axum::http::StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "CONTRACTOR_INACTIVE");

    let (status, json) = error_to_response(AppError::ContractorNotVerified).await;
    assert_eq!(status, axum::http::StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "CONTRACTOR_NOT_VERIFIED");
}

// ---------------------------------------------------------------------------
// Test: rate limiting maps to 429 and carries the retry hint
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limited_error_returns_429() {
    let err = AppError::Core(CoreError::RateLimited {
        retry_after_secs: 12,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(json["error"], "Rate limit exceeded, retry in 12s");
}

// ---------------------------------------------------------------------------
// Test: internal errors never leak their message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn internal_error_sanitizes_the_message() {
    let err = AppError::InternalError("connection pool exhausted at 10.0.0.3".into());

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

// ---------------------------------------------------------------------------
// Test: sqlx RowNotFound maps to 404, not 500
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sqlx_row_not_found_maps_to_404() {
    let err = AppError::Database(sqlx::Error::RowNotFound);

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, axum::http::StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}
