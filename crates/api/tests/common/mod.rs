use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use dispatch_api::auth::jwt::JwtConfig;
use dispatch_api::config::ServerConfig;
use dispatch_api::router::build_app_router;
use dispatch_api::state::AppState;
use dispatch_api::ws::{ConnectionRegistry, RateLimiter};

/// Build a test `ServerConfig` with safe defaults and a fixed JWT secret.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        ws_heartbeat_interval_secs: 30,
        ws_idle_intervals: 3,
        ws_rate_limit_window_secs: 60,
        jwt: JwtConfig {
            secret: "integration-test-secret-with-enough-entropy".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 14,
        },
    }
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
///
/// Delegates to the same [`build_app_router`] that `main.rs` uses, so
/// integration tests exercise the production middleware stack.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        registry: Arc::new(ConnectionRegistry::new()),
        rate_limiter: Arc::new(RateLimiter::new(Duration::from_secs(
            config.ws_rate_limit_window_secs,
        ))),
        event_bus: Arc::new(dispatch_events::EventBus::default()),
    };
    build_app_router(state, &config)
}

/// Issue a GET request against the router.
pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request should build"),
    )
    .await
    .expect("request should not fail at the transport level")
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

/// Assert a response is an error with the given status and `code` field.
#[allow(dead_code)]
pub async fn assert_error(response: Response, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code);
}
