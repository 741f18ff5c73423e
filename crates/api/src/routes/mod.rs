pub mod auth;
pub mod health;
pub mod tasks;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                        real-time WebSocket (token via ?token= or Bearer)
///
/// /auth/refresh              rotate a refresh token (public)
///
/// /tasks/available           nearby claimable tasks (auth required)
/// /tasks/my-tasks            the caller's tasks
/// /tasks/{id}                task detail
/// /tasks/{id}/claim          atomic claim
/// /tasks/{id}/status         owner-only status transition
/// /tasks/{id}/complete       owner-only completion
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/auth", auth::router())
        .nest("/tasks", tasks::router())
}
