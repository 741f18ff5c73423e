//! Route definitions for the `/tasks` resource.
//!
//! All endpoints require authentication.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::tasks;
use crate::state::AppState;

/// Routes mounted at `/tasks`.
///
/// ```text
/// GET    /available       -> list_available (?lat&lng&radius&skills&page&limit)
/// GET    /my-tasks        -> my_tasks (?page&limit)
/// GET    /{id}            -> get_task
/// POST   /{id}/claim      -> claim_task
/// PUT    /{id}/status     -> update_status
/// POST   /{id}/complete   -> complete_task
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/available", get(tasks::list_available))
        .route("/my-tasks", get(tasks::my_tasks))
        .route("/{id}", get(tasks::get_task))
        .route("/{id}/claim", post(tasks::claim_task))
        .route("/{id}/status", put(tasks::update_status))
        .route("/{id}/complete", post(tasks::complete_task))
}
