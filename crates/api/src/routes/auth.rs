//! Route definitions for the `/auth` resource.

use axum::routing::post;
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST   /refresh    -> refresh (public; the token is the credential)
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/refresh", post(auth::refresh))
}
