//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dispatch_core::types::DbId;

use crate::auth::jwt::{extract_bearer, verify_access_token, TokenError};
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated contractor extracted from a JWT Bearer token in the
/// `Authorization` header.
///
/// Use this as an extractor parameter in any handler that requires
/// authentication:
///
/// ```ignore
/// async fn my_handler(auth: AuthContractor) -> AppResult<Json<()>> {
///     tracing::info!(contractor_id = auth.contractor_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthContractor {
    /// The contractor's internal database id (from `claims.sub`).
    pub contractor_id: DbId,
    /// Contractor email (from the token, not the database).
    pub email: String,
    /// Whether the contractor had passed verification at token issuance.
    pub verified: bool,
}

impl FromRequestParts<AppState> for AuthContractor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::AuthenticationRequired)?;

        let token = extract_bearer(auth_header).ok_or(AppError::AuthenticationRequired)?;

        let claims = verify_access_token(token, &state.config.jwt).map_err(|e| match e {
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Invalid => AppError::TokenInvalid,
        })?;

        if !claims.verified {
            return Err(AppError::ContractorNotVerified);
        }

        Ok(AuthContractor {
            contractor_id: claims.sub,
            email: claims.email,
            verified: claims.verified,
        })
    }
}
