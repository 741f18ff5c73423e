//! Handlers for the `/auth` resource (refresh-token rotation).
//!
//! Login and registration live in the identity service; this core only
//! rotates refresh tokens it previously issued, checking the external
//! revocation ledger before minting a new pair.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use dispatch_core::contractor::Contractor;
use dispatch_core::types::DbId;
use dispatch_db::repositories::{ContractorRepo, RefreshTokenRepo};
use serde::{Deserialize, Serialize};

use crate::auth::jwt::{generate_token_pair, hash_refresh_token, verify_refresh_token, TokenError};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /auth/refresh`.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Successful refresh response.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub contractor: ContractorInfo,
}

/// Public contractor info embedded in [`AuthResponse`].
#[derive(Debug, Serialize)]
pub struct ContractorInfo {
    pub id: DbId,
    pub email: String,
    pub display_name: String,
    pub verified: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/refresh
///
/// Exchange a valid refresh token for a new access + refresh pair. The old
/// token is revoked first (rotation), so each refresh token is usable once.
/// Revocation is keyed by the token's `jti`, leaving the contractor's other
/// sessions untouched.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    // 1. Verify the JWT itself (signature + expiry).
    let verification =
        verify_refresh_token(&input.refresh_token, &state.config.jwt).map_err(|e| match e {
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Invalid => AppError::TokenInvalid,
        })?;

    // 2. The ledger row must exist, match the presented token's hash, and be
    //    neither revoked nor past its recorded expiry.
    let record = RefreshTokenRepo::get_by_token_id(&state.pool, &verification.token_id)
        .await?
        .ok_or(AppError::TokenInvalid)?;

    if record.token_hash != hash_refresh_token(&input.refresh_token) {
        return Err(AppError::TokenInvalid);
    }
    if record.is_revoked() {
        return Err(AppError::TokenInvalid);
    }
    if record.is_expired(Utc::now()) {
        return Err(AppError::TokenExpired);
    }

    // 3. The contractor must still exist and be active.
    let contractor: Contractor = ContractorRepo::get_by_id(&state.pool, verification.contractor_id)
        .await?
        .ok_or(AppError::ContractorNotFound(verification.contractor_id))?
        .into();

    if !contractor.is_active {
        return Err(AppError::ContractorInactive);
    }

    // 4. Rotate: revoke the presented token, then issue and record a new pair.
    //    The conditional revoke decides races between concurrent refreshes of
    //    the same token; only the caller that actually revoked it may rotate.
    let revoked = RefreshTokenRepo::revoke(&state.pool, &verification.token_id).await?;
    if !revoked {
        return Err(AppError::TokenInvalid);
    }

    let pair = generate_token_pair(&contractor, &state.config.jwt)
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;

    let expires_at =
        Utc::now() + chrono::Duration::days(state.config.jwt.refresh_token_expiry_days);
    RefreshTokenRepo::insert(
        &state.pool,
        contractor.id,
        &pair.refresh_token_id,
        &hash_refresh_token(&pair.refresh_token),
        expires_at,
    )
    .await?;

    tracing::info!(contractor_id = contractor.id, "Refresh token rotated");

    Ok(Json(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: pair.expires_in,
        contractor: ContractorInfo {
            id: contractor.id,
            email: contractor.email,
            display_name: contractor.display_name,
            verified: contractor.is_verified,
        },
    }))
}
