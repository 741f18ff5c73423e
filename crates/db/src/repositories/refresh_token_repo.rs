//! Repository for the `refresh_tokens` table.
//!
//! The token service itself is stateless (see `dispatch-api::auth::jwt`);
//! this repo is the external revocation ledger, keyed by the per-issuance
//! token id so revoking one device's token leaves the others valid.

use dispatch_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::refresh_token::RefreshTokenRow;

/// Column list for `refresh_tokens` queries.
const REFRESH_TOKEN_COLUMNS: &str =
    "id, contractor_id, token_id, token_hash, expires_at, revoked_at, created_at";

/// Provides storage and revocation for refresh tokens.
pub struct RefreshTokenRepo;

impl RefreshTokenRepo {
    /// Record a newly issued refresh token (hash only, never the plaintext).
    pub async fn insert(
        pool: &PgPool,
        contractor_id: DbId,
        token_id: &str,
        token_hash: &str,
        expires_at: Timestamp,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO refresh_tokens (contractor_id, token_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(contractor_id)
        .bind(token_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    /// Look up a token record by its per-issuance id.
    pub async fn get_by_token_id(
        pool: &PgPool,
        token_id: &str,
    ) -> Result<Option<RefreshTokenRow>, sqlx::Error> {
        let query = format!("SELECT {REFRESH_TOKEN_COLUMNS} FROM refresh_tokens WHERE token_id = $1");
        sqlx::query_as::<_, RefreshTokenRow>(&query)
            .bind(token_id)
            .fetch_optional(pool)
            .await
    }

    /// Revoke a single token by its id. Idempotent; returns whether a live
    /// token was revoked.
    pub async fn revoke(pool: &PgPool, token_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = now() \
             WHERE token_id = $1 AND revoked_at IS NULL",
        )
        .bind(token_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
