//! Refresh token entity model.

use dispatch_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `refresh_tokens` table.
///
/// Only the SHA-256 hash of the token is stored; the `token_id` (jti) is the
/// revocation key.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRow {
    pub id: DbId,
    pub contractor_id: DbId,
    pub token_id: String,
    pub token_hash: String,
    pub expires_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl RefreshTokenRow {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}
