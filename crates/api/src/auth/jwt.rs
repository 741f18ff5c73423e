//! JWT token pairs for contractors.
//!
//! Access tokens are short-lived HS256 JWTs carrying the contractor identity
//! and verification flag. Refresh tokens are long-lived JWTs carrying only
//! the contractor id and a per-issuance `jti`; revocation is tracked
//! externally by that id (see `dispatch-db::RefreshTokenRepo`), so revoking
//! one refresh token never invalidates the contractor's other sessions.

use dispatch_core::contractor::Contractor;
use dispatch_core::types::DbId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Claims embedded in every access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject -- the contractor's internal database id.
    pub sub: DbId,
    /// Contractor email.
    pub email: String,
    /// Contractor display name.
    pub name: String,
    /// Whether the contractor has passed verification.
    pub verified: bool,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
}

/// Claims embedded in every refresh token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    /// Subject -- the contractor's internal database id.
    pub sub: DbId,
    /// Per-issuance token identifier (UUID v4); the revocation key.
    pub jti: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
}

/// An issued access/refresh token pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// The refresh token's `jti`, for the caller to persist.
    #[serde(skip)]
    pub refresh_token_id: String,
}

/// Verified refresh-token identity.
#[derive(Debug, Clone)]
pub struct RefreshVerification {
    pub contractor_id: DbId,
    pub token_id: String,
}

/// Token verification failure, with expiry distinguished from everything
/// else so callers can return different error codes.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,
    #[error("Token invalid")]
    Invalid,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        }
    }
}

/// Configuration for token generation and validation.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    /// Access token lifetime in minutes (default: 15).
    pub access_token_expiry_mins: i64,
    /// Refresh token lifetime in days (default: 14).
    pub refresh_token_expiry_days: i64,
}

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 14;

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `15`    |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `14`    |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret =
            std::env::var("JWT_SECRET").expect("JWT_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "JWT_SECRET must not be empty");

        let access_token_expiry_mins: i64 = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .unwrap_or_else(|_| DEFAULT_ACCESS_EXPIRY_MINS.to_string())
            .parse()
            .expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64");

        let refresh_token_expiry_days: i64 = std::env::var("JWT_REFRESH_EXPIRY_DAYS")
            .unwrap_or_else(|_| DEFAULT_REFRESH_EXPIRY_DAYS.to_string())
            .parse()
            .expect("JWT_REFRESH_EXPIRY_DAYS must be a valid i64");

        Self {
            secret,
            access_token_expiry_mins,
            refresh_token_expiry_days,
        }
    }
}

/// Generate an access + refresh token pair for the given contractor.
pub fn generate_token_pair(
    contractor: &Contractor,
    config: &JwtConfig,
) -> Result<TokenPair, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let access_exp = now + config.access_token_expiry_mins * 60;
    let refresh_exp = now + config.refresh_token_expiry_days * 24 * 3600;
    let jti = Uuid::new_v4().to_string();

    let access = AccessClaims {
        sub: contractor.id,
        email: contractor.email.clone(),
        name: contractor.display_name.clone(),
        verified: contractor.is_verified,
        exp: access_exp,
        iat: now,
    };
    let refresh = RefreshClaims {
        sub: contractor.id,
        jti: jti.clone(),
        exp: refresh_exp,
        iat: now,
    };

    let key = EncodingKey::from_secret(config.secret.as_bytes());
    Ok(TokenPair {
        access_token: encode(&Header::default(), &access, &key)?, // HS256
        refresh_token: encode(&Header::default(), &refresh, &key)?,
        expires_in: config.access_token_expiry_mins * 60,
        refresh_token_id: jti,
    })
}

/// Validate and decode an access token.
///
/// Expiry is reported as [`TokenError::Expired`], every other failure
/// (tampered signature, malformed token, wrong shape) as
/// [`TokenError::Invalid`].
pub fn verify_access_token(token: &str, config: &JwtConfig) -> Result<AccessClaims, TokenError> {
    let token_data = decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(), // HS256, validates exp
    )?;
    Ok(token_data.claims)
}

/// Validate and decode a refresh token, returning the identity and the
/// per-issuance token id. Revocation is the caller's concern.
pub fn verify_refresh_token(
    token: &str,
    config: &JwtConfig,
) -> Result<RefreshVerification, TokenError> {
    let token_data = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(RefreshVerification {
        contractor_id: token_data.claims.sub,
        token_id: token_data.claims.jti,
    })
}

/// Parse a `"Bearer <token>"` header value.
///
/// Returns `None` for a missing scheme, wrong scheme, or empty token; never
/// panics on malformed input.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Compute the SHA-256 hex digest of a refresh token.
///
/// Only this digest is persisted server-side, so a database leak does not
/// compromise active sessions.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
