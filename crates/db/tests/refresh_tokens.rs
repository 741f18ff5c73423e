//! Integration tests for the refresh-token revocation ledger.
//!
//! Like the task tests, these need a live PostgreSQL instance and are
//! `#[ignore]`d by default; run them with `cargo test -p dispatch-db -- --ignored`.

use chrono::{Duration, Utc};
use dispatch_core::types::DbId;
use dispatch_db::repositories::RefreshTokenRepo;
use sqlx::PgPool;

async fn seed_contractor(pool: &PgPool, email: &str) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO contractors (email, display_name, skills, is_active, is_verified) \
         VALUES ($1, $1, '{}', TRUE, TRUE) RETURNING id",
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .expect("contractor insert should succeed")
}

// ---------------------------------------------------------------------------
// Test: revoke succeeds exactly once per token id
// ---------------------------------------------------------------------------

// Rotation hinges on this: of two concurrent refreshes presenting the same
// token, only the one whose revoke reports a live row may mint a new pair.
#[sqlx::test]
#[ignore = "requires a live PostgreSQL database"]
async fn revoke_reports_a_live_row_only_once(pool: PgPool) {
    let contractor = seed_contractor(&pool, "c@example.com").await;
    let expires_at = Utc::now() + Duration::days(7);
    RefreshTokenRepo::insert(&pool, contractor, "jti-1", "hash-1", expires_at)
        .await
        .unwrap();

    assert!(RefreshTokenRepo::revoke(&pool, "jti-1").await.unwrap());
    assert!(
        !RefreshTokenRepo::revoke(&pool, "jti-1").await.unwrap(),
        "a second revoke of the same token must report no live row"
    );

    let record = RefreshTokenRepo::get_by_token_id(&pool, "jti-1")
        .await
        .unwrap()
        .expect("revocation keeps the row");
    assert!(record.is_revoked());
}

#[sqlx::test]
#[ignore = "requires a live PostgreSQL database"]
async fn revoking_an_unknown_token_is_a_no_op(pool: PgPool) {
    assert!(!RefreshTokenRepo::revoke(&pool, "jti-missing").await.unwrap());
}
