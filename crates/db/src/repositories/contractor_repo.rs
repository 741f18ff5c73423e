//! Repository for the `contractors` table (read-only from this core).

use dispatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::contractor::ContractorRow;

/// Column list for `contractors` queries.
const CONTRACTOR_COLUMNS: &str =
    "id, email, display_name, skills, is_active, is_verified, created_at, updated_at";

/// Provides read operations for contractor identities.
pub struct ContractorRepo;

impl ContractorRepo {
    /// Fetch a contractor by id.
    pub async fn get_by_id(
        pool: &PgPool,
        contractor_id: DbId,
    ) -> Result<Option<ContractorRow>, sqlx::Error> {
        let query = format!("SELECT {CONTRACTOR_COLUMNS} FROM contractors WHERE id = $1");
        sqlx::query_as::<_, ContractorRow>(&query)
            .bind(contractor_id)
            .fetch_optional(pool)
            .await
    }
}
