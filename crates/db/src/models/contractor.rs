//! Contractor entity model.

use dispatch_core::contractor::Contractor;
use dispatch_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `contractors` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContractorRow {
    pub id: DbId,
    pub email: String,
    pub display_name: String,
    pub skills: Vec<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<ContractorRow> for Contractor {
    fn from(row: ContractorRow) -> Self {
        Contractor {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
            skills: dispatch_core::contractor::normalize_skills(row.skills),
            is_active: row.is_active,
            is_verified: row.is_verified,
        }
    }
}
