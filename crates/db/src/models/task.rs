//! Task entity model and DTOs.

use dispatch_core::error::CoreError;
use dispatch_core::geo::GeoPoint;
use dispatch_core::task::TaskStatus;
use dispatch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `tasks` table.
///
/// `status` and `task_type` are stored as TEXT with CHECK constraints; use
/// [`Task::status`] for the typed view.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: DbId,
    pub order_id: DbId,
    pub task_type: String,
    pub status: String,
    pub lat: f64,
    pub lng: f64,
    pub required_skills: Vec<String>,
    pub assigned_to: Option<DbId>,
    pub assigned_contractors: Vec<DbId>,
    pub payment_amount_cents: Option<i64>,
    pub completion_notes: Option<String>,
    pub completion_photos: Vec<String>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Task {
    /// Typed view of the `status` column.
    pub fn status(&self) -> Result<TaskStatus, CoreError> {
        self.status.parse()
    }

    /// The task's location as a point.
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lng)
    }

    /// Whether `contractor_id` appears in the assignment history.
    pub fn has_interacted(&self, contractor_id: DbId) -> bool {
        self.assigned_contractors.contains(&contractor_id)
    }
}

/// A task row plus its computed distance from the query point, in meters.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AvailableTask {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub task: Task,
    pub distance_meters: f64,
}

/// Filter parameters for the available-task listing.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailableTaskFilter {
    pub location: GeoPoint,
    pub radius_miles: f64,
    /// When present and non-empty, only tasks whose required skills intersect
    /// these (tasks with no required skills always match).
    pub skills: Option<Vec<String>>,
    /// Drop tasks this contractor has already been assigned at some point.
    pub exclude_interacted: bool,
    pub page: i64,
    pub limit: i64,
}

/// Completion artifacts supplied by the contractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionInput {
    pub notes: Option<String>,
    pub photos: Vec<String>,
}
