//! Repository for the `tasks` table.
//!
//! The claim operation is a single conditional UPDATE; the database performs
//! the read-check-and-write indivisibly, so correctness holds across any
//! number of concurrent server processes. No application-level lock exists
//! anywhere in this module.

use dispatch_core::geo::miles_to_meters;
use dispatch_core::task::TaskStatus;
use dispatch_core::types::DbId;
use sqlx::PgPool;

use crate::models::task::{AvailableTask, AvailableTaskFilter, CompletionInput, Task};

/// Column list for `tasks` queries.
const TASK_COLUMNS: &str = "id, order_id, task_type, status, lat, lng, required_skills, \
     assigned_to, assigned_contractors, payment_amount_cents, completion_notes, \
     completion_photos, completed_at, created_at, updated_at";

/// Haversine distance (meters) from the bound query point `($1, $2)` to the
/// task's stored location.
const DISTANCE_EXPR: &str = "2 * 6371000 * asin(sqrt( \
       pow(sin(radians(lat - $1) / 2), 2) \
       + cos(radians($1)) * cos(radians(lat)) * pow(sin(radians(lng - $2) / 2), 2)))";

/// Result of a claim attempt.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// This caller won; the returned row reflects the assignment.
    Claimed(Task),
    /// The task exists but was no longer Pending/unassigned at write time.
    AlreadyClaimed,
    /// No task with that id.
    NotFound,
}

/// Provides read/write operations for tasks.
pub struct TaskRepo;

impl TaskRepo {
    /// List Pending, unassigned tasks within the filter radius, closest first.
    ///
    /// The radius arrives in miles and is converted to meters for the geo
    /// comparison. A coarse lat/lng bounding box prefilter lets the partial
    /// index do its work before the exact haversine cut. Ordering is
    /// `(distance, id)` so pagination is stable.
    pub async fn list_available(
        pool: &PgPool,
        contractor_id: DbId,
        filter: &AvailableTaskFilter,
    ) -> Result<Vec<AvailableTask>, sqlx::Error> {
        let radius_m = miles_to_meters(filter.radius_miles);

        // Bounding box half-spans in degrees. 111,320 m per degree of
        // latitude; longitude shrinks with cos(lat). The box only prefilters,
        // the haversine cut below is exact.
        let lat_delta = radius_m / 111_320.0;
        let lng_delta = lat_delta / filter.location.lat.to_radians().cos().abs().max(0.01);

        let skills = filter.skills.clone().unwrap_or_default();
        let offset = (filter.page.max(1) - 1) * filter.limit;

        let query = format!(
            "SELECT * FROM ( \
                SELECT {TASK_COLUMNS}, {DISTANCE_EXPR} AS distance_meters \
                FROM tasks \
                WHERE status = 'pending' \
                  AND assigned_to IS NULL \
                  AND lat BETWEEN $1 - $5 AND $1 + $5 \
                  AND lng BETWEEN $2 - $6 AND $2 + $6 \
                  AND (cardinality($4::text[]) = 0 \
                       OR cardinality(required_skills) = 0 \
                       OR required_skills && $4) \
                  AND (NOT $7::bool OR NOT ($3 = ANY(assigned_contractors))) \
             ) candidates \
             WHERE distance_meters <= $8 \
             ORDER BY distance_meters, id \
             LIMIT $9 OFFSET $10"
        );

        sqlx::query_as::<_, AvailableTask>(&query)
            .bind(filter.location.lat)
            .bind(filter.location.lng)
            .bind(contractor_id)
            .bind(&skills)
            .bind(lat_delta)
            .bind(lng_delta)
            .bind(filter.exclude_interacted)
            .bind(radius_m)
            .bind(filter.limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Atomically claim a Pending, unassigned task for `contractor_id`.
    ///
    /// The WHERE clause is the entire precondition; zero affected rows means
    /// the task was missing or someone else won the race, and nothing was
    /// mutated. On success the contractor is appended to the assignment
    /// history.
    pub async fn claim(
        pool: &PgPool,
        task_id: DbId,
        contractor_id: DbId,
    ) -> Result<ClaimOutcome, sqlx::Error> {
        let query = format!(
            "UPDATE tasks SET \
                status = 'assigned', \
                assigned_to = $2, \
                assigned_contractors = array_append(assigned_contractors, $2), \
                updated_at = now() \
             WHERE id = $1 AND status = 'pending' AND assigned_to IS NULL \
             RETURNING {TASK_COLUMNS}"
        );

        let claimed = sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .bind(contractor_id)
            .fetch_optional(pool)
            .await?;

        if let Some(task) = claimed {
            return Ok(ClaimOutcome::Claimed(task));
        }

        // Precondition failed: distinguish a lost race from a missing task.
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tasks WHERE id = $1)")
            .bind(task_id)
            .fetch_one(pool)
            .await?;

        Ok(if exists {
            ClaimOutcome::AlreadyClaimed
        } else {
            ClaimOutcome::NotFound
        })
    }

    /// Conditionally transition a task the caller owns from `from` to `to`.
    ///
    /// The UPDATE is keyed on the observed status and the owner, so a
    /// concurrent transition makes this return `None` instead of clobbering.
    /// Cancellation clears `assigned_to` (history stays in
    /// `assigned_contractors`); completion stamps `completed_at`.
    pub async fn update_status(
        pool: &PgPool,
        task_id: DbId,
        contractor_id: DbId,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks SET \
                status = $4, \
                assigned_to = CASE WHEN $4 = 'cancelled' THEN NULL ELSE assigned_to END, \
                completed_at = CASE WHEN $4 = 'completed' THEN now() ELSE completed_at END, \
                updated_at = now() \
             WHERE id = $1 AND assigned_to = $2 AND status = $3 \
             RETURNING {TASK_COLUMNS}"
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .bind(contractor_id)
            .bind(from.as_str())
            .bind(to.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Complete a task the caller owns, storing the completion artifacts.
    ///
    /// Valid only from Assigned or InProgress; the condition is enforced in
    /// the WHERE clause like every other transition.
    pub async fn complete(
        pool: &PgPool,
        task_id: DbId,
        contractor_id: DbId,
        input: &CompletionInput,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks SET \
                status = 'completed', \
                completed_at = now(), \
                completion_notes = $3, \
                completion_photos = $4, \
                updated_at = now() \
             WHERE id = $1 AND assigned_to = $2 AND status IN ('assigned', 'in_progress') \
             RETURNING {TASK_COLUMNS}"
        );

        sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .bind(contractor_id)
            .bind(&input.notes)
            .bind(&input.photos)
            .fetch_optional(pool)
            .await
    }

    /// Fetch a task by id.
    pub async fn get_by_id(pool: &PgPool, task_id: DbId) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }

    /// List tasks the contractor currently owns or has ever been assigned,
    /// newest first.
    pub async fn list_for_contractor(
        pool: &PgPool,
        contractor_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE assigned_to = $1 OR $1 = ANY(assigned_contractors) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(contractor_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Insert a new Pending task. Task creation belongs to the back-office
    /// collaborator; this exists for that boundary and for tests.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        pool: &PgPool,
        order_id: DbId,
        task_type: &str,
        lat: f64,
        lng: f64,
        required_skills: &[String],
        payment_amount_cents: Option<i64>,
    ) -> Result<Task, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks (order_id, task_type, lat, lng, required_skills, payment_amount_cents) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {TASK_COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(order_id)
            .bind(task_type)
            .bind(lat)
            .bind(lng)
            .bind(required_skills)
            .bind(payment_amount_cents)
            .fetch_one(pool)
            .await
    }
}
