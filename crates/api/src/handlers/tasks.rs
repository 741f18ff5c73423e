//! Handlers for the `/tasks` resource.
//!
//! All endpoints require authentication via [`AuthContractor`]. The claim
//! endpoint is the write-side counterpart of the real-time feed: the atomic
//! UPDATE in [`TaskRepo::claim`] decides the winner, and the handlers here
//! publish the resulting `task.*` events onto the bus.

use axum::extract::{Path, Query, State};
use axum::Json;
use dispatch_core::error::CoreError;
use dispatch_core::geo::{validate_radius_miles, GeoPoint};
use dispatch_core::task::{can_complete, check_contractor_transition, TaskStatus};
use dispatch_core::types::DbId;
use dispatch_db::models::task::{AvailableTask, AvailableTaskFilter, CompletionInput, Task};
use dispatch_db::repositories::{ClaimOutcome, TaskRepo};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthContractor;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::ws::broadcaster::{task_event, task_watchers};

/// Default search radius in miles when the query does not set one.
const DEFAULT_RADIUS_MILES: f64 = 25.0;

/// Maximum page size for task listings.
const MAX_LIMIT: i64 = 100;

/// Default page size for task listings.
const DEFAULT_LIMIT: i64 = 20;

// ---------------------------------------------------------------------------
// Query / request types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /tasks/available`.
#[derive(Debug, Deserialize)]
pub struct AvailableQuery {
    pub lat: f64,
    pub lng: f64,
    /// Search radius in miles. Defaults to 25, capped at 100.
    pub radius: Option<f64>,
    /// Comma-separated skill filter, e.g. `skills=delivery,assembly`.
    pub skills: Option<String>,
    /// Hide tasks this contractor was previously assigned. Defaults to `true`.
    pub exclude_interacted: Option<bool>,
    /// 1-based page number. Defaults to 1.
    pub page: Option<i64>,
    /// Page size. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
}

/// Query parameters for `GET /tasks/my-tasks`.
#[derive(Debug, Deserialize)]
pub struct MyTasksQuery {
    /// 1-based page number. Defaults to 1.
    pub page: Option<i64>,
    /// Page size. Defaults to 20, capped at 100.
    pub limit: Option<i64>,
}

/// Request body for `PUT /tasks/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    /// The requested status, e.g. `"in_progress"` or `"cancelled"`.
    pub new_status: String,
}

/// Request body for `POST /tasks/{id}/complete`.
#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub notes: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

// ---------------------------------------------------------------------------
// Read endpoints
// ---------------------------------------------------------------------------

/// GET /api/v1/tasks/available
///
/// List Pending, unassigned tasks near a point, closest first.
pub async fn list_available(
    auth: AuthContractor,
    State(state): State<AppState>,
    Query(params): Query<AvailableQuery>,
) -> AppResult<Json<DataResponse<Vec<AvailableTask>>>> {
    let location = GeoPoint::new(params.lat, params.lng);
    location.validate().map_err(AppError::Core)?;

    let radius_miles = params.radius.unwrap_or(DEFAULT_RADIUS_MILES);
    validate_radius_miles(radius_miles).map_err(AppError::Core)?;

    let skills = params.skills.map(|s| {
        dispatch_core::contractor::normalize_skills(s.split(',').map(str::to_string))
    });

    let filter = AvailableTaskFilter {
        location,
        radius_miles,
        skills,
        exclude_interacted: params.exclude_interacted.unwrap_or(true),
        page: params.page.unwrap_or(1).max(1),
        limit: params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
    };

    let tasks = TaskRepo::list_available(&state.pool, auth.contractor_id, &filter).await?;

    Ok(Json(DataResponse { data: tasks }))
}

/// GET /api/v1/tasks/my-tasks
///
/// List tasks currently or previously assigned to the caller, newest first.
pub async fn my_tasks(
    auth: AuthContractor,
    State(state): State<AppState>,
    Query(params): Query<MyTasksQuery>,
) -> AppResult<Json<DataResponse<Vec<Task>>>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = (params.page.unwrap_or(1).max(1) - 1) * limit;

    let tasks = TaskRepo::list_for_contractor(&state.pool, auth.contractor_id, limit, offset).await?;

    Ok(Json(DataResponse { data: tasks }))
}

/// GET /api/v1/tasks/{id}
///
/// Fetch one task. Pending tasks are visible to every contractor; once
/// assigned, a task is visible only to contractors in its assignment history.
pub async fn get_task(
    auth: AuthContractor,
    State(state): State<AppState>,
    Path(task_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Task>>> {
    let task = TaskRepo::get_by_id(&state.pool, task_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Task",
            id: task_id,
        }))?;

    let visible = task.status()?.is_claimable() || task.has_interacted(auth.contractor_id);
    if !visible {
        return Err(AppError::Core(CoreError::Forbidden(
            "Task is assigned to another contractor".into(),
        )));
    }

    Ok(Json(DataResponse { data: task }))
}

// ---------------------------------------------------------------------------
// Write endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/tasks/{id}/claim
///
/// Atomically claim a Pending task. Exactly one concurrent caller wins; the
/// rest get 409. The winner's connections receive `task:assigned`; watchers
/// of the task's area and skills receive `task:claimed` (minus the winner).
pub async fn claim_task(
    auth: AuthContractor,
    State(state): State<AppState>,
    Path(task_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Task>>> {
    let outcome = TaskRepo::claim(&state.pool, task_id, auth.contractor_id).await?;

    let task = match outcome {
        ClaimOutcome::Claimed(task) => task,
        ClaimOutcome::AlreadyClaimed => {
            return Err(AppError::Core(CoreError::Conflict(
                "Task has already been claimed".into(),
            )));
        }
        ClaimOutcome::NotFound => {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "Task",
                id: task_id,
            }));
        }
    };

    tracing::info!(task_id, contractor_id = auth.contractor_id, "Task claimed");

    // The winner hears task:assigned; everyone else watching the task's area
    // or skills hears task:claimed so their available lists drop it.
    state.event_bus.publish(
        task_event("task.assigned", &task, Default::default()).to_contractor(auth.contractor_id),
    );
    state.event_bus.publish(
        task_event("task.claimed", &task, task_watchers(&task)).excluding(auth.contractor_id),
    );

    Ok(Json(DataResponse { data: task }))
}

/// PUT /api/v1/tasks/{id}/status
///
/// Transition a task the caller owns. Ownership and legality are validated
/// against the current row, then the write re-checks both conditions so a
/// concurrent transition loses cleanly instead of clobbering.
pub async fn update_status(
    auth: AuthContractor,
    State(state): State<AppState>,
    Path(task_id): Path<DbId>,
    Json(input): Json<StatusUpdateRequest>,
) -> AppResult<Json<DataResponse<Task>>> {
    let requested: TaskStatus = input.new_status.parse()?;

    let task = TaskRepo::get_by_id(&state.pool, task_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Task",
            id: task_id,
        }))?;
    let current = task.status()?;

    check_contractor_transition(current, requested, task.assigned_to, auth.contractor_id)?;

    let updated = TaskRepo::update_status(&state.pool, task_id, auth.contractor_id, current, requested)
        .await?
        .ok_or(AppError::Core(CoreError::Conflict(
            "Task was modified concurrently".into(),
        )))?;

    tracing::info!(
        task_id,
        contractor_id = auth.contractor_id,
        from = %current,
        to = %requested,
        "Task status updated"
    );

    let event_type = match requested {
        TaskStatus::Cancelled => "task.cancelled",
        TaskStatus::Completed => "task.completed",
        _ => "task.updated",
    };
    state
        .event_bus
        .publish(task_event(event_type, &updated, task_watchers(&updated)));

    Ok(Json(DataResponse { data: updated }))
}

/// POST /api/v1/tasks/{id}/complete
///
/// Complete a task the caller owns, attaching completion notes and photos.
pub async fn complete_task(
    auth: AuthContractor,
    State(state): State<AppState>,
    Path(task_id): Path<DbId>,
    Json(input): Json<CompleteRequest>,
) -> AppResult<Json<DataResponse<Task>>> {
    let task = TaskRepo::get_by_id(&state.pool, task_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Task",
            id: task_id,
        }))?;

    if task.assigned_to != Some(auth.contractor_id) {
        return Err(AppError::Core(CoreError::Forbidden(
            "Only the assigned contractor can complete this task".into(),
        )));
    }
    if !can_complete(task.status()?) {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Task cannot be completed from status {}",
            task.status
        ))));
    }

    let completion = CompletionInput {
        notes: input.notes,
        photos: input.photos,
    };

    let completed = TaskRepo::complete(&state.pool, task_id, auth.contractor_id, &completion)
        .await?
        .ok_or(AppError::Core(CoreError::Conflict(
            "Task was modified concurrently".into(),
        )))?;

    tracing::info!(task_id, contractor_id = auth.contractor_id, "Task completed");

    state
        .event_bus
        .publish(task_event("task.completed", &completed, task_watchers(&completed)));

    Ok(Json(DataResponse { data: completed }))
}
