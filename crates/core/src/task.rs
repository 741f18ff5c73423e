//! Task state machine: statuses, types, and the legal-transition rules.
//!
//! These rules are pure; the atomic enforcement happens in the database via
//! conditional updates (see `dispatch-db::repositories::TaskRepo`). Keeping
//! the rules here means an illegal transition is rejected with a structured
//! error before any write is attempted, and the rules themselves are
//! testable without a store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, unclaimed, visible in the available list.
    Pending,
    /// Claimed by exactly one contractor.
    Assigned,
    /// The assigned contractor has started work.
    InProgress,
    /// Finished; completion artifacts are set.
    Completed,
    /// Terminal; cancellation is a status, never a row deletion.
    Cancelled,
}

impl TaskStatus {
    /// The snake_case string stored in the `tasks.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a task in this status can still be claimed.
    pub fn is_claimable(&self) -> bool {
        matches!(self, TaskStatus::Pending)
    }

    /// Whether this status marks the end of the task's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "assigned" => Ok(TaskStatus::Assigned),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(CoreError::Validation(format!(
                "Unknown task status: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// TaskType
// ---------------------------------------------------------------------------

/// Kind of field work a task represents. Fixed, small enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Delivery,
    Setup,
    Pickup,
    Maintenance,
    Inspection,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Delivery => "delivery",
            TaskType::Setup => "setup",
            TaskType::Pickup => "pickup",
            TaskType::Maintenance => "maintenance",
            TaskType::Inspection => "inspection",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delivery" => Ok(TaskType::Delivery),
            "setup" => Ok(TaskType::Setup),
            "pickup" => Ok(TaskType::Pickup),
            "maintenance" => Ok(TaskType::Maintenance),
            "inspection" => Ok(TaskType::Inspection),
            other => Err(CoreError::Validation(format!("Unknown task type: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Transition rules
// ---------------------------------------------------------------------------

/// Whether `from -> to` is a legal status transition.
///
/// Pending -> Assigned is reserved for the claim operation; contractors
/// cannot reach it through a plain status update (see
/// [`check_contractor_transition`]). Assigned -> Completed exists so a task
/// can be completed without an explicit InProgress step.
pub fn is_legal_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;
    matches!(
        (from, to),
        (Pending, Assigned)
            | (Assigned, InProgress)
            | (Assigned, Completed)
            | (Assigned, Cancelled)
            | (InProgress, Completed)
            | (InProgress, Cancelled)
    )
}

/// Validate a contractor-initiated status update.
///
/// Checks ownership first (the caller must be the current assignee), then
/// transition legality. Claiming is excluded: Pending -> Assigned must go
/// through the atomic claim path.
pub fn check_contractor_transition(
    current: TaskStatus,
    requested: TaskStatus,
    assigned_to: Option<DbId>,
    contractor_id: DbId,
) -> Result<(), CoreError> {
    if assigned_to != Some(contractor_id) {
        return Err(CoreError::Forbidden(
            "Only the assigned contractor can update this task".into(),
        ));
    }
    if current.is_terminal() {
        return Err(CoreError::Conflict(format!(
            "Task is already {current} and cannot change status"
        )));
    }
    if current == TaskStatus::Pending && requested == TaskStatus::Assigned {
        return Err(CoreError::Validation(
            "Tasks are assigned through the claim operation, not a status update".into(),
        ));
    }
    if !is_legal_transition(current, requested) {
        return Err(CoreError::Conflict(format!(
            "Illegal status transition: {current} -> {requested}"
        )));
    }
    Ok(())
}

/// Whether a task in `current` status may be completed by its assignee.
pub fn can_complete(current: TaskStatus) -> bool {
    matches!(current, TaskStatus::Assigned | TaskStatus::InProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Assigned,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Cancelled,
        ] {
            let parsed: TaskStatus = status.as_str().parse().expect("parse should succeed");
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn unknown_status_string_is_validation_error() {
        let result = TaskStatus::from_str("paused");
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn only_pending_is_claimable() {
        use TaskStatus::*;
        assert!(Pending.is_claimable());
        for status in [Assigned, InProgress, Completed, Cancelled] {
            assert!(!status.is_claimable(), "{status} must not be claimable");
        }
        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!InProgress.is_terminal());
    }

    #[test]
    fn pending_to_completed_is_illegal() {
        assert!(!is_legal_transition(
            TaskStatus::Pending,
            TaskStatus::Completed
        ));
    }

    #[test]
    fn terminal_statuses_have_no_outgoing_transitions() {
        use TaskStatus::*;
        for terminal in [Completed, Cancelled] {
            for to in [Pending, Assigned, InProgress, Completed, Cancelled] {
                assert!(
                    !is_legal_transition(terminal, to),
                    "{terminal} -> {to} must be illegal"
                );
            }
        }
    }

    #[test]
    fn assigned_can_start_complete_or_cancel() {
        use TaskStatus::*;
        assert!(is_legal_transition(Assigned, InProgress));
        assert!(is_legal_transition(Assigned, Completed));
        assert!(is_legal_transition(Assigned, Cancelled));
        assert!(!is_legal_transition(Assigned, Pending));
    }

    #[test]
    fn non_owner_cannot_transition() {
        let result = check_contractor_transition(
            TaskStatus::Assigned,
            TaskStatus::InProgress,
            Some(10),
            99,
        );
        assert_matches!(result, Err(CoreError::Forbidden(_)));
    }

    #[test]
    fn owner_can_start_work() {
        let result = check_contractor_transition(
            TaskStatus::Assigned,
            TaskStatus::InProgress,
            Some(10),
            10,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn owner_cannot_revive_a_terminal_task() {
        for terminal in [TaskStatus::Completed, TaskStatus::Cancelled] {
            let result = check_contractor_transition(
                terminal,
                TaskStatus::InProgress,
                Some(10),
                10,
            );
            assert_matches!(result, Err(CoreError::Conflict(_)));
        }
    }

    #[test]
    fn claim_cannot_be_faked_through_status_update() {
        // Even a caller listed as assignee cannot move Pending -> Assigned here.
        let result =
            check_contractor_transition(TaskStatus::Pending, TaskStatus::Assigned, Some(10), 10);
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn completion_only_from_assigned_or_in_progress() {
        assert!(can_complete(TaskStatus::Assigned));
        assert!(can_complete(TaskStatus::InProgress));
        assert!(!can_complete(TaskStatus::Pending));
        assert!(!can_complete(TaskStatus::Completed));
        assert!(!can_complete(TaskStatus::Cancelled));
    }
}
