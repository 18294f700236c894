/// Task model and request types
///
/// This module provides the Task model representing cards on the kanban
/// board, plus the request DTOs for the mutation endpoints.
///
/// # Board Columns
///
/// ```text
/// Todo → InProgress → Completed
/// ```
///
/// A task may move between any two columns; there is no enforced ordering.
///
/// # Example
///
/// ```
/// use boardsync_shared::models::task::{Task, TaskStatus};
/// use chrono::Utc;
///
/// let task = Task {
///     id: 1,
///     name: "Write docs".to_string(),
///     description: None,
///     assignee: None,
///     status: TaskStatus::Todo,
///     created_at: Utc::now(),
///     updated_at: None,
/// };
/// assert!(!task.status.is_done());
/// ```
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Column a task currently sits in
///
/// Serialized as the exact column names (`"Todo"`, `"InProgress"`,
/// `"Completed"`) that clients use to key their board columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Not started
    Todo,

    /// Being worked on
    InProgress,

    /// Finished
    Completed,
}

impl TaskStatus {
    /// Converts status to its canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "Todo",
            TaskStatus::InProgress => "InProgress",
            TaskStatus::Completed => "Completed",
        }
    }

    /// Checks whether the task is in the terminal column
    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

/// Error returned when a status string does not name a column
#[derive(Debug, thiserror::Error)]
#[error("invalid status value: {0}")]
pub struct InvalidStatus(pub String);

impl FromStr for TaskStatus {
    type Err = InvalidStatus;

    /// Parses a status string, case-insensitively
    ///
    /// Mutation requests carry the status as a string; an unknown value
    /// rejects the whole mutation before anything is persisted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "inprogress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }
}

/// A task record as persisted by the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Task ID (store-assigned, immutable)
    pub id: i64,

    /// Task name (non-empty, at most 200 characters)
    pub name: String,

    /// Optional free-text description (at most 1000 characters)
    pub description: Option<String>,

    /// User the task is assigned to; `None` means unassigned
    ///
    /// Always references an existing user; removing a user clears the
    /// reference on every task it appeared on.
    pub assignee: Option<i64>,

    /// Current board column
    pub status: TaskStatus,

    /// Creation timestamp (immutable)
    pub created_at: DateTime<Utc>,

    /// Set on every mutation after creation
    pub updated_at: Option<DateTime<Utc>>,
}

/// Read-model projection of a task
///
/// This is the shape held in the cache, pushed over the broadcast channel
/// and mirrored by clients. It carries the assignee display name so a
/// client can render the card without a follow-up fetch; the name may be
/// absent, in which case the client resolves it lazily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    /// Task ID
    pub task_id: i64,

    /// Task name
    pub name: String,

    /// Description, if any
    pub description: Option<String>,

    /// Assigned user ID, if any
    pub assignee_id: Option<i64>,

    /// Assignee display name, when already resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,

    /// Current board column
    pub status: TaskStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp, if mutated after creation
    pub updated_at: Option<DateTime<Utc>>,
}

impl TaskView {
    /// Builds a view from a task record plus an optional resolved name
    pub fn from_task(task: &Task, assignee_name: Option<String>) -> Self {
        Self {
            task_id: task.id,
            name: task.name.clone(),
            description: task.description.clone(),
            assignee_id: task.assignee,
            assignee_name,
            status: task.status,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// Request body for `POST /api/v1/tasks`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTaskRequest {
    /// Task name
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    /// Optional description
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    /// Optional initial assignee (user ID)
    pub assignee: Option<i64>,
}

/// Request body for `PUT /api/v1/tasks/{id}`
///
/// Partial-update semantics: fields left out of the request keep their
/// stored value. The status travels as a string and is decoded by the
/// mutation service so an unknown column name rejects the whole request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    /// Task ID; must match the path ID
    pub task_id: i64,

    /// New name, if changing
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,

    /// New description, if changing
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    /// New assignee, if changing
    pub assignee: Option<i64>,

    /// New status, if changing
    pub status: Option<String>,
}

/// Request body for `PUT /api/v1/tasks/assign`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AssignTaskRequest {
    /// Task to reassign
    pub task_id: i64,

    /// User receiving the task; must exist
    pub new_assignee_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Completed] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_parse_case_insensitive() {
        assert_eq!("inprogress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("TODO".parse::<TaskStatus>().unwrap(), TaskStatus::Todo);
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert!("Done".parse::<TaskStatus>().is_err());
        assert!("".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_as_column_name() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"InProgress\"");
    }
}
