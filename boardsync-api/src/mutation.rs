//! Mutation service: the single write path for tasks.
//!
//! Every mutation runs the same three-step sequence:
//!
//! 1. persist the change in the store (the serialization point),
//! 2. evict exactly the cache keys the change invalidates,
//! 3. publish the change event to the broadcast hub.
//!
//! Step 2 completes strictly before step 3, so no client that has observed
//! a mutation's broadcast can still read a pre-mutation cache entry. The
//! publish itself is fire-and-forget and outside any transactional
//! boundary: a crash between commit and publish leaves the store correct
//! and clients stale until their next full reload.
//!
//! Validation failures (unknown status value, unknown assignee, missing
//! task) reject the whole mutation before anything is persisted, evicted
//! or published.
use std::str::FromStr;
use std::sync::Arc;

use boardsync_shared::{
    events::ServerMessage,
    models::task::{
        AssignTaskRequest, CreateTaskRequest, TaskStatus, TaskView, UpdateTaskRequest,
    },
    store::{NewTask, StoreError, TaskPatch, TaskStore},
};

use crate::{
    cache::{CacheKey, TaskCache},
    hub::BroadcastHub,
};

/// Error type for mutation operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// Status string does not name a board column
    #[error("invalid status value: {0}")]
    InvalidStatus(String),

    /// Target task does not exist
    #[error("task {0} not found")]
    TaskNotFound(i64),

    /// Target assignee does not exist
    #[error("assignee {0} not found")]
    AssigneeNotFound(i64),
}

impl From<StoreError> for MutationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TaskNotFound(id) => MutationError::TaskNotFound(id),
            StoreError::UserNotFound(id) => MutationError::AssigneeNotFound(id),
            // Mutations never insert users; surface as a missing reference.
            StoreError::EmailTaken(_) => unreachable!("task mutations do not touch user emails"),
        }
    }
}

/// Task write path with explicitly injected collaborators
///
/// The cache and hub handles are threaded through the constructor; there
/// is no global state.
pub struct MutationService {
    store: Arc<TaskStore>,
    cache: Arc<TaskCache>,
    hub: Arc<BroadcastHub>,
}

impl MutationService {
    pub fn new(store: Arc<TaskStore>, cache: Arc<TaskCache>, hub: Arc<BroadcastHub>) -> Self {
        Self { store, cache, hub }
    }

    /// Creates a task (status `Todo`), notifying the initial assignee
    ///
    /// Invalidates `AllTasks` and, when assigned, the assignee's
    /// `MyTasks` view. The broadcast carries the resolved assignee name
    /// so clients need no follow-up fetch.
    pub async fn create(&self, req: CreateTaskRequest) -> Result<TaskView, MutationError> {
        let task = self
            .store
            .insert_task(NewTask {
                name: req.name,
                description: req.description,
                assignee: req.assignee,
            })
            .await?;

        self.cache.remove(&CacheKey::AllTasks);
        if let Some(assignee) = task.assignee {
            self.cache.remove(&CacheKey::MyTasks(assignee));
        }

        let assignee_name = match task.assignee {
            Some(id) => self.store.user(id).await.map(|u| u.full_name),
            None => None,
        };
        let view = TaskView::from_task(&task, assignee_name);

        tracing::info!(task_id = task.id, "Task created");
        self.hub
            .publish_all(ServerMessage::TaskUpserted { task: view.clone() });
        if let Some(assignee) = task.assignee {
            self.hub.publish_to_user(
                assignee,
                ServerMessage::AssignmentNotice {
                    message: format!("You have been assigned a new task: {}", task.name),
                },
            );
        }

        Ok(view)
    }

    /// Applies a partial update to a task
    ///
    /// Fields absent from the request keep their stored value. An invalid
    /// status value rejects the whole mutation before anything is
    /// persisted. Invalidates `AllTasks`, `TaskById` and, when the
    /// assignee changed, both the old and new assignees' `MyTasks`
    /// views. The broadcast does not resolve the assignee name; clients
    /// look it up lazily.
    pub async fn update(&self, id: i64, req: UpdateTaskRequest) -> Result<TaskView, MutationError> {
        let status = req
            .status
            .as_deref()
            .map(TaskStatus::from_str)
            .transpose()
            .map_err(|e| MutationError::InvalidStatus(e.0))?;

        let (task, old_assignee) = self
            .store
            .apply_task_patch(
                id,
                TaskPatch {
                    name: req.name,
                    description: req.description,
                    assignee: req.assignee.map(Some),
                    status,
                },
            )
            .await?;

        self.cache.remove(&CacheKey::AllTasks);
        self.cache.remove(&CacheKey::TaskById(id));
        if old_assignee != task.assignee {
            if let Some(old) = old_assignee {
                self.cache.remove(&CacheKey::MyTasks(old));
            }
            if let Some(new) = task.assignee {
                self.cache.remove(&CacheKey::MyTasks(new));
            }
        }

        let view = TaskView::from_task(&task, None);
        tracing::info!(task_id = id, "Task updated");
        self.hub
            .publish_all(ServerMessage::TaskUpserted { task: view.clone() });

        Ok(view)
    }

    /// Reassigns a task, notifying the new assignee
    ///
    /// Rejects before any mutation when the task or the target user does
    /// not exist. Invalidates `AllTasks`, `TaskById` and both assignees'
    /// `MyTasks` views — and nothing else.
    pub async fn assign(&self, req: AssignTaskRequest) -> Result<TaskView, MutationError> {
        if self.store.task(req.task_id).await.is_none() {
            return Err(MutationError::TaskNotFound(req.task_id));
        }
        if self.store.user(req.new_assignee_id).await.is_none() {
            return Err(MutationError::AssigneeNotFound(req.new_assignee_id));
        }

        let (task, old_assignee) = self
            .store
            .apply_task_patch(
                req.task_id,
                TaskPatch {
                    assignee: Some(Some(req.new_assignee_id)),
                    ..Default::default()
                },
            )
            .await?;

        self.cache.remove(&CacheKey::AllTasks);
        self.cache.remove(&CacheKey::TaskById(req.task_id));
        if let Some(old) = old_assignee {
            self.cache.remove(&CacheKey::MyTasks(old));
        }
        self.cache.remove(&CacheKey::MyTasks(req.new_assignee_id));

        let view = TaskView::from_task(&task, None);
        tracing::info!(
            task_id = task.id,
            assignee = req.new_assignee_id,
            "Task assigned"
        );
        self.hub
            .publish_all(ServerMessage::TaskUpserted { task: view.clone() });
        self.hub.publish_to_user(
            req.new_assignee_id,
            ServerMessage::AssignmentNotice {
                message: format!("You have been assigned to task: {}", task.name),
            },
        );

        Ok(view)
    }

    /// Deletes a task
    ///
    /// Invalidates `AllTasks`, `TaskById` and, when assigned, the
    /// assignee's `MyTasks` view. The broadcast carries only the ID.
    pub async fn delete(&self, id: i64) -> Result<(), MutationError> {
        let task = self.store.remove_task(id).await?;

        self.cache.remove(&CacheKey::AllTasks);
        self.cache.remove(&CacheKey::TaskById(id));
        if let Some(assignee) = task.assignee {
            self.cache.remove(&CacheKey::MyTasks(assignee));
        }

        tracing::info!(task_id = id, "Task deleted");
        self.hub.publish_all(ServerMessage::TaskDeleted { task_id: id });

        Ok(())
    }
}
