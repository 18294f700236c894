/// In-memory task and user store
///
/// Stand-in for the durable store, exposing exactly the operations the
/// rest of the system relies on: lookup by ID, lookup by assignee,
/// insert, update, delete — each atomic. A single `tokio::sync::RwLock`
/// guards the state, so the write lock is the serialization point for
/// concurrent mutations of the same row; mutations to different tasks
/// queue behind it only for the duration of the in-memory write.
///
/// Field updates are last-write-wins: two concurrent edits of the same
/// task serialize at the lock and the later one overwrites. There is no
/// optimistic-concurrency token; this is a known gap carried from the
/// system this store models.
///
/// # Example
///
/// ```
/// use boardsync_shared::store::{NewTask, NewUser, TaskStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = TaskStore::new();
/// let user = store.insert_user(NewUser {
///     full_name: "Ada Lovelace".to_string(),
///     email: "ada@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     phone: "555-0100".to_string(),
///     role: None,
/// }).await?;
///
/// let task = store.insert_task(NewTask {
///     name: "Write docs".to_string(),
///     description: None,
///     assignee: Some(user.id),
/// }).await?;
/// assert_eq!(store.tasks_for(user.id).await.len(), 1);
/// # let _ = task;
/// # Ok(())
/// # }
/// ```
use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::models::{
    task::{Task, TaskStatus},
    user::User,
};

/// Error type for store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No task with the given ID
    #[error("Task {0} not found")]
    TaskNotFound(i64),

    /// No user with the given ID
    #[error("User {0} not found")]
    UserNotFound(i64),

    /// Email already registered (compared case-insensitively)
    #[error("Email {0} already registered")]
    EmailTaken(String),
}

/// Fields for a task insert
#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub description: Option<String>,
    /// Initial assignee; must reference an existing user
    pub assignee: Option<i64>,
}

/// Fields for a user insert
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    /// Defaults to "User" when absent
    pub role: Option<String>,
}

/// Partial update applied atomically to a task
///
/// `None` fields keep their stored value. `assignee` is doubly optional:
/// the outer `None` means "unchanged", `Some(None)` clears the assignee.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub assignee: Option<Option<i64>>,
    pub status: Option<TaskStatus>,
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<i64, Task>,
    users: HashMap<i64, User>,
    next_task_id: i64,
    next_user_id: i64,
}

/// Shared in-memory store
///
/// Cheap to share via `Arc`; all methods take `&self`.
#[derive(Default)]
pub struct TaskStore {
    inner: RwLock<Inner>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a task with a fresh ID, status `Todo`
    ///
    /// # Errors
    ///
    /// `StoreError::UserNotFound` if the initial assignee does not exist.
    pub async fn insert_task(&self, new: NewTask) -> Result<Task, StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(assignee) = new.assignee {
            if !inner.users.contains_key(&assignee) {
                return Err(StoreError::UserNotFound(assignee));
            }
        }

        inner.next_task_id += 1;
        let task = Task {
            id: inner.next_task_id,
            name: new.name,
            description: new.description,
            assignee: new.assignee,
            status: TaskStatus::Todo,
            created_at: Utc::now(),
            updated_at: None,
        };
        inner.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    /// Looks up a task by ID
    pub async fn task(&self, id: i64) -> Option<Task> {
        self.inner.read().await.tasks.get(&id).cloned()
    }

    /// All tasks, ordered by ID
    pub async fn all_tasks(&self) -> Vec<Task> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<Task> = inner.tasks.values().cloned().collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    /// Tasks assigned to a user, ordered by ID
    pub async fn tasks_for(&self, user_id: i64) -> Vec<Task> {
        let inner = self.inner.read().await;
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.assignee == Some(user_id))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }

    /// Applies a partial update atomically, stamping `updated_at`
    ///
    /// Returns the updated task and the assignee it had before the patch,
    /// which the mutation service needs to compute cache invalidations.
    ///
    /// # Errors
    ///
    /// - `StoreError::TaskNotFound` if the task does not exist
    /// - `StoreError::UserNotFound` if the patch assigns an unknown user
    pub async fn apply_task_patch(
        &self,
        id: i64,
        patch: TaskPatch,
    ) -> Result<(Task, Option<i64>), StoreError> {
        let mut inner = self.inner.write().await;

        if let Some(Some(assignee)) = patch.assignee {
            if !inner.users.contains_key(&assignee) {
                return Err(StoreError::UserNotFound(assignee));
            }
        }

        let task = inner
            .tasks
            .get_mut(&id)
            .ok_or(StoreError::TaskNotFound(id))?;
        let old_assignee = task.assignee;

        if let Some(name) = patch.name {
            task.name = name;
        }
        if let Some(description) = patch.description {
            task.description = Some(description);
        }
        if let Some(assignee) = patch.assignee {
            task.assignee = assignee;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        task.updated_at = Some(Utc::now());

        Ok((task.clone(), old_assignee))
    }

    /// Removes a task, returning the removed record
    pub async fn remove_task(&self, id: i64) -> Result<Task, StoreError> {
        self.inner
            .write()
            .await
            .tasks
            .remove(&id)
            .ok_or(StoreError::TaskNotFound(id))
    }

    /// Inserts a user with a fresh ID
    ///
    /// # Errors
    ///
    /// `StoreError::EmailTaken` if the email is already registered,
    /// compared case-insensitively.
    pub async fn insert_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;

        let email_lower = new.email.to_lowercase();
        if inner
            .users
            .values()
            .any(|u| u.email.to_lowercase() == email_lower)
        {
            return Err(StoreError::EmailTaken(new.email));
        }

        inner.next_user_id += 1;
        let user = User {
            id: inner.next_user_id,
            full_name: new.full_name,
            email: new.email,
            password_hash: new.password_hash,
            phone: new.phone,
            role: new.role.unwrap_or_else(|| "User".to_string()),
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    /// Looks up a user by ID
    pub async fn user(&self, id: i64) -> Option<User> {
        self.inner.read().await.users.get(&id).cloned()
    }

    /// Looks up a user by email, case-insensitively
    pub async fn user_by_email(&self, email: &str) -> Option<User> {
        let email_lower = email.to_lowercase();
        self.inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email_lower)
            .cloned()
    }

    /// All users, ordered by ID
    pub async fn users(&self) -> Vec<User> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        users
    }

    /// Removes a user and clears the assignee on every task that
    /// referenced them, atomically — no dangling references survive
    pub async fn remove_user(&self, id: i64) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        let user = inner
            .users
            .remove(&id)
            .ok_or(StoreError::UserNotFound(id))?;

        for task in inner.tasks.values_mut() {
            if task.assignee == Some(id) {
                task.assignee = None;
                task.updated_at = Some(Utc::now());
            }
        }

        Ok(user)
    }

    /// (task count, user count), for the health endpoint
    pub async fn counts(&self) -> (usize, usize) {
        let inner = self.inner.read().await;
        (inner.tasks.len(), inner.users.len())
    }
}
