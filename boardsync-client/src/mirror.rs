//! Local mirror of the server's task set.
//!
//! The mirror is the client-side source of truth for rendering: a flat map
//! of task id to the most recent [`TaskView`] the client has seen, whether
//! that view arrived over the real-time channel or from a full reload.
//!
//! Merge semantics are deliberately simple. An upsert replaces the stored
//! view wholesale (no field-level merge), so applying the same event twice
//! is idempotent and events can be coalesced freely upstream. Derived views
//! like the per-status board and the "my tasks" list are recomputed from the
//! map on demand rather than maintained incrementally.

use boardsync_shared::models::task::{TaskStatus, TaskView};
use std::collections::HashMap;

/// Client-side copy of every task the server has shown us.
#[derive(Debug, Default, PartialEq)]
pub struct TaskMirror {
    tasks: HashMap<i64, TaskView>,
}

impl TaskMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace a task. Returns the previous view, if any,
    /// so callers can revert an optimistic update that the server rejected.
    pub fn upsert(&mut self, view: TaskView) -> Option<TaskView> {
        self.tasks.insert(view.task_id, view)
    }

    /// Remove a task. Unknown ids are a no-op: a delete event may race a
    /// reload that never contained the task.
    pub fn remove(&mut self, task_id: i64) -> Option<TaskView> {
        self.tasks.remove(&task_id)
    }

    pub fn get(&self, task_id: i64) -> Option<&TaskView> {
        self.tasks.get(&task_id)
    }

    pub fn contains(&self, task_id: i64) -> bool {
        self.tasks.contains_key(&task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop everything and adopt a freshly loaded task set. Used after
    /// reconnecting, when events may have been missed and the server state
    /// must be taken as-is.
    pub fn replace_all(&mut self, views: Vec<TaskView>) {
        self.tasks.clear();
        for view in views {
            self.tasks.insert(view.task_id, view);
        }
    }

    /// Tasks grouped by status, each column ordered by task id. Recomputed
    /// from the map on every call.
    pub fn board(&self) -> HashMap<TaskStatus, Vec<&TaskView>> {
        let mut board: HashMap<TaskStatus, Vec<&TaskView>> = HashMap::new();
        for view in self.tasks.values() {
            board.entry(view.status).or_default().push(view);
        }
        for column in board.values_mut() {
            column.sort_by_key(|view| view.task_id);
        }
        board
    }

    /// Tasks assigned to the given user, ordered by task id.
    pub fn tasks_for(&self, user_id: i64) -> Vec<&TaskView> {
        let mut mine: Vec<&TaskView> = self
            .tasks
            .values()
            .filter(|view| view.assignee_id == Some(user_id))
            .collect();
        mine.sort_by_key(|view| view.task_id);
        mine
    }
}
