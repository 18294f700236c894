/// Change-event wire types for the real-time channel
///
/// Every successful mutation produces exactly one [`ServerMessage`] fanned
/// out to all connected clients; assignment notices additionally go to the
/// affected user's own sessions. Messages are JSON text frames, internally
/// tagged so clients can dispatch on `"type"`.
///
/// # Wire Format
///
/// ```json
/// {"type":"task_upserted","task":{"task_id":1,"name":"Write docs",...}}
/// {"type":"task_deleted","task_id":1}
/// {"type":"assignment_notice","message":"You have been assigned ..."}
/// ```
use serde::{Deserialize, Serialize};

use crate::models::task::TaskView;

/// A message pushed from the server to connected clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A task was created or changed; `task` is a complete snapshot
    ///
    /// The assignee display name may be absent, in which case the client
    /// resolves it lazily through its user directory.
    TaskUpserted { task: TaskView },

    /// A task was deleted; only the ID is carried
    TaskDeleted { task_id: i64 },

    /// Free-text notification delivered only to the assigned user
    AssignmentNotice { message: String },
}

impl ServerMessage {
    /// Serializes the message for a websocket text frame
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses a websocket text frame
    pub fn from_text(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
