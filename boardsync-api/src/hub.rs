//! Broadcast hub fanning change events out to connected clients.
//!
//! Two delivery paths, mirroring the real-time channel contract:
//!
//! - `publish_all` — every connected client, via one `tokio::sync::broadcast`
//!   channel. Each receiver sees events in publish order (per-connection
//!   FIFO); a slow receiver that lags simply loses the overwritten events,
//!   which is fine because clients reconcile with a full reload.
//! - `publish_to_user` — only the sessions authenticated as that user, via
//!   a per-user broadcast channel created on first subscribe. Zero sessions
//!   is not an error.
//!
//! Delivery is best-effort and not part of any transaction: a client that
//! is offline when an event is published never sees it retroactively.
use std::collections::HashMap;
use std::sync::RwLock;

use boardsync_shared::events::ServerMessage;
use tokio::sync::broadcast;

/// Buffered events per channel before a lagging receiver starts losing them
const CHANNEL_CAPACITY: usize = 256;

/// Fan-out hub for server-to-client messages
///
/// Constructed once at startup; shared by reference between the mutation
/// service (publisher) and the websocket route (subscriber side).
pub struct BroadcastHub {
    all: broadcast::Sender<ServerMessage>,
    per_user: RwLock<HashMap<i64, broadcast::Sender<ServerMessage>>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        let (all, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            all,
            per_user: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to the all-clients stream
    pub fn subscribe_all(&self) -> broadcast::Receiver<ServerMessage> {
        self.all.subscribe()
    }

    /// Subscribes to one user's notification stream
    ///
    /// The channel is created on first subscribe and reused by further
    /// sessions of the same user.
    pub fn subscribe_user(&self, user_id: i64) -> broadcast::Receiver<ServerMessage> {
        let mut per_user = self.per_user.write().expect("hub lock poisoned");
        per_user
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Delivers an event to every connected client
    ///
    /// Returns the number of receivers it reached; zero when nobody is
    /// connected, which is not an error.
    pub fn publish_all(&self, message: ServerMessage) -> usize {
        match self.all.send(message) {
            Ok(receivers) => receivers,
            Err(_) => 0,
        }
    }

    /// Delivers a notification to one user's sessions only
    ///
    /// Channels whose last session has disconnected are dropped here
    /// rather than on disconnect, keeping the map small without a
    /// session-tracking side table.
    pub fn publish_to_user(&self, user_id: i64, message: ServerMessage) -> usize {
        let mut per_user = self.per_user.write().expect("hub lock poisoned");
        match per_user.get(&user_id) {
            Some(sender) if sender.receiver_count() > 0 => {
                sender.send(message).unwrap_or(0)
            }
            Some(_) => {
                per_user.remove(&user_id);
                0
            }
            None => 0,
        }
    }

    /// Number of clients on the all-clients stream, for the health endpoint
    pub fn connected_clients(&self) -> usize {
        self.all.receiver_count()
    }
}
