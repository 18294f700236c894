//! Synchronization agent.
//!
//! The agent keeps a [`TaskMirror`] in step with the server. It holds one
//! subscription to the change-event stream at a time, merges each event
//! into the mirror (rate-limited by the [`Debouncer`]), resolves missing
//! assignee names through the [`UserDirectory`], and recomputes the
//! caller's own task list after every merge.
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected ──connect──> Connected ──stream lost──> Reconnecting
//!      ^                        ^                            │
//!      │                        └──────── reconnect ─────────┤
//!      └────────── retries exhausted (give up) ──────────────┘
//! ```
//!
//! Every successful connection, first or not, starts with a full reload:
//! the event stream has no replay, so anything published while the agent
//! was away is only recoverable by refetching the task list. Reconnect
//! attempts back off exponentially from one second, capped at thirty, and
//! stop for good after five failures in a row.
//!
//! # Optimistic mutations
//!
//! [`SyncAgent::move_task`] applies a status change to the mirror before
//! asking the server, and puts the previous view back if the server
//! refuses. The authoritative view still arrives over the event stream.

use crate::api::{ApiClientError, TaskApi};
use crate::debounce::Debouncer;
use crate::mirror::TaskMirror;
use crate::transport::{ChannelTransport, Connector, TransportError};
use crate::users::UserDirectory;
use boardsync_shared::events::ServerMessage;
use boardsync_shared::models::task::{TaskStatus, TaskView};
use std::time::Duration;

/// Where the agent currently stands with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying (initial, or retries exhausted)
    Disconnected,
    /// Subscribed to the event stream
    Connected,
    /// Stream lost; waiting out the backoff before attempt `attempt`
    Reconnecting { attempt: u32 },
}

/// Reconnect backoff schedule.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_retries: u32,
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (zero-based): `base * 2^attempt`,
    /// capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
            .unwrap_or(self.cap);
        exp.min(self.cap)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            max_retries: 5,
        }
    }
}

/// Client-side mirror keeper for one logged-in user.
pub struct SyncAgent<C, A> {
    connector: C,
    api: A,
    user_id: i64,
    mirror: TaskMirror,
    directory: UserDirectory,
    debouncer: Debouncer,
    backoff: BackoffPolicy,
    state: ConnectionState,
    my_tasks: Vec<TaskView>,
    notices: Vec<String>,
}

impl<C, A> SyncAgent<C, A>
where
    C: Connector,
    A: TaskApi,
{
    pub fn new(connector: C, api: A, user_id: i64) -> Self {
        Self {
            connector,
            api,
            user_id,
            mirror: TaskMirror::new(),
            directory: UserDirectory::new(),
            debouncer: Debouncer::default(),
            backoff: BackoffPolicy::default(),
            state: ConnectionState::Disconnected,
            my_tasks: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn mirror(&self) -> &TaskMirror {
        &self.mirror
    }

    pub fn directory(&self) -> &UserDirectory {
        &self.directory
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Tasks assigned to this user, as of the last merge.
    pub fn my_tasks(&self) -> &[TaskView] {
        &self.my_tasks
    }

    /// Assignment notices received this session, oldest first.
    pub fn notices(&self) -> &[String] {
        &self.notices
    }

    /// Connects and consumes the event stream until reconnect attempts are
    /// exhausted. Returns once the agent has given up; giving up is quiet
    /// (logged, not an error) because the mirror is still usable read-only.
    pub async fn run(&mut self) {
        let mut retries: u32 = 0;
        loop {
            match self.connector.connect().await {
                Ok(mut transport) => {
                    retries = 0;
                    self.state = ConnectionState::Connected;
                    tracing::info!(user_id = self.user_id, "subscribed to task events");
                    if let Err(e) = self.reload().await {
                        // Keep the stale mirror; the stream will converge it.
                        tracing::warn!(error = %e, "full reload failed");
                    }
                    let lost = self.pump(&mut transport).await;
                    transport.close().await;
                    tracing::warn!(error = %lost, "event stream lost");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "connect failed");
                }
            }

            if retries >= self.backoff.max_retries {
                self.state = ConnectionState::Disconnected;
                tracing::info!(retries, "reconnect attempts exhausted, giving up");
                return;
            }
            let delay = self.backoff.delay(retries);
            retries += 1;
            self.state = ConnectionState::Reconnecting { attempt: retries };
            tracing::debug!(attempt = retries, ?delay, "waiting before reconnect");
            tokio::time::sleep(delay).await;
        }
    }

    /// Replaces the mirror with the server's current task set, resolving
    /// any missing assignee names along the way.
    pub async fn reload(&mut self) -> Result<(), ApiClientError> {
        self.directory.preload(self.api.user_directory().await);
        let mut views = self.api.list_tasks().await?;
        for view in &mut views {
            match (view.assignee_name.as_ref(), view.assignee_id) {
                (Some(name), Some(id)) => self.directory.insert(id, name.clone()),
                (None, Some(id)) => {
                    let name = self.directory.resolve(id, || self.api.user_name(id)).await;
                    view.assignee_name = Some(name);
                }
                _ => {}
            }
        }
        tracing::debug!(tasks = views.len(), "mirror reloaded");
        self.mirror.replace_all(views);
        self.refresh_my_tasks();
        Ok(())
    }

    /// Moves a task to a new column, optimistically.
    ///
    /// The mirror is updated first so the UI reflects the drop instantly;
    /// if the server rejects the mutation the previous view is restored
    /// and the error returned to the caller.
    pub async fn move_task(
        &mut self,
        task_id: i64,
        status: TaskStatus,
    ) -> Result<(), ApiClientError> {
        let prior = self.mirror.get(task_id).cloned();
        if let Some(view) = &prior {
            let mut updated = view.clone();
            updated.status = status;
            self.mirror.upsert(updated);
            self.refresh_my_tasks();
        }

        match self.api.set_status(task_id, status.as_str()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Some(view) = prior {
                    self.mirror.upsert(view);
                    self.refresh_my_tasks();
                }
                tracing::warn!(task_id, error = %e, "status change rejected, reverted");
                Err(e)
            }
        }
    }

    async fn pump<T: ChannelTransport>(&mut self, transport: &mut T) -> TransportError {
        loop {
            match transport.next_message().await {
                Ok(message) => self.apply(message).await,
                Err(e) => return e,
            }
        }
    }

    /// Merges one event, honoring the debounce window. Events are applied
    /// strictly in arrival order; the debouncer only delays, never drops
    /// or reorders.
    pub async fn apply(&mut self, message: ServerMessage) {
        self.debouncer.throttle().await;
        match message {
            ServerMessage::TaskUpserted { task } => self.merge_upsert(task).await,
            ServerMessage::TaskDeleted { task_id } => {
                self.mirror.remove(task_id);
                tracing::debug!(task_id, "task removed from mirror");
            }
            ServerMessage::AssignmentNotice { message } => {
                tracing::info!(notice = %message, "assignment notice");
                self.notices.push(message);
            }
        }
        self.refresh_my_tasks();
    }

    async fn merge_upsert(&mut self, mut task: TaskView) {
        match (task.assignee_name.as_ref(), task.assignee_id) {
            // Event carries the name: remember it for future events.
            (Some(name), Some(id)) => self.directory.insert(id, name.clone()),
            // Name missing: show the card right away with the name blank,
            // then resolve it, coalescing with any lookup already in
            // flight for the same user. The lookup always completes and
            // re-upserts, even if the task was deleted meanwhile (an
            // accepted no-op re-add).
            (None, Some(id)) => {
                self.mirror.upsert(task.clone());
                let name = self.directory.resolve(id, || self.api.user_name(id)).await;
                task.assignee_name = Some(name);
            }
            _ => {}
        }
        tracing::debug!(task_id = task.task_id, "task merged into mirror");
        self.mirror.upsert(task);
    }

    fn refresh_my_tasks(&mut self) {
        self.my_tasks = self
            .mirror
            .tasks_for(self.user_id)
            .into_iter()
            .cloned()
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn view(task_id: i64, name: &str, assignee_id: Option<i64>) -> TaskView {
        TaskView {
            task_id,
            name: name.to_string(),
            description: None,
            assignee_id,
            assignee_name: None,
            status: TaskStatus::Todo,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn upserted(task: TaskView) -> ServerMessage {
        ServerMessage::TaskUpserted { task }
    }

    /// In-memory stand-in for the HTTP API.
    #[derive(Default)]
    struct FakeApi {
        listings: Mutex<VecDeque<Vec<TaskView>>>,
        names: Mutex<HashMap<i64, String>>,
        serve_directory: AtomicBool,
        reject_status: AtomicBool,
        status_calls: AtomicUsize,
        name_calls: AtomicUsize,
    }

    impl FakeApi {
        fn with_listing(tasks: Vec<TaskView>) -> Self {
            let api = Self::default();
            api.listings.lock().unwrap().push_back(tasks);
            api
        }

        fn push_listing(&self, tasks: Vec<TaskView>) {
            self.listings.lock().unwrap().push_back(tasks);
        }

        fn name(self, user_id: i64, name: &str) -> Self {
            self.names.lock().unwrap().insert(user_id, name.to_string());
            self
        }
    }

    #[async_trait]
    impl TaskApi for FakeApi {
        async fn list_tasks(&self) -> Result<Vec<TaskView>, ApiClientError> {
            Ok(self
                .listings
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }

        async fn user_directory(&self) -> Vec<(i64, String)> {
            if !self.serve_directory.load(Ordering::SeqCst) {
                return Vec::new();
            }
            self.names
                .lock()
                .unwrap()
                .iter()
                .map(|(id, name)| (*id, name.clone()))
                .collect()
        }

        async fn user_name(&self, user_id: i64) -> Option<String> {
            self.name_calls.fetch_add(1, Ordering::SeqCst);
            self.names.lock().unwrap().get(&user_id).cloned()
        }

        async fn set_status(&self, _task_id: i64, _status: &str) -> Result<(), ApiClientError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            if self.reject_status.load(Ordering::SeqCst) {
                return Err(ApiClientError::Server {
                    status: 400,
                    message: "invalid status value".to_string(),
                });
            }
            Ok(())
        }
    }

    /// Yields each scripted event stream once, then fails every connect.
    struct ScriptedConnector {
        scripts: Mutex<VecDeque<Vec<ServerMessage>>>,
        attempts: AtomicUsize,
    }

    impl ScriptedConnector {
        fn new(scripts: Vec<Vec<ServerMessage>>) -> Self {
            Self {
                scripts: Mutex::new(scripts.into()),
                attempts: AtomicUsize::new(0),
            }
        }

        fn always_failing() -> Self {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        type Transport = MockTransport;

        async fn connect(&self) -> Result<MockTransport, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.scripts.lock().unwrap().pop_front() {
                Some(events) => Ok(MockTransport::new(events)),
                None => Err(TransportError::Connect("refused".to_string())),
            }
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = BackoffPolicy::default();
        let seconds: Vec<u64> = (0..5).map(|n| policy.delay(n).as_secs()).collect();
        assert_eq!(seconds, vec![1, 2, 4, 8, 16]);
        assert_eq!(policy.delay(5), Duration::from_secs(30));
        assert_eq!(policy.delay(40), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_capped_retries() {
        let start = Instant::now();
        let connector = ScriptedConnector::always_failing();
        let mut agent = SyncAgent::new(connector, FakeApi::default(), 1);

        agent.run().await;

        assert_eq!(agent.state(), ConnectionState::Disconnected);
        // Initial attempt plus five retries.
        assert_eq!(agent.connector.attempts.load(Ordering::SeqCst), 6);
        // Backoff slept 1 + 2 + 4 + 8 + 16 seconds.
        assert_eq!(start.elapsed(), Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn initial_load_then_stream_merges() {
        let api = FakeApi::with_listing(vec![view(1, "Existing", None)]);
        let connector = ScriptedConnector::new(vec![vec![
            upserted(view(2, "From stream", None)),
            ServerMessage::TaskDeleted { task_id: 1 },
        ]]);
        let mut agent = SyncAgent::new(connector, api, 1);

        agent.run().await;

        assert!(!agent.mirror().contains(1));
        assert_eq!(agent.mirror().get(2).unwrap().name, "From stream");
        assert_eq!(agent.mirror().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_triggers_full_reload() {
        let api = FakeApi::with_listing(vec![view(1, "First session", None)]);
        // Tasks changed server-side while the agent was disconnected.
        api.push_listing(vec![view(2, "Second session", None)]);
        let connector = ScriptedConnector::new(vec![Vec::new(), Vec::new()]);
        let mut agent = SyncAgent::new(connector, api, 1);

        agent.run().await;

        // The reconnect reload replaced the task set wholesale: the task
        // only the first session knew about is gone, not merged.
        assert!(!agent.mirror().contains(1));
        assert!(agent.mirror().contains(2));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_assignee_name_is_resolved_once() {
        let api = FakeApi::default().name(5, "Eve Apfel");
        let connector = ScriptedConnector::new(vec![vec![
            upserted(view(1, "a", Some(5))),
            upserted(view(2, "b", Some(5))),
        ]]);
        let mut agent = SyncAgent::new(connector, api, 1);

        agent.run().await;

        assert_eq!(
            agent.mirror().get(1).unwrap().assignee_name.as_deref(),
            Some("Eve Apfel")
        );
        assert_eq!(
            agent.mirror().get(2).unwrap().assignee_name.as_deref(),
            Some("Eve Apfel")
        );
        // Second event hit the directory cache.
        assert_eq!(agent.api.name_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn preloaded_directory_skips_lookups() {
        let api = FakeApi::with_listing(vec![view(1, "a", Some(5))]).name(5, "Eve Apfel");
        api.serve_directory.store(true, Ordering::SeqCst);
        let mut agent = SyncAgent::new(ScriptedConnector::always_failing(), api, 1);

        agent.reload().await.unwrap();

        assert_eq!(
            agent.mirror().get(1).unwrap().assignee_name.as_deref(),
            Some("Eve Apfel")
        );
        // The directory listing covered the lookup.
        assert_eq!(agent.api.name_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_assignee_gets_placeholder() {
        let api = FakeApi::default();
        let connector = ScriptedConnector::new(vec![vec![upserted(view(1, "a", Some(9)))]]);
        let mut agent = SyncAgent::new(connector, api, 1);

        agent.run().await;

        assert_eq!(
            agent.mirror().get(1).unwrap().assignee_name.as_deref(),
            Some("User #9")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn event_carrying_name_seeds_directory() {
        let mut named = view(1, "a", Some(3));
        named.assignee_name = Some("Ada Lovelace".to_string());
        let connector = ScriptedConnector::new(vec![vec![upserted(named)]]);
        let mut agent = SyncAgent::new(connector, FakeApi::default(), 1);

        agent.run().await;

        assert_eq!(agent.directory().known(3).as_deref(), Some("Ada Lovelace"));
        assert_eq!(agent.api.name_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_merges_in_order_and_debounced() {
        let start = Instant::now();
        let connector = ScriptedConnector::always_failing();
        let mut agent = SyncAgent::new(connector, FakeApi::default(), 1);

        agent.apply(upserted(view(1, "v1", None))).await;
        agent.apply(upserted(view(1, "v2", None))).await;
        agent.apply(upserted(view(1, "v3", None))).await;

        // Last write wins, and the three merges were spread a window apart.
        assert_eq!(agent.mirror().get(1).unwrap().name, "v3");
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn two_agents_converge_regardless_of_arrival_order() {
        // Two sessions see the same publishes, but events on independent
        // publishes carry no cross-event ordering guarantee, so the second
        // session receives the two upserts swapped and the delete earlier.
        let chart = view(1, "Chart the sprint", None);
        let deploy = view(2, "Deploy", None);
        let doomed = view(3, "doomed", None);
        let events_a = vec![
            upserted(chart.clone()),
            upserted(deploy.clone()),
            ServerMessage::TaskDeleted { task_id: 3 },
        ];
        let events_b = vec![
            ServerMessage::TaskDeleted { task_id: 3 },
            upserted(deploy),
            upserted(chart),
        ];

        let api_a = FakeApi::with_listing(vec![doomed.clone()]);
        let api_b = FakeApi::with_listing(vec![doomed]);
        let mut agent_a = SyncAgent::new(ScriptedConnector::new(vec![events_a]), api_a, 1);
        let mut agent_b = SyncAgent::new(ScriptedConnector::new(vec![events_b]), api_b, 2);

        agent_a.run().await;
        agent_b.run().await;

        assert_eq!(agent_a.mirror(), agent_b.mirror());
        assert_eq!(agent_a.mirror().len(), 2);
        assert!(!agent_a.mirror().contains(3));
    }

    #[tokio::test(start_paused = true)]
    async fn my_tasks_follow_reassignment() {
        let connector = ScriptedConnector::always_failing();
        let api = FakeApi::default().name(1, "Me").name(2, "Them");
        let mut agent = SyncAgent::new(connector, api, 1);

        agent.apply(upserted(view(7, "mine", Some(1)))).await;
        assert_eq!(agent.my_tasks().len(), 1);

        agent.apply(upserted(view(7, "mine", Some(2)))).await;
        assert!(agent.my_tasks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn assignment_notices_are_recorded() {
        let connector = ScriptedConnector::new(vec![vec![ServerMessage::AssignmentNotice {
            message: "You have been assigned a new task: Deploy".to_string(),
        }]]);
        let mut agent = SyncAgent::new(connector, FakeApi::default(), 1);

        agent.run().await;

        assert_eq!(
            agent.notices(),
            ["You have been assigned a new task: Deploy"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_move_reverts_the_mirror() {
        let api = FakeApi::with_listing(vec![view(1, "Deploy", None)]);
        let connector = ScriptedConnector::always_failing();
        let mut agent = SyncAgent::new(connector, api, 1);
        agent.reload().await.unwrap();

        agent.api.reject_status.store(true, Ordering::SeqCst);
        let result = agent.move_task(1, TaskStatus::InProgress).await;

        assert!(result.is_err());
        assert_eq!(agent.mirror().get(1).unwrap().status, TaskStatus::Todo);
        assert_eq!(agent.api.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_move_keeps_optimistic_view() {
        let api = FakeApi::with_listing(vec![view(1, "Deploy", None)]);
        let connector = ScriptedConnector::always_failing();
        let mut agent = SyncAgent::new(connector, api, 1);
        agent.reload().await.unwrap();

        agent.move_task(1, TaskStatus::Completed).await.unwrap();

        assert_eq!(agent.mirror().get(1).unwrap().status, TaskStatus::Completed);
    }
}
