//! # BoardSync Client Library
//!
//! Client-side synchronization for a BoardSync server: keeps a local mirror
//! of the task board in step with the server's change-event stream, with a
//! full reload on every (re)connect and optimistic status mutations.
//!
//! ## Modules
//!
//! - `agent`: The sync agent (connection lifecycle, merging, reconnect backoff)
//! - `api`: HTTP client for the task API
//! - `transport`: Change-event stream transports (websocket and mock)
//! - `mirror`: Local task mirror and its derived views
//! - `users`: Assignee name directory with coalesced lookups
//! - `debounce`: Merge rate limiting
//!
//! ## Example
//!
//! ```no_run
//! use boardsync_client::agent::SyncAgent;
//! use boardsync_client::api::ApiClient;
//! use boardsync_client::transport::WsConnector;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let api = ApiClient::login("http://localhost:8080", "ada@example.com", "hunter2...").await?;
//! let connector = WsConnector::new(api.ws_url(), api.token());
//! let mut agent = SyncAgent::new(connector, api, 1);
//! agent.run().await;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod api;
pub mod debounce;
pub mod mirror;
pub mod transport;
pub mod users;
