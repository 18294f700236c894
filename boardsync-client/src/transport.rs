//! Real-time channel transport.
//!
//! The sync agent consumes change events through the [`ChannelTransport`]
//! trait so its connection handling, reload and merge logic can be tested
//! without a server. Production uses [`WsTransport`], a websocket client
//! speaking the JSON event frames the server publishes; tests use
//! [`MockTransport`], which replays a scripted stream.
//!
//! A [`Connector`] is the factory side of the seam: the agent asks it for
//! a fresh transport on every (re)connection attempt, which is where
//! failure injection hooks in for reconnect tests.

use async_trait::async_trait;
use boardsync_shared::events::ServerMessage;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Errors surfaced by the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Could not establish a connection
    #[error("connection failed: {0}")]
    Connect(String),

    /// The server closed the connection or the stream ended
    #[error("connection closed")]
    Closed,

    /// A frame arrived that does not decode as a change event
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// One live subscription to the server's change-event stream.
#[async_trait]
pub trait ChannelTransport: Send {
    /// Waits for the next change event. Returns [`TransportError::Closed`]
    /// when the connection is gone and the agent should reconnect.
    async fn next_message(&mut self) -> Result<ServerMessage, TransportError>;

    /// Closes the connection, best effort.
    async fn close(&mut self);
}

/// Builds transports; called once per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: ChannelTransport;

    async fn connect(&self) -> Result<Self::Transport, TransportError>;
}

/// Websocket connector carrying the endpoint and the caller's token.
///
/// The token rides in the `access_token` query parameter because browser
/// and native websocket handshakes cannot set an `Authorization` header.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    token: String,
}

impl WsConnector {
    /// `url` is the full websocket endpoint, e.g.
    /// `ws://localhost:8080/api/v1/tasks/ws`.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self) -> Result<WsTransport, TransportError> {
        let url = format!("{}?access_token={}", self.url, self.token);
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!(url = %self.url, "websocket connected");
        Ok(WsTransport { stream })
    }
}

/// Live websocket subscription.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl ChannelTransport for WsTransport {
    async fn next_message(&mut self) -> Result<ServerMessage, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    match ServerMessage::from_text(&text) {
                        Ok(message) => return Ok(message),
                        Err(e) => {
                            // An unknown frame is logged and skipped rather
                            // than killing the subscription.
                            tracing::warn!(error = %e, "dropping undecodable frame");
                        }
                    }
                }
                // Control and binary frames carry no events.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_))) => {}
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => return Err(TransportError::Protocol(e.to_string())),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.send(Message::Close(None)).await;
    }
}

/// Scripted transport for tests: yields queued events, then `Closed`.
pub struct MockTransport {
    events: std::collections::VecDeque<ServerMessage>,
}

impl MockTransport {
    pub fn new(events: Vec<ServerMessage>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

#[async_trait]
impl ChannelTransport for MockTransport {
    async fn next_message(&mut self) -> Result<ServerMessage, TransportError> {
        match self.events.pop_front() {
            Some(message) => Ok(message),
            None => Err(TransportError::Closed),
        }
    }

    async fn close(&mut self) {}
}
