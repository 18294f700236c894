//! # BoardSync Client
//!
//! Headless sync client: logs in, subscribes to the server's change-event
//! stream and keeps a local mirror of the task board, logging every merge.
//! Exits once the connection is lost and reconnect attempts are exhausted.
//!
//! ## Usage
//!
//! ```bash
//! BOARDSYNC_URL=http://localhost:8080 \
//! BOARDSYNC_EMAIL=ada@example.com \
//! BOARDSYNC_PASSWORD=... \
//! cargo run -p boardsync-client
//! ```

use boardsync_client::agent::SyncAgent;
use boardsync_client::api::ApiClient;
use boardsync_client::transport::WsConnector;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boardsync_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("BoardSync Client v{} starting...", env!("CARGO_PKG_VERSION"));

    let base_url =
        std::env::var("BOARDSYNC_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let email = std::env::var("BOARDSYNC_EMAIL")
        .map_err(|_| anyhow::anyhow!("BOARDSYNC_EMAIL must be set"))?;
    let password = std::env::var("BOARDSYNC_PASSWORD")
        .map_err(|_| anyhow::anyhow!("BOARDSYNC_PASSWORD must be set"))?;

    let api = ApiClient::login(base_url, &email, &password).await?;
    tracing::info!(%email, "logged in");

    // The login response carries only a token; recover our own user id
    // from the user directory listing.
    let me = api
        .list_users()
        .await?
        .into_iter()
        .find(|u| u.email.eq_ignore_ascii_case(&email))
        .ok_or_else(|| anyhow::anyhow!("logged-in user missing from user listing"))?;

    let connector = WsConnector::new(api.ws_url(), api.token());
    let mut agent = SyncAgent::new(connector, api, me.user_id);

    agent.run().await;

    tracing::info!(
        tasks = agent.mirror().len(),
        mine = agent.my_tasks().len(),
        notices = agent.notices().len(),
        "sync ended"
    );
    for (status, column) in agent.mirror().board() {
        let names: Vec<&str> = column.iter().map(|v| v.name.as_str()).collect();
        tracing::info!(status = status.as_str(), tasks = ?names, "board column");
    }

    Ok(())
}
