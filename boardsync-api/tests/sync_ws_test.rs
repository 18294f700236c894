//! End-to-end websocket tests
//!
//! Runs the real server on an ephemeral port and subscribes with the real
//! client transport, verifying that mutations come out of the socket as
//! decoded change events and that the handshake enforces authentication.

mod common;

use boardsync_client::agent::SyncAgent;
use boardsync_client::api::ApiClient;
use boardsync_client::transport::{ChannelTransport, Connector, WsConnector};
use boardsync_shared::events::ServerMessage;
use boardsync_shared::models::task::{AssignTaskRequest, CreateTaskRequest};
use boardsync_shared::models::user::RegisterRequest;
use common::TestContext;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::time::Duration;

/// Serves the context's router on an ephemeral port.
async fn spawn_server(ctx: &TestContext) -> anyhow::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(axum::serve(listener, ctx.app.clone()).into_future());
    Ok(addr)
}

fn ws_url(addr: SocketAddr) -> String {
    format!("ws://{addr}/api/v1/tasks/ws")
}

/// The server registers its subscriptions in a task spawned after the
/// handshake; give it a beat before publishing, or the event is missed.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

/// Receives the next event, bounded so a broken stream fails the test
/// instead of hanging it.
async fn recv<T: ChannelTransport>(transport: &mut T) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(5), transport.next_message())
        .await
        .expect("timed out waiting for event")
        .expect("event stream closed")
}

#[tokio::test]
async fn mutations_reach_a_live_subscriber() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let addr = spawn_server(&ctx).await?;

    let connector = WsConnector::new(ws_url(addr), ctx.token_for(ctx.ada.id));
    let mut transport = connector.connect().await?;
    settle().await;

    let created = ctx
        .state
        .mutations
        .create(CreateTaskRequest {
            name: "Deploy the release".to_string(),
            description: None,
            assignee: None,
        })
        .await?;

    match recv(&mut transport).await {
        ServerMessage::TaskUpserted { task } => {
            assert_eq!(task.task_id, created.task_id);
            assert_eq!(task.name, "Deploy the release");
        }
        other => panic!("expected an upsert, got {other:?}"),
    }

    ctx.state.mutations.delete(created.task_id).await?;
    match recv(&mut transport).await {
        ServerMessage::TaskDeleted { task_id } => assert_eq!(task_id, created.task_id),
        other => panic!("expected a delete, got {other:?}"),
    }

    transport.close().await;
    Ok(())
}

#[tokio::test]
async fn assignee_also_receives_the_notice() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let addr = spawn_server(&ctx).await?;

    let connector = WsConnector::new(ws_url(addr), ctx.token_for(ctx.bob.id));
    let mut transport = connector.connect().await?;
    settle().await;

    ctx.state
        .mutations
        .create(CreateTaskRequest {
            name: "Write the changelog".to_string(),
            description: None,
            assignee: Some(ctx.bob.id),
        })
        .await?;

    // Bob's session gets the broadcast upsert and his personal notice; the
    // two ride different channels, so arrival order is not guaranteed.
    let first = recv(&mut transport).await;
    let second = recv(&mut transport).await;
    let mut saw_upsert = false;
    let mut saw_notice = false;
    for message in [first, second] {
        match message {
            ServerMessage::TaskUpserted { task } => {
                assert_eq!(task.assignee_id, Some(ctx.bob.id));
                saw_upsert = true;
            }
            ServerMessage::AssignmentNotice { message } => {
                assert_eq!(message, "You have been assigned a new task: Write the changelog");
                saw_notice = true;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert!(saw_upsert && saw_notice);

    transport.close().await;
    Ok(())
}

/// The full HTTP round trip: a registered client drives every mutation
/// over the wire while two live sessions merge the resulting events, and
/// both mirrors end up identical.
#[tokio::test]
async fn http_driven_mutations_converge_two_live_mirrors() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let addr = spawn_server(&ctx).await?;
    let base_url = format!("http://{addr}");

    ApiClient::register(
        &base_url,
        &RegisterRequest {
            full_name: "Grace Hopper".to_string(),
            email: "grace@example.com".to_string(),
            password: "compilers-and-cobol".to_string(),
            phone: "555-0102".to_string(),
        },
    )
    .await?;
    let api = ApiClient::login(&base_url, "grace@example.com", "compilers-and-cobol").await?;
    let grace_id = api
        .list_users()
        .await?
        .into_iter()
        .find(|u| u.email == "grace@example.com")
        .expect("registered user is listed")
        .user_id;

    let mut grace_ws = WsConnector::new(ws_url(addr), api.token()).connect().await?;
    let mut ada_ws = WsConnector::new(ws_url(addr), ctx.token_for(ctx.ada.id))
        .connect()
        .await?;
    settle().await;

    let mut grace_agent = SyncAgent::new(
        WsConnector::new(ws_url(addr), api.token()),
        api.clone(),
        grace_id,
    );
    let mut ada_agent = SyncAgent::new(
        WsConnector::new(ws_url(addr), ctx.token_for(ctx.ada.id)),
        api.clone(),
        ctx.ada.id,
    );

    let chart = api
        .create_task(&CreateTaskRequest {
            name: "Chart the sprint".to_string(),
            description: None,
            assignee: None,
        })
        .await?;
    api.assign_task(&AssignTaskRequest {
        task_id: chart,
        new_assignee_id: grace_id,
    })
    .await?;

    let fetched = api.get_task(chart).await?;
    assert_eq!(fetched.assignee_name.as_deref(), Some("Grace Hopper"));
    let mine = api.my_tasks().await?;
    assert!(mine.iter().any(|t| t.task_id == chart));

    let doomed = api
        .create_task(&CreateTaskRequest {
            name: "Deploy".to_string(),
            description: None,
            assignee: None,
        })
        .await?;
    api.delete_task(doomed).await?;

    // Grace's session additionally carries her assignment notice.
    for _ in 0..5 {
        let message = recv(&mut grace_ws).await;
        grace_agent.apply(message).await;
    }
    for _ in 0..4 {
        let message = recv(&mut ada_ws).await;
        ada_agent.apply(message).await;
    }

    assert_eq!(grace_agent.mirror(), ada_agent.mirror());
    assert_eq!(grace_agent.mirror().len(), 1);
    // The assignment broadcast carries no name; both agents resolved it
    // through the live user listing.
    let merged = grace_agent.mirror().get(chart).unwrap();
    assert_eq!(merged.assignee_name.as_deref(), Some("Grace Hopper"));
    assert!(!grace_agent.mirror().contains(doomed));
    assert_eq!(grace_agent.notices().len(), 1);
    assert_eq!(grace_agent.my_tasks().len(), 1);
    assert!(ada_agent.my_tasks().is_empty());

    grace_ws.close().await;
    ada_ws.close().await;
    Ok(())
}

#[tokio::test]
async fn handshake_rejects_a_bad_token() -> anyhow::Result<()> {
    let ctx = TestContext::new().await?;
    let addr = spawn_server(&ctx).await?;

    let connector = WsConnector::new(ws_url(addr), "not-a-token");
    assert!(connector.connect().await.is_err());
    Ok(())
}
