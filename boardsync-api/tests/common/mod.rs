/// Common test utilities for integration tests
///
/// Provides shared infrastructure:
/// - App construction with in-memory state
/// - Seeded test users
/// - JWT token generation
/// - Request helpers driving the router as a `tower::Service`
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use boardsync_api::app::{build_router, AppState};
use boardsync_api::config::{ApiConfig, CacheConfig, Config, JwtConfig};
use boardsync_shared::auth::jwt::{create_token, Claims};
use boardsync_shared::models::user::User;
use boardsync_shared::store::NewUser;
use chrono::Duration;
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Test context containing the router and its backing state
pub struct TestContext {
    pub app: Router,
    pub state: AppState,
    /// Seeded users: Ada and Bob
    pub ada: User,
    pub bob: User,
}

impl TestContext {
    /// Creates a context with a fresh in-memory state and two seeded users
    ///
    /// Seeded users carry a placeholder password hash; tests exercising
    /// the login path register through the API instead.
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            jwt: JwtConfig {
                secret: TEST_SECRET.to_string(),
                ttl_hours: 1,
            },
            cache: CacheConfig {
                sliding_secs: 300,
                absolute_secs: 1800,
            },
        };

        let state = AppState::new(config);

        let ada = state
            .store
            .insert_user(NewUser {
                full_name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "not-a-real-hash".to_string(),
                phone: "555-0100".to_string(),
                role: None,
            })
            .await?;
        let bob = state
            .store
            .insert_user(NewUser {
                full_name: "Bob Babbage".to_string(),
                email: "bob@example.com".to_string(),
                password_hash: "not-a-real-hash".to_string(),
                phone: "555-0101".to_string(),
                role: None,
            })
            .await?;

        let app = build_router(state.clone());

        Ok(TestContext {
            app,
            state,
            ada,
            bob,
        })
    }

    /// Issues a bearer token for a seeded user
    pub fn token_for(&self, user_id: i64) -> String {
        let claims = Claims::new(user_id, Duration::hours(1));
        create_token(&claims, TEST_SECRET).expect("token creation")
    }

    /// Sends a request through the router, returning status and JSON body
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request build");

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("router call");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body read");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    /// Creates a task through the API, returning its ID
    pub async fn create_task(&self, token: &str, body: Value) -> i64 {
        let (status, json) = self.send("POST", "/api/v1/tasks", Some(token), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {json}");
        json["data"]["task_id"].as_i64().expect("task_id")
    }
}
