//! HTTP client for the task API.
//!
//! Wraps `reqwest` with the server's envelope conventions: read endpoints
//! return `{"data": ..., "source": ...}`, mutations return a message plus
//! an optional payload, and errors carry `{"error", "message"}`. The
//! [`TaskApi`] trait is the slice of this surface the sync agent needs
//! (full reload and user-name lookup plus the mutations it applies
//! optimistically), kept as a trait so agent tests can swap in a fake.

use async_trait::async_trait;
use boardsync_shared::models::task::{
    AssignTaskRequest, CreateTaskRequest, TaskView, UpdateTaskRequest,
};
use boardsync_shared::models::user::{LoginRequest, RegisterRequest, UserSummary};
use serde::Deserialize;

/// Errors from the HTTP surface.
#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    /// The request never produced a response
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an error status
    #[error("{message} (status {status})")]
    Server {
        status: u16,
        message: String,
    },
}

/// Envelope around read responses.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct CreatedTask {
    task_id: i64,
}

/// Authenticated client bound to one server and one user's token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Registers a new account. Does not log in.
    pub async fn register(base_url: &str, request: &RegisterRequest) -> Result<(), ApiClientError> {
        let response = reqwest::Client::new()
            .post(format!("{base_url}/api/v1/auth/register"))
            .json(request)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    /// Logs in and returns a client carrying the issued token.
    ///
    /// `base_url` is the HTTP origin, e.g. `http://localhost:8080`.
    pub async fn login(
        base_url: impl Into<String>,
        email: &str,
        password: &str,
    ) -> Result<Self, ApiClientError> {
        let base_url = base_url.into();
        let http = reqwest::Client::new();
        let response = http
            .post(format!("{base_url}/api/v1/auth/login"))
            .json(&LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let login: LoginResponse = Self::check(response).await?.json().await?;
        Ok(Self {
            http,
            base_url,
            token: login.token,
        })
    }

    /// The bearer token this client authenticates with.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Websocket endpoint derived from the HTTP origin.
    pub fn ws_url(&self) -> String {
        let origin = self
            .base_url
            .replacen("https://", "wss://", 1)
            .replacen("http://", "ws://", 1);
        format!("{origin}/api/v1/tasks/ws")
    }

    pub async fn list_tasks(&self) -> Result<Vec<TaskView>, ApiClientError> {
        self.get_data("/api/v1/tasks").await
    }

    pub async fn my_tasks(&self) -> Result<Vec<TaskView>, ApiClientError> {
        self.get_data("/api/v1/tasks/my-tasks").await
    }

    pub async fn get_task(&self, task_id: i64) -> Result<TaskView, ApiClientError> {
        self.get_data(&format!("/api/v1/tasks/{task_id}")).await
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>, ApiClientError> {
        self.get_data("/api/v1/tasks/users").await
    }

    /// Creates a task and returns its id.
    pub async fn create_task(&self, request: &CreateTaskRequest) -> Result<i64, ApiClientError> {
        let response = self
            .http
            .post(format!("{}/api/v1/tasks", self.base_url))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;
        let envelope: DataEnvelope<CreatedTask> = Self::check(response).await?.json().await?;
        Ok(envelope.data.task_id)
    }

    pub async fn update_task(&self, request: &UpdateTaskRequest) -> Result<(), ApiClientError> {
        let response = self
            .http
            .put(format!("{}/api/v1/tasks/{}", self.base_url, request.task_id))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn assign_task(&self, request: &AssignTaskRequest) -> Result<(), ApiClientError> {
        let response = self
            .http
            .put(format!("{}/api/v1/tasks/assign", self.base_url))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn delete_task(&self, task_id: i64) -> Result<(), ApiClientError> {
        let response = self
            .http
            .delete(format!("{}/api/v1/tasks/{task_id}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get_data<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ApiClientError> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let envelope: DataEnvelope<T> = Self::check(response).await?.json().await?;
        Ok(envelope.data)
    }

    /// Maps error statuses to [`ApiClientError::Server`], pulling the
    /// server's `message` field when the body has one.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        Err(ApiClientError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

/// Server operations the sync agent depends on.
#[async_trait]
pub trait TaskApi: Send + Sync {
    /// Full task listing, used for the initial load and after reconnects.
    async fn list_tasks(&self) -> Result<Vec<TaskView>, ApiClientError>;

    /// `(id, name)` pairs pre-seeding the name directory on each load.
    /// Best effort; an empty result just means names resolve lazily.
    async fn user_directory(&self) -> Vec<(i64, String)> {
        Vec::new()
    }

    /// Resolves a user id to a display name; `None` when the user cannot
    /// be found.
    async fn user_name(&self, user_id: i64) -> Option<String>;

    /// Moves a task to a new board column.
    async fn set_status(&self, task_id: i64, status: &str) -> Result<(), ApiClientError>;
}

#[async_trait]
impl TaskApi for ApiClient {
    async fn list_tasks(&self) -> Result<Vec<TaskView>, ApiClientError> {
        ApiClient::list_tasks(self).await
    }

    async fn user_directory(&self) -> Vec<(i64, String)> {
        match self.list_users().await {
            Ok(users) => users.into_iter().map(|u| (u.user_id, u.full_name)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "user directory fetch failed");
                Vec::new()
            }
        }
    }

    async fn user_name(&self, user_id: i64) -> Option<String> {
        match self.list_users().await {
            Ok(users) => users
                .into_iter()
                .find(|u| u.user_id == user_id)
                .map(|u| u.full_name),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "user lookup failed");
                None
            }
        }
    }

    async fn set_status(&self, task_id: i64, status: &str) -> Result<(), ApiClientError> {
        self.update_task(&UpdateTaskRequest {
            task_id,
            name: None,
            description: None,
            assignee: None,
            status: Some(status.to_string()),
        })
        .await
    }
}
