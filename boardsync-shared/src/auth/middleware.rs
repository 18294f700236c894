/// Authentication middleware for Axum
///
/// Validates bearer tokens and attaches an [`AuthContext`] to the request
/// extensions for handlers to consume.
///
/// # Credential Sources
///
/// - `Authorization: Bearer <token>` header (HTTP endpoints)
/// - `access_token=<token>` query parameter (websocket handshake, where
///   browsers cannot set headers on the upgrade request)
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use boardsync_shared::auth::middleware::{jwt_auth, AuthContext, JwtSecret};
///
/// async fn protected(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, user {}!", auth.user_id)
/// }
///
/// let secret = JwtSecret::new("a-secret-of-at-least-32-bytes!!!");
/// let app: Router = Router::new()
///     .route("/protected", get(protected))
///     .layer(middleware::from_fn_with_state(secret, jwt_auth));
/// ```
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::jwt::{validate_token, JwtError};

/// Shared JWT secret handed to the middleware as state
#[derive(Clone)]
pub struct JwtSecret(Arc<String>);

impl JwtSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(Arc::new(secret.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Authentication context added to request extensions
///
/// Handlers extract it with Axum's `Extension` extractor once the request
/// has passed [`jwt_auth`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: i64,
}

/// Authentication failure
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credentials on the request
    #[error("Missing credentials")]
    MissingCredentials,

    /// Credentials present but invalid
    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            other => AuthError::InvalidToken(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": "unauthorized",
            "message": self.to_string(),
        }));
        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Pulls a bearer token off a request
///
/// Prefers the `Authorization` header; falls back to the `access_token`
/// query parameter used by the websocket handshake.
pub fn extract_token(req: &Request) -> Option<String> {
    if let Some(value) = req.headers().get(header::AUTHORIZATION) {
        let value = value.to_str().ok()?;
        let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?;
        return Some(token.to_string());
    }

    req.uri().query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.strip_prefix("access_token=")
                .map(|token| token.to_string())
        })
    })
}

/// Middleware validating the bearer token and attaching [`AuthContext`]
///
/// Rejects with 401 when credentials are missing or invalid.
pub async fn jwt_auth(
    State(secret): State<JwtSecret>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = extract_token(&req).ok_or(AuthError::MissingCredentials)?;
    let claims = validate_token(&token, secret.as_str()).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        AuthError::from(e)
    })?;

    req.extensions_mut().insert(AuthContext {
        user_id: claims.sub,
    });

    Ok(next.run(req).await)
}
