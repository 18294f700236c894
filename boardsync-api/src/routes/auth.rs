/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/auth/register` - Register a new user
/// - `POST /api/v1/auth/login` - Login and get a bearer token
///
/// Neither endpoint requires credentials. Login failure is a 404 with a
/// deliberately unspecific message (the wire contract this API keeps);
/// duplicate registration is a 409.
use axum::{extract::State, Json};
use boardsync_shared::{
    auth::{jwt, password},
    models::user::{LoginRequest, RegisterRequest},
    store::NewUser,
};
use chrono::Duration;
use serde::Serialize;
use validator::Validate;

use crate::{
    app::AppState,
    error::{validation_error, ApiError, ApiResult},
};

/// Register response
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    /// Human-readable confirmation
    pub message: String,

    /// The new user's ID
    pub user_id: i64,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Human-readable confirmation
    pub message: String,

    /// Bearer token for subsequent requests and the websocket handshake
    pub token: String,
}

/// Registers a new user
///
/// # Errors
///
/// - `422`: Validation failed
/// - `409`: Email already registered (case-insensitive)
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    req.validate().map_err(validation_error)?;

    let password_hash = password::hash_password(&req.password)?;

    let user = state
        .store
        .insert_user(NewUser {
            full_name: req.full_name,
            email: req.email,
            password_hash,
            phone: req.phone,
            role: None,
        })
        .await?;

    tracing::info!(user_id = user.id, "User registered");

    Ok(Json(RegisterResponse {
        message: "Register Success".to_string(),
        user_id: user.id,
    }))
}

/// Logs a user in, issuing a bearer token
///
/// # Errors
///
/// - `422`: Validation failed
/// - `404`: Email unknown or password wrong (indistinguishable on purpose)
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    req.validate().map_err(validation_error)?;

    let bad_credentials = || ApiError::NotFound("Email or Password Incorrect".to_string());

    let user = state
        .store
        .user_by_email(&req.email)
        .await
        .ok_or_else(bad_credentials)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(bad_credentials());
    }

    let claims = jwt::Claims::new(user.id, Duration::hours(state.config.jwt.ttl_hours));
    let token = jwt::create_token(&claims, state.jwt_secret())?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(Json(LoginResponse {
        message: "Login Success".to_string(),
        token,
    }))
}
