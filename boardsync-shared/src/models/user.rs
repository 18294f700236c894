/// User model and request types
///
/// A user is anyone who can log in and be assigned tasks. Emails are unique
/// case-insensitively; the password is stored only as an Argon2id PHC
/// string (see [`crate::auth::password`]).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A user record as persisted by the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID (store-assigned)
    pub id: i64,

    /// Display name
    pub full_name: String,

    /// Email address, unique across users case-insensitively
    pub email: String,

    /// Argon2id PHC-format password hash
    ///
    /// Never serialized into any API response; the only projection that
    /// leaves the server is [`UserSummary`].
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Phone number
    pub phone: String,

    /// Free-form role label, defaults to "User"
    pub role: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Projects the user into its public summary
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            user_id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Public projection of a user: id, name and email only
///
/// This is the shape returned by `GET /api/v1/tasks/users`; credential
/// data never appears in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    /// User ID
    pub user_id: i64,

    /// Display name
    pub full_name: String,

    /// Email address
    pub email: String,
}

/// Request body for `POST /api/v1/auth/register`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Display name
    #[validate(length(min = 1, max = 100, message = "Full name must be 1-100 characters"))]
    pub full_name: String,

    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (hashed before storage, never persisted in clear)
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Phone number
    #[validate(length(max = 15, message = "Phone number must be at most 15 characters"))]
    pub phone: String,
}

/// Request body for `POST /api/v1/auth/login`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    #[validate(length(min = 1, message = "Password must not be empty"))]
    pub password: String,
}
