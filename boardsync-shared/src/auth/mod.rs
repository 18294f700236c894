/// Authentication utilities
///
/// - `jwt`: Token creation and validation (HS256)
/// - `password`: Argon2id credential hashing
/// - `middleware`: Axum bearer-token middleware
pub mod jwt;
pub mod middleware;
pub mod password;
