/// API route handlers
///
/// - `health`: Health check endpoint
/// - `auth`: Authentication endpoints (register, login)
/// - `tasks`: Task CRUD, user directory, cached reads
/// - `ws`: Real-time channel (websocket)
pub mod auth;
pub mod health;
pub mod tasks;
pub mod ws;
