/// Data models shared between the API server and the sync client
///
/// - `task`: Task record, status enum, views and mutation DTOs
/// - `user`: User record, public summary and auth DTOs
pub mod task;
pub mod user;
