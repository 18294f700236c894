//! # BoardSync Shared Library
//!
//! Types and utilities shared between the BoardSync API server and the
//! sync client.
//!
//! ## Module Organization
//!
//! - `models`: Task and user records plus request/response DTOs
//! - `auth`: JWT tokens, Argon2id password hashing, axum middleware
//! - `events`: Change-event wire types for the real-time channel
//! - `store`: In-memory task/user store

pub mod auth;
pub mod events;
pub mod models;
pub mod store;

/// Current version of the BoardSync shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
