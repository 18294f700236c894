//! # BoardSync API Server Library
//!
//! Core functionality for the BoardSync API server.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `cache`: Response cache with sliding/absolute expiration
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `hub`: Broadcast fan-out for the real-time channel
//! - `mutation`: Task write path (persist → invalidate → broadcast)
//! - `routes`: API route handlers

pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod hub;
pub mod mutation;
pub mod routes;
