//! Core library for the pastor management system.
//!
//! This crate holds everything the front ends share:
//!
//! - `storage`: origin-scoped key/value stores that survive restarts
//! - `auth`: credential persistence, token introspection and the
//!   `SessionManager` that owns expiry and logout
//! - `api`: the authenticated request pipeline and per-resource clients
//! - `models`: pastor, zone, area and parish records plus form mapping
//! - `config`: user configuration and API origin resolution

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError};
pub use auth::{CredentialStore, SessionManager};
pub use config::Config;
