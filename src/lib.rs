//! Integration Hub - resilient access to external IT systems
//!
//! Bounded in-process response caching, short-lived token management and a
//! pooled, retrying outbound HTTP client, with an operator admin surface.

pub mod api;
pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod integrations;
pub mod models;
pub mod tasks;

pub use api::{create_router, AppState};
pub use config::Config;
pub use error::{Error, Result};
pub use integrations::Integrations;
pub use tasks::spawn_cleanup_task;
