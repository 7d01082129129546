//! API Module
//!
//! HTTP handlers and routing for the cache admin surface and health checks.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
