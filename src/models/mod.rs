//! Response models for the admin HTTP surface
//!
//! DTOs serialized into the bodies of admin and health responses.

pub mod responses;

pub use responses::{
    DeletedCountResponse, DeletedResponse, ErrorPayload, HealthResponse,
    IntegrationHealth, IntegrationsHealthResponse, OkResponse, RemovedCountResponse,
};
