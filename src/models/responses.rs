//! Response DTOs for the admin HTTP surface
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::error::ErrorKind;

/// Failure payload for every error reaching the HTTP layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Always `false`
    pub success: bool,
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    pub correlation_id: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}

impl ErrorPayload {
    pub fn new(kind: ErrorKind, message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            success: false,
            kind,
            message: message.into(),
            correlation_id: correlation_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Response body for `DELETE /clear` and `DELETE /key/*key`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

/// Response body for `DELETE /pattern/:pattern`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCountResponse {
    pub deleted_count: usize,
}

/// Response body for `POST /cleanup`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedCountResponse {
    pub removed_count: usize,
}

/// Response body for `POST /reset-stats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Authentication state of one integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationHealth {
    pub name: String,
    pub authenticated: bool,
    /// Whether a live token was already cached before the check
    pub cached: bool,
    pub token_expires_in_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response body for `GET /api/v1/integrations/health`
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationsHealthResponse {
    pub status: String,
    pub integrations: Vec<IntegrationHealth>,
}

impl IntegrationsHealthResponse {
    /// `healthy` when every integration authenticated, `degraded` otherwise.
    pub fn new(integrations: Vec<IntegrationHealth>) -> Self {
        let status = if integrations.iter().all(|i| i.authenticated) {
            "healthy"
        } else {
            "degraded"
        };
        Self {
            status: status.to_string(),
            integrations,
        }
    }
}
