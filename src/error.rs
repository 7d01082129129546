//! Error types for the integration core
//!
//! One taxonomy shared by the outbound call layer, token acquisition,
//! configuration loading and the cache admin surface.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ErrorPayload;

// == Error Kind ==
/// Serializable discriminant of [`Error`], exposed in failure payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    AuthenticationFailed,
    ConnectionFailed,
    TimedOut,
    RemoteError,
    ConfigurationError,
    InvalidRequest,
}

// == Error Enum ==
/// Unified error type for the integration core.
#[derive(Error, Debug)]
pub enum Error {
    /// Token acquisition failed (bad credentials, unreachable auth endpoint)
    #[error("Authentication failed for {system}: {message}")]
    AuthenticationFailed { system: String, message: String },

    /// Transport failure before any response was received
    #[error("Connection to {target} failed: {message}")]
    ConnectionFailed { target: String, message: String },

    /// No response within the configured timeout or caller deadline
    #[error("Request to {target} timed out after {}ms", .elapsed.as_millis())]
    TimedOut { target: String, elapsed: Duration },

    /// A response was received but reports failure
    #[error("{target} returned {status}: {message}")]
    RemoteError {
        target: String,
        status: u16,
        message: String,
    },

    /// Invalid setup detected at construction time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed operator input on the admin surface
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AuthenticationFailed { .. } => ErrorKind::AuthenticationFailed,
            Error::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            Error::TimedOut { .. } => ErrorKind::TimedOut,
            Error::RemoteError { .. } => ErrorKind::RemoteError,
            Error::Configuration(_) => ErrorKind::ConfigurationError,
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }

    /// HTTP status used when this error reaches the collaborating HTTP layer.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::AuthenticationFailed { .. } => StatusCode::UNAUTHORIZED,
            Error::ConnectionFailed { .. } => StatusCode::BAD_GATEWAY,
            Error::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::RemoteError { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|code| code.is_client_error() || code.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Attaches a correlation identifier for the external failure payload.
    pub fn with_correlation(self, correlation_id: impl Into<String>) -> ApiError {
        ApiError {
            error: self,
            correlation_id: correlation_id.into(),
        }
    }
}

// == Api Error ==
/// An [`Error`] bound to the correlation id of the request that produced it.
#[derive(Debug)]
pub struct ApiError {
    pub error: Error,
    pub correlation_id: String,
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        error.with_correlation(Uuid::new_v4().to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = ErrorPayload::new(
            self.error.kind(),
            self.error.to_string(),
            self.correlation_id,
        );

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the integration core.
pub type Result<T> = std::result::Result<T, Error>;
