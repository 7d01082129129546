//! Client Module
//!
//! Pooled, authenticated outbound HTTP with bounded retries.

mod pool;
mod resilient;
mod retry;
mod transport;

pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use resilient::{ApiResponse, ClientMetrics, RequestSpec, ResilientClient, Target, TargetAuth};
pub use retry::{RetryAttempt, RetryPolicy};
pub use transport::{
    Credentials, OutboundRequest, RawResponse, ReqwestTransport, Transport, TransportError,
    TransportErrorKind,
};
