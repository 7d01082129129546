//! Connection Pool
//!
//! A single keep-alive `reqwest::Client` shared by every outbound call,
//! gated by a semaphore that bounds concurrent in-flight requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// Pool limits and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Concurrent in-flight request ceiling
    pub max_connections: usize,
    /// Idle keep-alive connections retained per host
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    /// Per-attempt read timeout
    pub request_timeout: Duration,
    pub http2: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
            max_idle_per_host: 20,
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            http2: true,
        }
    }
}

impl From<&HttpConfig> for PoolConfig {
    fn from(config: &HttpConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            max_idle_per_host: config.max_keepalive,
            idle_timeout: Duration::from_secs(config.keepalive_expiry),
            connect_timeout: Duration::from_secs(config.connect_timeout),
            request_timeout: Duration::from_secs(config.timeout),
            http2: config.http2,
        }
    }
}

/// Shared outbound connection pool.
#[derive(Debug)]
pub struct ConnectionPool {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    config: PoolConfig,
}

/// Slot held for the duration of one outbound call.
#[derive(Debug)]
pub struct PooledConnection {
    _permit: OwnedSemaphorePermit,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(Error::Configuration(
                "connection pool needs at least one connection".to_string(),
            ));
        }

        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.idle_timeout)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout);
        if !config.http2 {
            builder = builder.http1_only();
        }

        let client = builder
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        info!(
            max_connections = config.max_connections,
            max_idle_per_host = config.max_idle_per_host,
            http2 = config.http2,
            "Outbound connection pool ready"
        );

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_connections)),
            config,
        })
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self> {
        Self::new(PoolConfig::from(config))
    }

    /// The pooled client, for collaborators such as token acquirers.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Waits for a free slot. Fails once the pool has been closed.
    pub async fn acquire(&self, target: &str) -> Result<PooledConnection> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| Error::ConnectionFailed {
                target: target.to_string(),
                message: "connection pool is closed".to_string(),
            })?;

        debug!(target_system = target, in_flight = self.in_flight(), "Connection slot acquired");
        Ok(PooledConnection { _permit: permit })
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.config.max_connections.saturating_sub(self.available())
    }

    /// Rejects new acquisitions; calls already holding a slot finish normally.
    pub fn close(&self) {
        if !self.permits.is_closed() {
            self.permits.close();
            info!("Outbound connection pool closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}
