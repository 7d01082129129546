//! Resilient Client
//!
//! The single entry point every integration uses for outbound calls.
//!
//! A call moves through these states:
//!
//! ```text
//! Idle -> TokenResolving -> ConnectionAcquired -> Sending
//!      -> Succeeded
//!      | RetryableFailure -> (backoff) -> Sending
//!      | TerminalFailure
//! ```
//!
//! Auth resolution failures surface immediately and are never retried.
//! Only transport failures that produced no response are retried, and any
//! received response ends the call.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::auth::{CredentialIdentity, TokenCache};
use crate::client::{
    ConnectionPool, Credentials, OutboundRequest, RawResponse, ReqwestTransport, RetryAttempt,
    RetryPolicy, Transport, TransportError,
};
use crate::error::{Error, Result};

// == Target ==
/// How requests to a target are authenticated.
#[derive(Clone)]
pub enum TargetAuth {
    None,
    Basic { username: String, password: String },
    Bearer {
        tokens: Arc<TokenCache>,
        identity: CredentialIdentity,
    },
}

impl fmt::Debug for TargetAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAuth::None => write!(f, "None"),
            TargetAuth::Basic { username, .. } => write!(f, "Basic({username})"),
            TargetAuth::Bearer { identity, .. } => write!(f, "Bearer({identity})"),
        }
    }
}

/// A named external system reachable under one base URL.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub base_url: Url,
    pub auth: TargetAuth,
}

impl Target {
    pub fn new(name: impl Into<String>, base_url: Url) -> Self {
        Self {
            name: name.into(),
            base_url,
            auth: TargetAuth::None,
        }
    }

    pub fn with_auth(mut self, auth: TargetAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Resolves `endpoint` under the base URL, keeping any base path.
    pub fn url_for(&self, endpoint: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let endpoint = endpoint.trim_start_matches('/');
        let joined = if endpoint.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{endpoint}")
        };

        Url::parse(&joined).map_err(|e| {
            Error::InvalidRequest(format!("invalid endpoint '{endpoint}' for {}: {e}", self.name))
        })
    }
}

// == Request / Response ==
/// Optional parts of an outbound call.
#[derive(Debug, Clone, Default)]
pub struct RequestSpec {
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Overall deadline covering every attempt and backoff sleep
    pub deadline: Option<Duration>,
    /// Per-attempt timeout overriding the pool default
    pub timeout: Option<Duration>,
}

impl RequestSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Successful (2xx) response of an outbound call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub target: String,
    pub status: u16,
    pub body: Vec<u8>,
    /// Attempts used, the successful one included
    pub attempts: u32,
}

impl ApiResponse {
    /// Decodes the body as JSON; an undecodable body is a remote error.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::RemoteError {
            target: self.target.clone(),
            status: self.status,
            message: format!("response body is not the expected JSON: {e}"),
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// == Metrics ==
#[derive(Debug, Default)]
struct MetricCounters {
    calls: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time counters of a [`ResilientClient`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetrics {
    pub calls: u64,
    pub attempts: u64,
    pub retries: u64,
    pub successes: u64,
    pub failures: u64,
}

// == Call State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    Idle,
    TokenResolving,
    ConnectionAcquired,
    Sending,
    RetryableFailure,
    Succeeded,
    TerminalFailure,
}

struct CallContext<'a> {
    target: &'a Target,
    method: &'a Method,
    endpoint: &'a str,
    started: Instant,
}

impl CallContext<'_> {
    fn enter(&self, attempt: u32, state: CallState) {
        debug!(
            target_system = %self.target.name,
            method = %self.method,
            endpoint = self.endpoint,
            attempt = attempt,
            state = ?state,
            "Outbound call state"
        );
    }
}

// == Resilient Client ==
/// Outbound HTTP client with pooling, auth injection and bounded retries.
pub struct ResilientClient {
    pool: Arc<ConnectionPool>,
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    metrics: MetricCounters,
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("pool", &self.pool)
            .field("policy", &self.policy)
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    /// Client sending over the pool's own reqwest client.
    pub fn new(pool: Arc<ConnectionPool>, policy: RetryPolicy) -> Self {
        let transport = Arc::new(ReqwestTransport::new(pool.http().clone()));
        Self::with_transport(pool, transport, policy)
    }

    pub fn with_transport(
        pool: Arc<ConnectionPool>,
        transport: Arc<dyn Transport>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            pool,
            transport,
            policy,
            metrics: MetricCounters::default(),
        }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn metrics(&self) -> ClientMetrics {
        ClientMetrics {
            calls: self.metrics.calls.load(Ordering::Relaxed),
            attempts: self.metrics.attempts.load(Ordering::Relaxed),
            retries: self.metrics.retries.load(Ordering::Relaxed),
            successes: self.metrics.successes.load(Ordering::Relaxed),
            failures: self.metrics.failures.load(Ordering::Relaxed),
        }
    }

    // == Call ==
    /// Performs one logical call against `target`.
    ///
    /// Returns the 2xx response, or the taxonomy error of the final attempt.
    /// A caller deadline in `spec` bounds the whole call, backoff included,
    /// and yields [`Error::TimedOut`] when it passes.
    pub async fn call(
        &self,
        target: &Target,
        method: Method,
        endpoint: &str,
        spec: RequestSpec,
    ) -> Result<ApiResponse> {
        self.metrics.calls.fetch_add(1, Ordering::Relaxed);

        let ctx = CallContext {
            target,
            method: &method,
            endpoint,
            started: Instant::now(),
        };
        ctx.enter(0, CallState::Idle);

        let result = match spec.deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.execute(&ctx, spec)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(
                            target_system = %target.name,
                            endpoint = endpoint,
                            deadline_ms = deadline.as_millis() as u64,
                            "Outbound call abandoned at caller deadline"
                        );
                        Err(Error::TimedOut {
                            target: target.name.clone(),
                            elapsed: ctx.started.elapsed(),
                        })
                    }
                }
            }
            None => self.execute(&ctx, spec).await,
        };

        match &result {
            Ok(response) => {
                self.metrics.successes.fetch_add(1, Ordering::Relaxed);
                info!(
                    target_system = %target.name,
                    method = %method,
                    endpoint = endpoint,
                    status = response.status,
                    attempts = response.attempts,
                    elapsed_ms = ctx.started.elapsed().as_millis() as u64,
                    "Outbound call succeeded"
                );
            }
            Err(e) => {
                self.metrics.failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    target_system = %target.name,
                    method = %method,
                    endpoint = endpoint,
                    error = %e,
                    "Outbound call failed"
                );
            }
        }
        result
    }

    /// [`call`](Self::call) bounded by `deadline`.
    pub async fn call_with_deadline(
        &self,
        target: &Target,
        method: Method,
        endpoint: &str,
        spec: RequestSpec,
        deadline: Duration,
    ) -> Result<ApiResponse> {
        self.call(target, method, endpoint, spec.deadline(deadline))
            .await
    }

    /// GET `endpoint` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        target: &Target,
        endpoint: &str,
        spec: RequestSpec,
    ) -> Result<T> {
        self.call(target, Method::GET, endpoint, spec).await?.json()
    }

    async fn execute(&self, ctx: &CallContext<'_>, spec: RequestSpec) -> Result<ApiResponse> {
        ctx.enter(0, CallState::TokenResolving);
        let credentials = resolve_credentials(&ctx.target.auth).await?;
        let url = ctx.target.url_for(ctx.endpoint)?;

        let _connection = self.pool.acquire(&ctx.target.name).await?;
        ctx.enter(0, CallState::ConnectionAcquired);

        let request = OutboundRequest {
            method: ctx.method.clone(),
            url,
            query: spec.query,
            headers: spec.headers,
            body: spec.body,
            credentials,
            timeout: spec.timeout,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            self.metrics.attempts.fetch_add(1, Ordering::Relaxed);
            ctx.enter(attempt, CallState::Sending);

            match self.transport.send(request.clone()).await {
                Ok(raw) if raw.is_success() => {
                    ctx.enter(attempt, CallState::Succeeded);
                    return Ok(ApiResponse {
                        target: ctx.target.name.clone(),
                        status: raw.status,
                        body: raw.body,
                        attempts: attempt,
                    });
                }
                Ok(raw) => {
                    ctx.enter(attempt, CallState::TerminalFailure);
                    return Err(self.remote_error(ctx, raw).await);
                }
                Err(err) if self.policy.should_retry(attempt, &err) => {
                    ctx.enter(attempt, CallState::RetryableFailure);
                    let retry = RetryAttempt {
                        attempt_number: attempt,
                        next_delay: self.policy.delay_for(attempt),
                        last_error: err,
                    };
                    warn!(
                        target_system = %ctx.target.name,
                        endpoint = ctx.endpoint,
                        attempt = retry.attempt_number,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = retry.next_delay.as_millis() as u64,
                        error = %retry.last_error,
                        "Retrying outbound call after transport failure"
                    );
                    self.metrics.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(retry.next_delay).await;
                }
                Err(err) => {
                    ctx.enter(attempt, CallState::TerminalFailure);
                    return Err(transport_error(ctx, err));
                }
            }
        }
    }

    async fn remote_error(&self, ctx: &CallContext<'_>, raw: RawResponse) -> Error {
        if raw.status == 401 {
            if let TargetAuth::Bearer { tokens, identity } = &ctx.target.auth {
                tokens.invalidate(identity).await;
            }
        }

        let body = String::from_utf8_lossy(&raw.body).into_owned();
        let message = if body.trim().is_empty() {
            reqwest::StatusCode::from_u16(raw.status)
                .ok()
                .and_then(|status| status.canonical_reason())
                .unwrap_or("request failed")
                .to_string()
        } else {
            body
        };

        Error::RemoteError {
            target: ctx.target.name.clone(),
            status: raw.status,
            message,
        }
    }
}

async fn resolve_credentials(auth: &TargetAuth) -> Result<Option<Credentials>> {
    match auth {
        TargetAuth::None => Ok(None),
        TargetAuth::Basic { username, password } => Ok(Some(Credentials::Basic {
            username: username.clone(),
            password: password.clone(),
        })),
        TargetAuth::Bearer { tokens, identity } => {
            let token = tokens.get_token(identity).await?;
            Ok(Some(Credentials::Bearer(token)))
        }
    }
}

fn transport_error(ctx: &CallContext<'_>, err: TransportError) -> Error {
    if err.kind.is_timeout() {
        Error::TimedOut {
            target: ctx.target.name.clone(),
            elapsed: ctx.started.elapsed(),
        }
    } else {
        Error::ConnectionFailed {
            target: ctx.target.name.clone(),
            message: err.message,
        }
    }
}
