//! Token Cache Module
//!
//! Caches one bearer token per credential identity on top of a dedicated
//! [`CacheEngine`], and serializes acquisition per identity so concurrent
//! callers waiting on the same expired token share one request.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::auth::TokenAcquirer;
use crate::cache::{expiry_after, CacheEngine, Clock};
use crate::error::{Error, Result};

/// Upper bound on distinct identities a single token cache tracks.
const MAX_IDENTITIES: usize = 1024;

// == Credential Identity ==
/// One tenant/credential pair of an external system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialIdentity {
    pub system: String,
    pub tenant: String,
    pub client_id: String,
}

impl CredentialIdentity {
    pub fn new(
        system: impl Into<String>,
        tenant: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            system: system.into(),
            tenant: tenant.into(),
            client_id: client_id.into(),
        }
    }

    /// Key of this identity's slot: `"<system>:<tenant>:<client_id>"`.
    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.system, self.tenant, self.client_id)
    }
}

impl fmt::Display for CredentialIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

// == Token State ==
/// A bearer token and the instant it stops being handed out.
///
/// Replaced wholesale on refresh, never mutated.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenState {
    pub access_token: String,
    pub acquired_at: DateTime<Utc>,
    /// Issuer expiry minus the safety margin
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenState")
            .field("access_token", &"<redacted>")
            .field("acquired_at", &self.acquired_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// == Token Cache ==
/// Per-integration token cache.
pub struct TokenCache {
    system: String,
    acquirer: Arc<dyn TokenAcquirer>,
    tokens: CacheEngine<TokenState>,
    /// One acquisition lock per identity, never pruned. Identities come
    /// from configuration, so the map holds at most one slot per principal.
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    safety_margin: i64,
    clock: Arc<dyn Clock>,
    acquisitions: AtomicU64,
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("system", &self.system)
            .field("safety_margin", &self.safety_margin)
            .field("acquisitions", &self.acquisitions.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    /// Creates a token cache for `system`.
    ///
    /// A negative safety margin is a configuration error.
    pub fn new(
        system: impl Into<String>,
        acquirer: Arc<dyn TokenAcquirer>,
        safety_margin: i64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let system = system.into();
        if safety_margin < 0 {
            return Err(Error::Configuration(format!(
                "token safety margin for {system} must not be negative"
            )));
        }

        Ok(Self {
            tokens: CacheEngine::new(MAX_IDENTITIES, 0, clock.clone())?,
            system,
            acquirer,
            flights: Mutex::new(HashMap::new()),
            safety_margin,
            clock,
            acquisitions: AtomicU64::new(0),
        })
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn safety_margin(&self) -> i64 {
        self.safety_margin
    }

    /// Number of times the acquirer has been invoked.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::SeqCst)
    }

    // == Get Token ==
    /// Returns a live token for `identity`, acquiring one if needed.
    ///
    /// Concurrent callers for the same identity wait on a single
    /// acquisition. Acquirer failures surface as
    /// [`Error::AuthenticationFailed`] and leave nothing cached.
    pub async fn get_token(&self, identity: &CredentialIdentity) -> Result<String> {
        let key = identity.cache_key();

        if let Some(state) = self.tokens.get(&key).await {
            debug!(identity = %identity, "Using cached access token");
            return Ok(state.access_token);
        }

        let flight = self.flight(&key).await;
        let _guard = flight.lock().await;

        // Another caller may have refreshed while this one waited
        if let Some(state) = self.tokens.get(&key).await {
            debug!(identity = %identity, "Access token refreshed by concurrent caller");
            return Ok(state.access_token);
        }

        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        let acquired = self.acquirer.acquire(identity).await.map_err(|e| {
            error!(system = %self.system, identity = %identity, error = %e, "Failed to obtain access token");
            Error::AuthenticationFailed {
                system: self.system.clone(),
                message: format!("{e:#}"),
            }
        })?;

        let acquired_at = self.clock.now();
        let ttl = acquired.expires_in.saturating_sub(self.safety_margin);
        if ttl <= 0 {
            warn!(
                system = %self.system,
                expires_in = acquired.expires_in,
                safety_margin = self.safety_margin,
                "Issued token lifetime does not exceed safety margin; it will not be reused"
            );
        }

        let state = TokenState {
            access_token: acquired.access_token,
            acquired_at,
            expires_at: expiry_after(acquired_at, ttl),
        };
        let token = state.access_token.clone();
        self.tokens.set(key, state, Some(ttl)).await;

        info!(
            system = %self.system,
            identity = %identity,
            expires_in = acquired.expires_in,
            "Obtained access token"
        );
        Ok(token)
    }

    /// Drops the cached token so the next call re-acquires.
    pub async fn invalidate(&self, identity: &CredentialIdentity) -> bool {
        let removed = self.tokens.delete(&identity.cache_key()).await;
        if removed {
            info!(system = %self.system, identity = %identity, "Access token invalidated");
        }
        removed
    }

    /// Seconds until the cached token stops being served, `None` if absent.
    pub async fn expires_in(&self, identity: &CredentialIdentity) -> Option<i64> {
        self.tokens.ttl_remaining(&identity.cache_key()).await
    }

    /// Whether a live token is cached, without touching statistics.
    pub async fn is_cached(&self, identity: &CredentialIdentity) -> bool {
        self.tokens.contains(&identity.cache_key()).await
    }

    async fn flight(&self, key: &str) -> Arc<Mutex<()>> {
        let mut flights = self.flights.lock().await;
        Arc::clone(
            flights
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}
