//! Integrations Registry
//!
//! Wires the configured external systems to the shared outbound stack: one
//! connection pool and resilient client for everything, one token cache per
//! token-authenticated system.

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Method;
use tracing::{info, warn};

use crate::auth::{CredentialIdentity, OAuth2Acquirer, TokenCache};
use crate::cache::{cache_key, CacheCategory, CacheEngine, Clock};
use crate::client::{
    ApiResponse, ConnectionPool, RequestSpec, ResilientClient, RetryPolicy, Target, TargetAuth,
};
use crate::config::{AuthConfig, Config, IntegrationConfig};
use crate::error::{Error, Result};
use crate::models::IntegrationHealth;

/// Every configured external system, keyed by name.
#[derive(Debug)]
pub struct Integrations {
    client: Arc<ResilientClient>,
    targets: Vec<Target>,
    index: HashMap<String, usize>,
}

impl Integrations {
    /// Builds the pool, client and token caches for `config`.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let pool = Arc::new(ConnectionPool::from_config(&config.http)?);
        let client = Arc::new(ResilientClient::new(
            Arc::clone(&pool),
            RetryPolicy::from_config(&config.http),
        ));

        let targets = config
            .integrations
            .iter()
            .map(|integration| build_target(integration, &pool, &clock))
            .collect::<Result<Vec<_>>>()?;

        info!(count = targets.len(), "Integrations registered");
        Self::new(client, targets)
    }

    /// Registry over an existing client. Duplicate names are rejected.
    pub fn new(client: Arc<ResilientClient>, targets: Vec<Target>) -> Result<Self> {
        let mut index = HashMap::with_capacity(targets.len());
        for (position, target) in targets.iter().enumerate() {
            if index.insert(target.name.clone(), position).is_some() {
                return Err(Error::Configuration(format!(
                    "integration '{}' is configured twice",
                    target.name
                )));
            }
        }

        Ok(Self {
            client,
            targets,
            index,
        })
    }

    pub fn client(&self) -> &Arc<ResilientClient> {
        &self.client
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.index.get(name).map(|&position| &self.targets[position])
    }

    /// Performs a call against the named integration.
    pub async fn call(
        &self,
        name: &str,
        method: Method,
        endpoint: &str,
        spec: RequestSpec,
    ) -> Result<ApiResponse> {
        let target = self.require(name)?;
        self.client.call(target, method, endpoint, spec).await
    }

    /// GET with read-through caching under the category's TTL.
    ///
    /// The key covers the integration, endpoint and query parameters; only
    /// successful responses are cached.
    pub async fn get_cached(
        &self,
        cache: &CacheEngine<serde_json::Value>,
        category: CacheCategory,
        name: &str,
        endpoint: &str,
        spec: RequestSpec,
    ) -> Result<serde_json::Value> {
        let target = self.require(name)?;

        let params: Vec<String> = spec
            .query
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        let mut args = vec![endpoint];
        args.extend(params.iter().map(String::as_str));
        let key = cache_key(name, "GET", &args);

        cache
            .get_or_insert_with(&key, Some(cache.category_ttl(category)), || async move {
                self.client
                    .call(target, Method::GET, endpoint, spec)
                    .await?
                    .json::<serde_json::Value>()
            })
            .await
    }

    /// Authentication state of every integration.
    ///
    /// Token-based integrations resolve a token, reusing the cached one.
    pub async fn health(&self) -> Vec<IntegrationHealth> {
        let mut report = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            let health = match &target.auth {
                TargetAuth::Bearer { tokens, identity } => {
                    let cached = tokens.is_cached(identity).await;
                    match tokens.get_token(identity).await {
                        Ok(_) => IntegrationHealth {
                            name: target.name.clone(),
                            authenticated: true,
                            cached,
                            token_expires_in_seconds: tokens.expires_in(identity).await,
                            error: None,
                        },
                        Err(e) => {
                            warn!(integration = %target.name, error = %e, "Integration health check failed");
                            IntegrationHealth {
                                name: target.name.clone(),
                                authenticated: false,
                                cached,
                                token_expires_in_seconds: None,
                                error: Some(e.to_string()),
                            }
                        }
                    }
                }
                TargetAuth::Basic { .. } | TargetAuth::None => IntegrationHealth {
                    name: target.name.clone(),
                    authenticated: true,
                    cached: false,
                    token_expires_in_seconds: None,
                    error: None,
                },
            };
            report.push(health);
        }

        report
    }

    /// Stops new outbound calls.
    pub fn shutdown(&self) {
        self.client.pool().close();
    }

    fn require(&self, name: &str) -> Result<&Target> {
        self.target(name)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown integration '{name}'")))
    }
}

fn build_target(
    integration: &IntegrationConfig,
    pool: &ConnectionPool,
    clock: &Arc<dyn Clock>,
) -> Result<Target> {
    let auth = match &integration.auth {
        AuthConfig::None => TargetAuth::None,
        AuthConfig::Basic { username, password } => TargetAuth::Basic {
            username: username.clone(),
            password: password.clone(),
        },
        AuthConfig::ClientCredentials { client_id: principal, .. }
        | AuthConfig::BasicToken { username: principal, .. } => {
            let acquirer = OAuth2Acquirer::from_auth_config(pool.http().clone(), &integration.auth)
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "integration '{}' has no token endpoint",
                        integration.name
                    ))
                })?;
            let tokens = TokenCache::new(
                integration.name.clone(),
                Arc::new(acquirer),
                integration.token_safety_margin,
                Arc::clone(clock),
            )?;
            TargetAuth::Bearer {
                tokens: Arc::new(tokens),
                identity: CredentialIdentity::new(
                    integration.name.clone(),
                    integration.tenant.clone(),
                    principal.clone(),
                ),
            }
        }
    };

    info!(
        integration = %integration.name,
        base_url = %integration.base_url,
        auth = ?integration.auth,
        "Integration configured"
    );
    Ok(Target::new(integration.name.clone(), integration.base_url.clone()).with_auth(auth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SystemClock;
    use std::collections::HashMap as Map;
    use url::Url;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(SystemClock)
    }

    fn config_with(pairs: &[(&str, &str)]) -> Config {
        let map: Map<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(move |key: &str| map.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_from_config_builds_targets() {
        let config = config_with(&[
            ("INTEGRATIONS", "intune,servicenow,nextthink"),
            ("INTUNE_BASE_URL", "https://graph.example.com/v1.0"),
            ("INTUNE_AUTH", "client_credentials"),
            ("INTUNE_TOKEN_URL", "https://login.example.com/token"),
            ("INTUNE_CLIENT_ID", "app"),
            ("INTUNE_CLIENT_SECRET", "secret"),
            ("INTUNE_TENANT", "contoso"),
            ("SERVICENOW_BASE_URL", "https://sn.example.com/api"),
            ("SERVICENOW_AUTH", "basic"),
            ("SERVICENOW_USERNAME", "svc"),
            ("SERVICENOW_PASSWORD", "pw"),
            ("NEXTTHINK_BASE_URL", "https://nx.example.com"),
        ]);

        let integrations = Integrations::from_config(&config, clock()).unwrap();
        assert_eq!(integrations.targets().len(), 3);

        match &integrations.target("intune").unwrap().auth {
            TargetAuth::Bearer { identity, tokens } => {
                assert_eq!(identity.cache_key(), "intune:contoso:app");
                assert_eq!(tokens.safety_margin(), 300);
            }
            other => panic!("unexpected auth: {other:?}"),
        }
        assert!(matches!(
            integrations.target("servicenow").unwrap().auth,
            TargetAuth::Basic { .. }
        ));
        assert!(matches!(
            integrations.target("nextthink").unwrap().auth,
            TargetAuth::None
        ));
        assert!(integrations.target("jira").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let pool = Arc::new(ConnectionPool::new(Default::default()).unwrap());
        let client = Arc::new(ResilientClient::new(pool, RetryPolicy::no_retry()));
        let url = Url::parse("https://a.example.com").unwrap();

        let result = Integrations::new(
            client,
            vec![Target::new("a", url.clone()), Target::new("a", url)],
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_unknown_integration_is_invalid_request() {
        let integrations = Integrations::from_config(&Config::default(), clock()).unwrap();
        let err = integrations
            .call("jira", Method::GET, "/issues", RequestSpec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_health_for_non_token_integrations() {
        let config = config_with(&[
            ("INTEGRATIONS", "nextthink"),
            ("NEXTTHINK_BASE_URL", "https://nx.example.com"),
        ]);
        let integrations = Integrations::from_config(&config, clock()).unwrap();

        let report = integrations.health().await;
        assert_eq!(report.len(), 1);
        assert!(report[0].authenticated);
        assert!(!report[0].cached);
        assert!(report[0].error.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_closes_pool() {
        let integrations = Integrations::from_config(&Config::default(), clock()).unwrap();
        integrations.shutdown();
        assert!(integrations.client().pool().is_closed());
    }
}
