//! Configuration Module
//!
//! Handles loading and validating configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::cache::{CacheCategory, CategoryTtls};
use crate::error::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Admin HTTP server port
    pub server_port: u16,
    pub cache: CacheConfig,
    pub http: HttpConfig,
    /// Default token safety margin in seconds
    pub token_safety_margin: i64,
    pub integrations: Vec<IntegrationConfig>,
}

/// In-process cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_size: usize,
    pub default_ttl: i64,
    /// Background sweep interval in seconds
    pub cleanup_interval: u64,
    pub category_ttls: CategoryTtls,
}

/// Outbound HTTP pool, timeout and retry settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub max_connections: usize,
    /// Idle keep-alive connections retained per host
    pub max_keepalive: usize,
    pub keepalive_expiry: u64,
    pub timeout: u64,
    pub connect_timeout: u64,
    pub http2: bool,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

/// One external system.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    pub name: String,
    pub base_url: Url,
    pub tenant: String,
    pub auth: AuthConfig,
    pub token_safety_margin: i64,
}

/// How requests to an integration are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthConfig {
    None,
    /// Credentials attached to every request
    Basic { username: String, password: String },
    /// OAuth2 client credentials sent in the token request body
    ClientCredentials {
        token_url: Url,
        client_id: String,
        client_secret: String,
        scope: Option<String>,
    },
    /// OAuth2 token endpoint authenticated with HTTP basic credentials
    BasicToken {
        token_url: Url,
        username: String,
        password: String,
        scope: Option<String>,
    },
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::None => write!(f, "None"),
            AuthConfig::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            AuthConfig::ClientCredentials {
                token_url,
                client_id,
                scope,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("token_url", &token_url.as_str())
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .field("scope", scope)
                .finish(),
            AuthConfig::BasicToken {
                token_url,
                username,
                scope,
                ..
            } => f
                .debug_struct("BasicToken")
                .field("token_url", &token_url.as_str())
                .field("username", username)
                .field("password", &"<redacted>")
                .field("scope", scope)
                .finish(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - admin server port (default: 3000)
    /// - `CACHE_ENABLED`, `CACHE_MAX_SIZE` (10000), `CACHE_DEFAULT_TTL_SECONDS` (300),
    ///   `CACHE_CLEANUP_INTERVAL_SECONDS` (300), `CACHE_TTL_<CATEGORY>`
    /// - `HTTP_POOL_MAX_CONNECTIONS` (100), `HTTP_POOL_MAX_KEEPALIVE` (20),
    ///   `HTTP_POOL_KEEPALIVE_EXPIRY_SECONDS` (30), `HTTP_TIMEOUT_SECONDS` (30),
    ///   `HTTP_CONNECT_TIMEOUT_SECONDS` (10), `HTTP_ENABLE_HTTP2` (true)
    /// - `HTTP_RETRY_MAX_ATTEMPTS` (3), `HTTP_RETRY_BASE_DELAY_MS` (2000),
    ///   `HTTP_RETRY_MAX_DELAY_MS` (10000)
    /// - `TOKEN_SAFETY_MARGIN_SECONDS` (300)
    /// - `INTEGRATIONS` - comma-separated names, each read from `<NAME>_*`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let mut category_ttls = CategoryTtls::default();
        for category in CacheCategory::ALL {
            let key = format!("CACHE_TTL_{}", category.env_name());
            let ttl = parse_or(&lookup, &key, category_ttls.get(category));
            category_ttls.set(category, ttl);
        }

        let cache = CacheConfig {
            enabled: parse_bool_or(&lookup, "CACHE_ENABLED", defaults.cache.enabled),
            max_size: parse_or(&lookup, "CACHE_MAX_SIZE", defaults.cache.max_size),
            default_ttl: parse_or(
                &lookup,
                "CACHE_DEFAULT_TTL_SECONDS",
                defaults.cache.default_ttl,
            ),
            cleanup_interval: parse_or(
                &lookup,
                "CACHE_CLEANUP_INTERVAL_SECONDS",
                defaults.cache.cleanup_interval,
            ),
            category_ttls,
        };

        let d = &defaults.http;
        let http = HttpConfig {
            max_connections: parse_or(&lookup, "HTTP_POOL_MAX_CONNECTIONS", d.max_connections),
            max_keepalive: parse_or(&lookup, "HTTP_POOL_MAX_KEEPALIVE", d.max_keepalive),
            keepalive_expiry: parse_or(
                &lookup,
                "HTTP_POOL_KEEPALIVE_EXPIRY_SECONDS",
                d.keepalive_expiry,
            ),
            timeout: parse_or(&lookup, "HTTP_TIMEOUT_SECONDS", d.timeout),
            connect_timeout: parse_or(&lookup, "HTTP_CONNECT_TIMEOUT_SECONDS", d.connect_timeout),
            http2: parse_bool_or(&lookup, "HTTP_ENABLE_HTTP2", d.http2),
            retry_max_attempts: parse_or(&lookup, "HTTP_RETRY_MAX_ATTEMPTS", d.retry_max_attempts),
            retry_base_delay_ms: parse_or(
                &lookup,
                "HTTP_RETRY_BASE_DELAY_MS",
                d.retry_base_delay_ms,
            ),
            retry_max_delay_ms: parse_or(&lookup, "HTTP_RETRY_MAX_DELAY_MS", d.retry_max_delay_ms),
        };

        let token_safety_margin = parse_or(
            &lookup,
            "TOKEN_SAFETY_MARGIN_SECONDS",
            defaults.token_safety_margin,
        );

        let integrations = lookup("INTEGRATIONS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| load_integration(&lookup, name, token_safety_margin))
            .collect::<Result<Vec<_>>>()?;

        let config = Self {
            server_port: parse_or(&lookup, "SERVER_PORT", defaults.server_port),
            cache,
            http,
            token_safety_margin,
            integrations,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the core cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_size == 0 {
            return Err(Error::Configuration(
                "CACHE_MAX_SIZE must be at least 1".to_string(),
            ));
        }
        if self.cache.cleanup_interval == 0 {
            return Err(Error::Configuration(
                "CACHE_CLEANUP_INTERVAL_SECONDS must be at least 1".to_string(),
            ));
        }
        if self.http.max_connections == 0 {
            return Err(Error::Configuration(
                "HTTP_POOL_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }
        if self.http.retry_max_attempts == 0 {
            return Err(Error::Configuration(
                "HTTP_RETRY_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.http.retry_base_delay_ms > self.http.retry_max_delay_ms {
            return Err(Error::Configuration(
                "HTTP_RETRY_BASE_DELAY_MS must not exceed HTTP_RETRY_MAX_DELAY_MS".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache: CacheConfig {
                enabled: true,
                max_size: 10_000,
                default_ttl: 300,
                cleanup_interval: 300,
                category_ttls: CategoryTtls::default(),
            },
            http: HttpConfig {
                max_connections: 100,
                max_keepalive: 20,
                keepalive_expiry: 30,
                timeout: 30,
                connect_timeout: 10,
                http2: true,
                retry_max_attempts: 3,
                retry_base_delay_ms: 2_000,
                retry_max_delay_ms: 10_000,
            },
            token_safety_margin: 300,
            integrations: Vec::new(),
        }
    }
}

// == Helpers ==
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Configuration(format!("missing required setting {key}")))
}

fn required_url<F>(lookup: &F, key: &str) -> Result<Url>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = required(lookup, key)?;
    Url::parse(&raw).map_err(|e| Error::Configuration(format!("{key} is not a valid URL: {e}")))
}

fn load_integration<F>(lookup: &F, name: &str, default_margin: i64) -> Result<IntegrationConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let prefix = name.to_ascii_uppercase().replace('-', "_");
    let var = |suffix: &str| format!("{prefix}_{suffix}");

    let scope = lookup(&var("SCOPE")).filter(|s| !s.is_empty());
    let auth_kind = lookup(&var("AUTH")).unwrap_or_else(|| "none".to_string());

    let auth = match auth_kind.trim().to_ascii_lowercase().as_str() {
        "none" => AuthConfig::None,
        "basic" => AuthConfig::Basic {
            username: required(lookup, &var("USERNAME"))?,
            password: required(lookup, &var("PASSWORD"))?,
        },
        "client_credentials" => AuthConfig::ClientCredentials {
            token_url: required_url(lookup, &var("TOKEN_URL"))?,
            client_id: required(lookup, &var("CLIENT_ID"))?,
            client_secret: required(lookup, &var("CLIENT_SECRET"))?,
            scope,
        },
        "basic_token" => AuthConfig::BasicToken {
            token_url: required_url(lookup, &var("TOKEN_URL"))?,
            username: required(lookup, &var("USERNAME"))?,
            password: required(lookup, &var("PASSWORD"))?,
            scope,
        },
        other => {
            return Err(Error::Configuration(format!(
                "{} has unknown value '{other}'",
                var("AUTH")
            )))
        }
    };

    Ok(IntegrationConfig {
        name: name.to_string(),
        base_url: required_url(lookup, &var("BASE_URL"))?,
        tenant: lookup(&var("TENANT")).unwrap_or_else(|| "default".to_string()),
        auth,
        token_safety_margin: parse_or(lookup, &var("TOKEN_SAFETY_MARGIN_SECONDS"), default_margin),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cache.max_size, 10_000);
        assert_eq!(config.cache.default_ttl, 300);
        assert_eq!(config.cache.cleanup_interval, 300);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.token_safety_margin, 300);
        assert_eq!(config.http.retry_max_attempts, 3);
    }

    #[test]
    fn test_config_from_empty_lookup_uses_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.cache.max_size, 10_000);
        assert!(config.cache.enabled);
        assert!(config.http.http2);
        assert!(config.integrations.is_empty());
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("CACHE_MAX_SIZE", "50"),
            ("CACHE_ENABLED", "false"),
            ("CACHE_TTL_DEVICE", "42"),
            ("HTTP_ENABLE_HTTP2", "0"),
            ("HTTP_POOL_MAX_CONNECTIONS", "8"),
        ]))
        .unwrap();

        assert_eq!(config.cache.max_size, 50);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.category_ttls.get(CacheCategory::Device), 42);
        assert!(!config.http.http2);
        assert_eq!(config.http.max_connections, 8);
    }

    #[test]
    fn test_unparsable_number_falls_back_to_default() {
        let config = Config::from_lookup(lookup_from(&[("CACHE_MAX_SIZE", "lots")])).unwrap();
        assert_eq!(config.cache.max_size, 10_000);
    }

    #[test]
    fn test_zero_cache_size_rejected() {
        let result = Config::from_lookup(lookup_from(&[("CACHE_MAX_SIZE", "0")]));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let result = Config::from_lookup(lookup_from(&[("HTTP_RETRY_MAX_ATTEMPTS", "0")]));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_client_credentials_integration() {
        let config = Config::from_lookup(lookup_from(&[
            ("INTEGRATIONS", "intune"),
            ("INTUNE_BASE_URL", "https://graph.example.com/v1.0"),
            ("INTUNE_AUTH", "client_credentials"),
            ("INTUNE_TOKEN_URL", "https://login.example.com/tenant/oauth2/v2.0/token"),
            ("INTUNE_CLIENT_ID", "app-id"),
            ("INTUNE_CLIENT_SECRET", "s3cret"),
            ("INTUNE_TENANT", "contoso"),
            ("INTUNE_TOKEN_SAFETY_MARGIN_SECONDS", "120"),
        ]))
        .unwrap();

        let intune = &config.integrations[0];
        assert_eq!(intune.name, "intune");
        assert_eq!(intune.tenant, "contoso");
        assert_eq!(intune.token_safety_margin, 120);
        assert!(matches!(intune.auth, AuthConfig::ClientCredentials { .. }));
        assert!(!format!("{:?}", intune.auth).contains("s3cret"));
    }

    #[test]
    fn test_missing_credential_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("INTEGRATIONS", "servicenow"),
            ("SERVICENOW_BASE_URL", "https://instance.example.com"),
            ("SERVICENOW_AUTH", "basic"),
            ("SERVICENOW_USERNAME", "admin"),
        ]));
        match result {
            Err(Error::Configuration(msg)) => assert!(msg.contains("SERVICENOW_PASSWORD")),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("INTEGRATIONS", "nextthink"),
            ("NEXTTHINK_BASE_URL", "not a url"),
        ]));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_integration_margin_defaults_to_global() {
        let config = Config::from_lookup(lookup_from(&[
            ("TOKEN_SAFETY_MARGIN_SECONDS", "90"),
            ("INTEGRATIONS", "nextthink"),
            ("NEXTTHINK_BASE_URL", "https://api.example.com"),
            ("NEXTTHINK_AUTH", "basic_token"),
            ("NEXTTHINK_TOKEN_URL", "https://auth.example.com/oauth2/default/v1/token"),
            ("NEXTTHINK_USERNAME", "svc"),
            ("NEXTTHINK_PASSWORD", "pw"),
            ("NEXTTHINK_SCOPE", "service:integration"),
        ]))
        .unwrap();

        let nt = &config.integrations[0];
        assert_eq!(nt.token_safety_margin, 90);
        assert_eq!(nt.tenant, "default");
        match &nt.auth {
            AuthConfig::BasicToken { scope, .. } => {
                assert_eq!(scope.as_deref(), Some("service:integration"))
            }
            other => panic!("unexpected auth {other:?}"),
        }
    }
}
