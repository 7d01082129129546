//! Token Acquirers
//!
//! The collaborator boundary that actually talks to an OAuth2-style token
//! endpoint. [`TokenCache`](super::TokenCache) treats it as opaque.

use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::auth::CredentialIdentity;
use crate::config::AuthConfig;

/// Issuer expiry assumed when a token response omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: i64 = 3600;

// == Acquired Token ==
/// Raw result of one token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredToken {
    pub access_token: String,
    /// Issuer-reported lifetime in seconds
    pub expires_in: i64,
}

// == Token Acquirer ==
/// Fetches a fresh bearer token for one credential identity.
#[async_trait]
pub trait TokenAcquirer: Send + Sync {
    async fn acquire(&self, identity: &CredentialIdentity) -> anyhow::Result<AcquiredToken>;
}

// == OAuth2 Acquirer ==
/// Where the client credentials travel in the token request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthStyle {
    /// `client_id` and `client_secret` as form fields
    RequestBody,
    /// HTTP basic authentication header
    BasicAuth,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<i64>,
}

/// Client-credentials token acquisition over the shared reqwest client.
#[derive(Clone)]
pub struct OAuth2Acquirer {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: String,
    scope: Option<String>,
    style: ClientAuthStyle,
}

impl std::fmt::Debug for OAuth2Acquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuth2Acquirer")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("style", &self.style)
            .finish_non_exhaustive()
    }
}

impl OAuth2Acquirer {
    pub fn new(
        http: reqwest::Client,
        token_url: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        style: ClientAuthStyle,
    ) -> Self {
        Self {
            http,
            token_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: None,
            style,
        }
    }

    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Builds an acquirer for token-based auth settings, `None` otherwise.
    pub fn from_auth_config(http: reqwest::Client, auth: &AuthConfig) -> Option<Self> {
        match auth {
            AuthConfig::ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scope,
            } => Some(
                Self::new(
                    http,
                    token_url.clone(),
                    client_id,
                    client_secret,
                    ClientAuthStyle::RequestBody,
                )
                .with_scope(scope.clone()),
            ),
            AuthConfig::BasicToken {
                token_url,
                username,
                password,
                scope,
            } => Some(
                Self::new(
                    http,
                    token_url.clone(),
                    username,
                    password,
                    ClientAuthStyle::BasicAuth,
                )
                .with_scope(scope.clone()),
            ),
            AuthConfig::None | AuthConfig::Basic { .. } => None,
        }
    }
}

#[async_trait]
impl TokenAcquirer for OAuth2Acquirer {
    async fn acquire(&self, identity: &CredentialIdentity) -> anyhow::Result<AcquiredToken> {
        debug!(identity = %identity, token_url = %self.token_url, "Requesting access token");

        let mut form: Vec<(&str, &str)> = vec![("grant_type", "client_credentials")];
        if let Some(scope) = &self.scope {
            form.push(("scope", scope.as_str()));
        }

        let mut request = self.http.post(self.token_url.clone());
        match self.style {
            ClientAuthStyle::RequestBody => {
                form.push(("client_id", self.client_id.as_str()));
                form.push(("client_secret", self.client_secret.as_str()));
            }
            ClientAuthStyle::BasicAuth => {
                request = request.basic_auth(&self.client_id, Some(&self.client_secret));
            }
        }

        let response = request
            .form(&form)
            .send()
            .await
            .context("token endpoint unreachable")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            bail!("token endpoint returned {status}: {body}");
        }

        let body: TokenResponse = response
            .json()
            .await
            .context("token response was not valid JSON")?;

        let access_token = body
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| anyhow!("token response missing access_token"))?;

        Ok(AcquiredToken {
            access_token,
            expires_in: body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
        })
    }
}
