//! Bearer token providers.
//!
//! The pipeline owns two providers, one per audience (members service and
//! profile store), and asks each for a currently valid token once per event.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use skillsync_core::config::{AuthConfig, Secret};

use crate::error::SyncError;
use crate::http::{build_client, describe, describe_status};

/// Tokens are refreshed this long before they actually expire.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3600);

/// An opaque bearer token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Source of bearer tokens for one audience.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    fn audience(&self) -> &str;

    /// A token valid for at least the duration of one call.
    async fn token(&self) -> Result<BearerToken, SyncError>;
}

// ---------------------------------------------------------------------------
// StaticToken
// ---------------------------------------------------------------------------

/// Always returns the same token. Useful against local stubs.
#[derive(Debug, Clone)]
pub struct StaticToken {
    audience: String,
    token: BearerToken,
}

impl StaticToken {
    pub fn new(audience: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            token: BearerToken::new(token),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    fn audience(&self) -> &str {
        &self.audience
    }

    async fn token(&self) -> Result<BearerToken, SyncError> {
        Ok(self.token.clone())
    }
}

// ---------------------------------------------------------------------------
// ClientCredentialsProvider
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    auth0_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug)]
struct CachedToken {
    token: BearerToken,
    refresh_at: Instant,
}

/// OAuth client-credentials grant with an in-memory cache.
///
/// When a proxy server is configured the grant is posted to the proxy with
/// the real token URL in `auth0_url`.
pub struct ClientCredentialsProvider {
    client: Client,
    token_url: String,
    proxy_url: Option<String>,
    audience: String,
    client_id: String,
    client_secret: Secret,
    cache_cap: Option<Duration>,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsProvider {
    pub fn new(
        client: Client,
        auth: &AuthConfig,
        audience: &str,
    ) -> Result<Self, SyncError> {
        let client_id = auth.client_id.clone().ok_or_else(|| {
            SyncError::Config("AUTH0_CLIENT_ID is required for token acquisition".to_string())
        })?;
        let client_secret = auth.client_secret.clone().ok_or_else(|| {
            SyncError::Config("AUTH0_CLIENT_SECRET is required for token acquisition".to_string())
        })?;

        Ok(Self {
            client,
            token_url: auth.url.clone(),
            proxy_url: auth.proxy_server_url.clone(),
            audience: audience.to_string(),
            client_id,
            client_secret,
            cache_cap: auth.token_cache_time(),
            cached: Mutex::new(None),
        })
    }

    /// Build with a dedicated client using `timeout`.
    pub fn from_config(
        auth: &AuthConfig,
        audience: &str,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        Self::new(build_client(timeout)?, auth, audience)
    }

    async fn fetch(&self) -> Result<(BearerToken, Duration), SyncError> {
        let (endpoint, auth0_url) = match &self.proxy_url {
            Some(proxy) => (proxy.as_str(), Some(self.token_url.as_str())),
            None => (self.token_url.as_str(), None),
        };
        let body = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.client_id,
            client_secret: self.client_secret.expose(),
            audience: &self.audience,
            auth0_url,
        };

        tracing::debug!(audience = %self.audience, endpoint, "requesting machine token");
        let response = self
            .client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.token_err(describe(&e)))?;

        if !response.status().is_success() {
            return Err(self.token_err(describe_status(response).await));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| self.token_err(describe(&e)))?;

        let mut lifetime = parsed
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LIFETIME);
        if let Some(cap) = self.cache_cap {
            lifetime = lifetime.min(cap);
        }
        Ok((BearerToken::new(parsed.access_token), lifetime))
    }

    fn token_err(&self, reason: String) -> SyncError {
        SyncError::Token {
            audience: self.audience.clone(),
            reason,
        }
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    fn audience(&self) -> &str {
        &self.audience
    }

    async fn token(&self) -> Result<BearerToken, SyncError> {
        // Held across the fetch so concurrent callers share one refresh.
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if Instant::now() < entry.refresh_at {
                return Ok(entry.token.clone());
            }
        }

        let (token, lifetime) = self.fetch().await?;
        *cached = Some(CachedToken {
            token: token.clone(),
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });
        Ok(token)
    }
}
