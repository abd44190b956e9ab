//! Client-credentials grant with a single-flight token cache

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::TransportError;
use crate::utils::logging::LoggingHelper;

/// Refresh this long before the server-side expiry
const EXPIRY_SKEW_SECONDS: i64 = 30;

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECONDS: i64 = 3600;

const MAX_TOKEN_LIFETIME_SECONDS: i64 = 365 * 24 * 3600;

/// Credentials for the OAuth2 client-credentials grant
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    /// Sent as the `audience` endpoint parameter when set
    pub audience: Option<String>,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_url", &self.token_url)
            .field("scopes", &self.scopes)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(EXPIRY_SKEW_SECONDS) > now
    }
}

/// Obtains and caches bearer tokens for the admin API.
///
/// The cache sits behind an async mutex that stays locked while a grant
/// request is in flight, so concurrent callers wait for one refresh instead
/// of each issuing their own.
#[derive(Debug)]
pub struct ClientCredentialsTokenSource {
    http: reqwest::Client,
    credentials: ClientCredentials,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsTokenSource {
    #[must_use]
    pub fn new(http: reqwest::Client, credentials: ClientCredentials) -> Self {
        Self {
            http,
            credentials,
            cached: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    /// Return a valid access token, running the grant if the cache is stale
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Credentials`] if the token endpoint rejects
    /// the grant or answers with an unreadable body, and a request error if
    /// it cannot be reached.
    pub async fn access_token(&self) -> Result<String, TransportError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token so the next call runs the grant again.
    ///
    /// Only clears the cache while it still holds `rejected`; a token
    /// refreshed by a concurrent caller in the meantime is kept.
    pub async fn invalidate(&self, rejected: &str) {
        let mut cached = self.cached.lock().await;
        if cached.as_ref().is_some_and(|token| token.value == rejected) {
            *cached = None;
        }
    }

    async fn request_token(&self) -> Result<CachedToken, TransportError> {
        let credentials = &self.credentials;
        let mut params = vec![("grant_type", "client_credentials".to_string())];
        if !credentials.scopes.is_empty() {
            params.push(("scope", credentials.scopes.join(" ")));
        }
        if let Some(audience) = &credentials.audience {
            params.push(("audience", audience.clone()));
        }

        LoggingHelper::log_token_request(&credentials.token_url, &credentials.client_id);
        let response = self
            .http
            .post(&credentials.token_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&credentials.token_url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&credentials.token_url, e))?;
        if !status.is_success() {
            return Err(TransportError::Credentials(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            TransportError::Credentials(format!("failed to parse token response: {e}"))
        })?;
        if let Some(token_type) = &token.token_type {
            if !token_type.eq_ignore_ascii_case("bearer") {
                return Err(TransportError::Credentials(format!(
                    "unsupported token type: {token_type}"
                )));
            }
        }

        let lifetime = token
            .expires_in
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECONDS)
            .clamp(0, MAX_TOKEN_LIFETIME_SECONDS);
        LoggingHelper::log_token_refreshed(token.access_token.len(), lifetime);
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        })
    }
}
