//! reqwest-backed [`Transport`]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::error::TransportError;
use crate::settings::MediatorSettings;
use crate::transport::credentials::{ClientCredentials, ClientCredentialsTokenSource};
use crate::transport::{Method, RawResponse, RequestBody, Transport, TransportRequest};
use crate::utils::logging::LoggingHelper;

/// HTTP transport with optional client-credentials bearer authentication.
///
/// Cheap to clone; clones share the connection pool and the token cache.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    tokens: Option<Arc<ClientCredentialsTokenSource>>,
}

impl HttpTransport {
    /// Build a transport with a default per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built
    /// (TLS backend initialisation failure).
    pub fn new(
        timeout: Duration,
        credentials: Option<ClientCredentials>,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, credentials))
    }

    /// Wrap an existing reqwest client
    #[must_use]
    pub fn with_client(http: reqwest::Client, credentials: Option<ClientCredentials>) -> Self {
        let tokens = credentials
            .map(|credentials| Arc::new(ClientCredentialsTokenSource::new(http.clone(), credentials)));
        Self { http, tokens }
    }

    /// Build from loaded settings
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_settings(settings: &MediatorSettings) -> Result<Self, TransportError> {
        Self::new(
            Duration::from_secs(settings.http.timeout_seconds),
            settings.client_credentials(),
        )
    }

    /// Whether bearer authentication is available
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.tokens.is_some()
    }

    async fn bearer_token(&self) -> Result<String, TransportError> {
        match &self.tokens {
            Some(tokens) => tokens.access_token().await,
            None => Err(TransportError::Credentials(
                "call requires authentication but no client credentials are configured"
                    .to_string(),
            )),
        }
    }

    fn build_url(request: &TransportRequest) -> Result<url::Url, TransportError> {
        let mut url = url::Url::parse(&request.url).map_err(|e| TransportError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &request.query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    async fn execute(&self, request: TransportRequest) -> Result<RawResponse, TransportError> {
        let url = Self::build_url(&request)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .http
            .request(method, url.clone())
            .header(ACCEPT, "application/json");
        if let Some(timeout) = request.options.timeout {
            builder = builder.timeout(timeout);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(bytes) => builder.header(CONTENT_TYPE, "application/json").body(bytes),
            RequestBody::Form(pairs) => builder.form(&pairs),
        };
        let bearer = if request.options.authenticated {
            let token = self.bearer_token().await?;
            builder = builder.bearer_auth(&token);
            Some(token)
        } else {
            None
        };

        LoggingHelper::log_request_sent(request.method, &request.url);
        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(&request.url, e))?;
        LoggingHelper::log_response_received(request.method, &request.url, status, body.len());

        if status == 401 {
            if let (Some(tokens), Some(sent)) = (&self.tokens, &bearer) {
                tokens.invalidate(sent).await;
            }
        }

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }

    /// The caller's deadline covers the whole call, token grant included
    async fn execute_within_deadline(
        &self,
        request: TransportRequest,
    ) -> Result<RawResponse, TransportError> {
        let Some(limit) = request.options.timeout else {
            return self.execute(request).await;
        };
        let url = request.url.clone();
        tokio::time::timeout(limit, self.execute(request))
            .await
            .unwrap_or(Err(TransportError::Timeout { url }))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError> {
        let url = request.url.clone();
        let Some(token) = request.options.cancellation.clone() else {
            return self.execute_within_deadline(request).await;
        };
        if token.is_cancelled() {
            return Err(TransportError::Cancelled { url });
        }

        tokio::select! {
            () = token.cancelled() => {
                LoggingHelper::log_request_cancelled(&url);
                Err(TransportError::Cancelled { url })
            }
            result = self.execute_within_deadline(request) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::CallOptions;

    #[test]
    fn test_build_url_appends_encoded_query() {
        let request = TransportRequest::new(
            Method::Get,
            "http://hydra:4445/oauth2/auth/requests/login",
            &CallOptions::default(),
        )
        .query("login_challenge", "a b&c");
        let url = HttpTransport::build_url(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "http://hydra:4445/oauth2/auth/requests/login?login_challenge=a+b%26c"
        );
    }

    #[test]
    fn test_build_url_rejects_garbage() {
        let request = TransportRequest::new(Method::Get, "not a url", &CallOptions::default());
        assert!(matches!(
            HttpTransport::build_url(&request),
            Err(TransportError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_authenticated_call_without_credentials_fails() {
        let transport = HttpTransport::new(Duration::from_secs(1), None).unwrap();
        assert!(!transport.has_credentials());
        let request = TransportRequest::new(
            Method::Get,
            "http://127.0.0.1:9/clients",
            &CallOptions::default(),
        );
        let result = transport.send(request).await;
        assert!(matches!(result, Err(TransportError::Credentials(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let transport = HttpTransport::new(Duration::from_secs(1), None).unwrap();
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let request = TransportRequest::new(
            Method::Get,
            "http://127.0.0.1:9/clients",
            &CallOptions::anonymous().with_cancellation(token),
        );
        let result = transport.send(request).await;
        assert!(matches!(result, Err(TransportError::Cancelled { .. })));
    }
}
