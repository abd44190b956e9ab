//! Transport capability shared by every operation
//!
//! The [`Transport`] trait is the only seam between the protocol logic and
//! the network. It is constructed once (usually an [`http::HttpTransport`])
//! and handed to every operation as `&dyn Transport`, which makes it trivial
//! to substitute a fake in tests.
//!
//! A transport issues exactly one request per [`Transport::send`] call and
//! performs no retries. Bearer credentials are attached only when
//! [`CallOptions::authenticated`] is set; deadlines and cancellation are
//! carried in the same options and surface as [`TransportError`]s.

pub mod credentials;
pub mod http;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, TransportError};

pub use credentials::{ClientCredentials, ClientCredentialsTokenSource};
pub use http::HttpTransport;

/// HTTP verbs used by the Authorization Server admin API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    /// UTF-8 JSON document
    Json(Vec<u8>),
    /// `application/x-www-form-urlencoded` pairs, encoded by the transport
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Serialize `value` as a JSON body
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the value cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, Error> {
        serde_json::to_vec(value).map(Self::Json).map_err(Error::Encode)
    }

    /// Parse a JSON body back into a value; used by fakes and tests
    #[must_use]
    pub fn as_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Json(bytes) => serde_json::from_slice(bytes).ok(),
            _ => None,
        }
    }

    /// Look up a form field by name
    #[must_use]
    pub fn form_value(&self, name: &str) -> Option<&str> {
        match self {
            Self::Form(pairs) => pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }
}

/// Per-call options forwarded unchanged to the transport
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Attach a bearer token obtained through the client-credentials grant
    pub authenticated: bool,
    /// Deadline for this call; overrides the transport default
    pub timeout: Option<Duration>,
    /// Cancelling this token aborts the in-flight request
    pub cancellation: Option<CancellationToken>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            authenticated: true,
            timeout: None,
            cancellation: None,
        }
    }
}

impl CallOptions {
    /// Options for a call that must not carry credentials
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_authentication(mut self, authenticated: bool) -> Self {
        self.authenticated = authenticated;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// True once the caller has cancelled this call
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// One outbound request
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub options: CallOptions,
}

impl TransportRequest {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>, options: &CallOptions) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            options: options.clone(),
        }
    }

    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Look up a query parameter by name
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Raw answer: status code plus undecoded body bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    #[must_use]
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Build a response with a JSON-serialized body
    #[must_use]
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }
}

/// Network capability used by every operation
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Issue exactly one request and return the raw response.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if no HTTP response was obtained,
    /// including deadline expiry and cancellation.
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError>;
}
