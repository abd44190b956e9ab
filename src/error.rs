//! Error taxonomy for challenge, registry and introspection calls
//!
//! Every operation either fully succeeds or returns one of three classes of
//! failure:
//!
//! - [`TransportError`] - the request never produced an HTTP response
//!   (network, TLS, DNS, deadline, cancellation, credentials).
//! - [`Error::Decode`] - the server answered with a success status but the
//!   body could not be decoded into the expected shape.
//! - [`ProtocolError`] - the server answered with a non-success status,
//!   classified by [`ProtocolErrorKind`].

use std::fmt;

use thiserror::Error;

/// Failures that happen before an HTTP response is available.
///
/// Nothing in this crate retries; the caller decides.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} exceeded its deadline")]
    Timeout { url: String },

    #[error("request to {url} was cancelled")]
    Cancelled { url: String },

    #[error("invalid request url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The bearer token could not be obtained, or the call required one and
    /// no client credentials are configured.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Failure raised by a custom or fake transport.
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Convert a reqwest error into the matching variant
    #[must_use]
    pub fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else {
            Self::Request {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Status-code classification applied uniformly to every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolErrorKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404. On challenge endpoints: the challenge does not exist, expired,
    /// or was already resolved. Retrying an accept/reject that failed this
    /// way is pointless because the challenge is consumed.
    NotFound,
    /// 500
    ServerError,
    /// Any other status
    Unhandled,
}

impl ProtocolErrorKind {
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500 => Self::ServerError,
            _ => Self::Unhandled,
        }
    }

    /// Whether the raw response body may be echoed back to the caller.
    ///
    /// Server errors and unknown statuses never echo the body so internal
    /// details of the Authorization Server do not leak.
    #[must_use]
    pub fn echoes_body(self) -> bool {
        matches!(
            self,
            Self::BadRequest | Self::Unauthorized | Self::Forbidden | Self::NotFound
        )
    }
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BadRequest => "Bad Request",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "Not Found",
            Self::ServerError => "Internal Server Error",
            Self::Unhandled => "Unhandled error",
        };
        f.write_str(label)
    }
}

/// Non-success answer from the Authorization Server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    pub kind: ProtocolErrorKind,
    pub status: u16,
    pub body: Option<String>,
}

impl ProtocolError {
    /// Build a protocol error, dropping the body when the kind must not echo it
    #[must_use]
    pub fn new(status: u16, body: &[u8]) -> Self {
        let kind = ProtocolErrorKind::from_status(status);
        let body = kind
            .echoes_body()
            .then(|| String::from_utf8_lossy(body).into_owned());
        Self { kind, status, body }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Some(body) if !body.is_empty() => write!(f, "{}: {body}", self.kind),
            _ if self.kind == ProtocolErrorKind::Unhandled => {
                write!(f, "{} (status {})", self.kind, self.status)
            }
            _ => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Crate-level error returned by every operation
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to decode response: {reason} (body: {body})")]
    Decode { reason: String, body: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
}

impl Error {
    /// Protocol classification, if the server answered at all
    #[must_use]
    pub fn protocol_kind(&self) -> Option<ProtocolErrorKind> {
        match self {
            Self::Protocol(err) => Some(err.kind),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.protocol_kind() == Some(ProtocolErrorKind::NotFound)
    }

    /// Whether repeating the exact same call could plausibly succeed.
    ///
    /// Cancellation is the caller's own decision and is not retryable;
    /// `NotFound` on a challenge means it was consumed or expired.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(TransportError::Request { .. } | TransportError::Timeout { .. }) => {
                true
            }
            Self::Protocol(err) => err.kind == ProtocolErrorKind::ServerError,
            _ => false,
        }
    }

    pub(crate) fn decode(reason: impl fmt::Display, body: &[u8]) -> Self {
        Self::Decode {
            reason: reason.to_string(),
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_status() {
        assert_eq!(ProtocolErrorKind::from_status(400), ProtocolErrorKind::BadRequest);
        assert_eq!(ProtocolErrorKind::from_status(401), ProtocolErrorKind::Unauthorized);
        assert_eq!(ProtocolErrorKind::from_status(403), ProtocolErrorKind::Forbidden);
        assert_eq!(ProtocolErrorKind::from_status(404), ProtocolErrorKind::NotFound);
        assert_eq!(ProtocolErrorKind::from_status(500), ProtocolErrorKind::ServerError);
        assert_eq!(ProtocolErrorKind::from_status(418), ProtocolErrorKind::Unhandled);
        assert_eq!(ProtocolErrorKind::from_status(502), ProtocolErrorKind::Unhandled);
    }

    #[test]
    fn test_bad_request_keeps_body() {
        let err = ProtocolError::new(400, br#"{"error":"invalid_request"}"#);
        assert_eq!(err.body.as_deref(), Some(r#"{"error":"invalid_request"}"#));
        assert_eq!(
            err.to_string(),
            r#"Bad Request: {"error":"invalid_request"}"#
        );
    }

    #[test]
    fn test_server_error_drops_body() {
        let err = ProtocolError::new(500, b"stack trace with secrets");
        assert_eq!(err.kind, ProtocolErrorKind::ServerError);
        assert!(err.body.is_none());
        assert_eq!(err.to_string(), "Internal Server Error");
    }

    #[test]
    fn test_unhandled_mentions_status() {
        let err = ProtocolError::new(418, b"teapot");
        assert!(err.body.is_none());
        assert_eq!(err.to_string(), "Unhandled error (status 418)");
    }

    #[test]
    fn test_retryable_classification() {
        let not_found = Error::from(ProtocolError::new(404, b""));
        assert!(not_found.is_not_found());
        assert!(!not_found.is_retryable());

        let server = Error::from(ProtocolError::new(500, b""));
        assert!(server.is_retryable());

        let timeout = Error::from(TransportError::Timeout {
            url: "http://hydra".to_string(),
        });
        assert!(timeout.is_retryable());
        assert_eq!(timeout.protocol_kind(), None);

        let cancelled = Error::from(TransportError::Cancelled {
            url: "http://hydra".to_string(),
        });
        assert!(!cancelled.is_retryable());
    }

    #[test]
    fn test_decode_error_carries_body() {
        let err = Error::decode("expected value", b"not json");
        match err {
            Error::Decode { body, reason } => {
                assert_eq!(body, "not json");
                assert_eq!(reason, "expected value");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
