//! Challenge flows: fetch a pending login/consent/logout request and resolve it
//!
//! The Authorization Server suspends an authentication attempt and hands the
//! relying application an opaque challenge. Each flow follows the same shape:
//!
//! ```text
//! GET  {url}?{flow}_challenge=...            -> flow request (repeatable)
//! PUT  {accept_url}?{flow}_challenge=...     -> {"redirect_to": ...}
//! PUT  {reject_url}?{flow}_challenge=...     -> {"redirect_to": ...}  (login, consent)
//! ```
//!
//! The request building and response handling is written once in
//! [`fetch_challenge`], [`accept_challenge`] and [`reject_challenge`]; the
//! flows only contribute their query parameter name and schemas through
//! [`ChallengeFlow`].
//!
//! A challenge resolves exactly once. Any later fetch or resolution yields
//! [`ProtocolErrorKind::NotFound`](crate::error::ProtocolErrorKind::NotFound),
//! and retrying it is pointless.

pub mod consent;
pub mod login;
pub mod logout;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::decode::{decode_json, SUCCESS_OK};
use crate::error::{Error, Result};
use crate::transport::{CallOptions, Method, RequestBody, Transport, TransportRequest};
use crate::utils::logging::LoggingHelper;

pub use consent::{
    accept_consent, get_consent_request, reject_consent, Consent, ConsentAcceptDecision,
    ConsentRequest, ConsentSession,
};
pub use login::{
    accept_login, get_login_request, reject_login, Login, LoginAcceptDecision, LoginRequest,
};
pub use logout::{accept_logout, get_logout_request, Logout, LogoutAcceptDecision, LogoutRequest};

/// Wire schema revision these types follow.
///
/// Only one revision is modelled: the later admin API where login requests
/// carry `client`, `requested_scope` and `context`, and consent sessions
/// carry claim maps.
pub const WIRE_REVISION: &str = "hydra-admin/v1";

/// Per-flow protocol contract
pub trait ChallengeFlow {
    /// Flow name used in logs (`login`, `consent`, `logout`)
    const NAME: &'static str;
    /// Query parameter carrying the challenge
    const CHALLENGE_PARAM: &'static str;
    /// Read-side record describing the pending decision
    type Request: DeserializeOwned;
    /// Accept payload
    type Accept: Serialize + Sync;
}

/// Flows that can be rejected with an OAuth2 error tuple.
///
/// Logout is acknowledgement-only and deliberately does not implement this.
pub trait RejectableFlow: ChallengeFlow {
    /// Encode the rejection body; by default unset fields are left out
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`] if the decision cannot be serialized.
    fn reject_body(decision: &RejectDecision) -> Result<RequestBody> {
        RequestBody::json(decision)
    }
}

/// Where the end user's browser must be sent next
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectOutcome {
    pub redirect_to: String,
}

/// OAuth2 error tuple used to reject a login or consent request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectDecision {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_debug: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_hint: String,
    /// Status surfaced to the end user's browser on redirect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl RejectDecision {
    #[must_use]
    pub fn new(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: description.into(),
            ..Self::default()
        }
    }

    /// The standard `access_denied` rejection
    #[must_use]
    pub fn access_denied(description: impl Into<String>) -> Self {
        Self::new("access_denied", description).with_status(403)
    }

    #[must_use]
    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.error_debug = debug.into();
        self
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.error_hint = hint.into();
        self
    }

    #[must_use]
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }
}

/// Fetch the pending request named by `challenge`
///
/// Repeatable until the challenge is resolved or expires.
///
/// # Errors
///
/// Returns [`Error::Protocol`] with `NotFound` if the challenge is unknown,
/// expired or already resolved, and any transport or decode failure.
pub async fn fetch_challenge<F: ChallengeFlow>(
    transport: &dyn Transport,
    url: &str,
    challenge: &str,
    options: &CallOptions,
) -> Result<F::Request> {
    LoggingHelper::log_challenge_fetch(F::NAME, challenge);
    let request = TransportRequest::new(Method::Get, url, options)
        .query(F::CHALLENGE_PARAM, challenge);
    let raw = transport.send(request).await?;
    decode_json(&raw, SUCCESS_OK)
}

async fn resolve_challenge<F: ChallengeFlow>(
    transport: &dyn Transport,
    url: &str,
    challenge: &str,
    body: RequestBody,
    options: &CallOptions,
) -> Result<RedirectOutcome> {
    let request = TransportRequest::new(Method::Put, url, options)
        .query(F::CHALLENGE_PARAM, challenge)
        .body(body);
    let raw = transport.send(request).await?;
    let outcome: RedirectOutcome = decode_json(&raw, SUCCESS_OK)?;
    if outcome.redirect_to.trim().is_empty() {
        return Err(Error::decode("response carried an empty redirect_to", &raw.body));
    }
    LoggingHelper::log_challenge_resolved(F::NAME, &outcome.redirect_to);
    Ok(outcome)
}

/// Accept `challenge` with the flow's decision payload
///
/// # Errors
///
/// Returns [`Error::Protocol`] with `NotFound` if the challenge was already
/// consumed, [`Error::Decode`] if the answer lacks a usable `redirect_to`,
/// and any transport failure.
pub async fn accept_challenge<F: ChallengeFlow>(
    transport: &dyn Transport,
    url: &str,
    challenge: &str,
    decision: &F::Accept,
    options: &CallOptions,
) -> Result<RedirectOutcome> {
    let body = RequestBody::json(decision)?;
    resolve_challenge::<F>(transport, url, challenge, body, options).await
}

/// Reject `challenge` with an OAuth2 error tuple
///
/// # Errors
///
/// Same as [`accept_challenge`].
pub async fn reject_challenge<F: RejectableFlow>(
    transport: &dyn Transport,
    url: &str,
    challenge: &str,
    decision: &RejectDecision,
    options: &CallOptions,
) -> Result<RedirectOutcome> {
    let body = F::reject_body(decision)?;
    resolve_challenge::<F>(transport, url, challenge, body, options).await
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}
