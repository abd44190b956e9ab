//! Login challenge: authenticate the end user

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::challenge::{
    accept_challenge, fetch_challenge, is_false, reject_challenge, ChallengeFlow,
    RedirectOutcome, RejectDecision, RejectableFlow,
};
use crate::clients::ClientRegistration;
use crate::error::Result;
use crate::transport::{CallOptions, Transport};
use crate::utils::wire::null_default;

/// Login flow marker
#[derive(Debug, Clone, Copy)]
pub struct Login;

impl ChallengeFlow for Login {
    const NAME: &'static str = "login";
    const CHALLENGE_PARAM: &'static str = "login_challenge";
    type Request = LoginRequest;
    type Accept = LoginAcceptDecision;
}

impl RejectableFlow for Login {}

/// Pending login request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "null_default")]
    pub challenge: String,
    /// The server already authenticated this user; accept without prompting
    #[serde(default)]
    pub skip: bool,
    /// Empty until the user has authenticated once
    #[serde(default, deserialize_with = "null_default")]
    pub subject: String,
    #[serde(default)]
    pub client: Option<ClientRegistration>,
    #[serde(default)]
    pub request_url: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub requested_scope: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub requested_access_token_audience: Vec<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub redirect_to: Option<String>,
    /// Opaque data carried between the server and the relying application
    #[serde(default, deserialize_with = "null_default")]
    pub context: BTreeMap<String, String>,
}

impl LoginRequest {
    /// Subject, if the server already knows who is logging in
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        (!self.subject.is_empty()).then_some(self.subject.as_str())
    }

    /// Identifier of the client that started the flow
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client.as_ref().and_then(|c| c.client_id.as_deref())
    }
}

/// Decision accepting a login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginAcceptDecision {
    pub subject: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub remember: bool,
    /// Seconds; `0` asks the server to remember indefinitely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remember_for: Option<u64>,
    /// Authentication context class reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl LoginAcceptDecision {
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    /// Ask the server to skip the login prompt for `seconds`
    #[must_use]
    pub fn remember_for(mut self, seconds: u64) -> Self {
        self.remember = true;
        self.remember_for = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_acr(mut self, acr: impl Into<String>) -> Self {
        self.acr = Some(acr.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// `GET {url}?login_challenge=...`
///
/// # Errors
///
/// See [`fetch_challenge`].
pub async fn get_login_request(
    transport: &dyn Transport,
    url: &str,
    challenge: &str,
    options: &CallOptions,
) -> Result<LoginRequest> {
    fetch_challenge::<Login>(transport, url, challenge, options).await
}

/// `PUT {url}?login_challenge=...` with the accept decision
///
/// # Errors
///
/// See [`accept_challenge`].
pub async fn accept_login(
    transport: &dyn Transport,
    url: &str,
    challenge: &str,
    decision: &LoginAcceptDecision,
    options: &CallOptions,
) -> Result<RedirectOutcome> {
    accept_challenge::<Login>(transport, url, challenge, decision, options).await
}

/// `PUT {url}?login_challenge=...` with an error tuple
///
/// # Errors
///
/// See [`reject_challenge`].
pub async fn reject_login(
    transport: &dyn Transport,
    url: &str,
    challenge: &str,
    decision: &RejectDecision,
    options: &CallOptions,
) -> Result<RedirectOutcome> {
    reject_challenge::<Login>(transport, url, challenge, decision, options).await
}
