//! Consent challenge: grant scopes and audiences to a client
//!
//! When [`ConsentRequest::skip`] is set the user already consented and the
//! relying application is expected to accept straight away with the
//! previously granted scopes; [`ConsentRequest::remembered_accept`] builds
//! that decision. Nothing here enforces the policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::challenge::{
    accept_challenge, fetch_challenge, reject_challenge, ChallengeFlow, RedirectOutcome,
    RejectDecision, RejectableFlow,
};
use crate::clients::ClientRegistration;
use crate::error::Result;
use crate::transport::{CallOptions, RequestBody, Transport};
use crate::utils::wire::null_default;

/// Consent flow marker
#[derive(Debug, Clone, Copy)]
pub struct Consent;

impl ChallengeFlow for Consent {
    const NAME: &'static str = "consent";
    const CHALLENGE_PARAM: &'static str = "consent_challenge";
    type Request = ConsentRequest;
    type Accept = ConsentAcceptDecision;
}

impl RejectableFlow for Consent {
    // The consent reject endpoint takes the complete error tuple
    fn reject_body(decision: &RejectDecision) -> Result<RequestBody> {
        RequestBody::json(&ConsentRejectBody {
            error: &decision.error,
            error_debug: &decision.error_debug,
            error_description: &decision.error_description,
            error_hint: &decision.error_hint,
            status_code: decision.status_code.unwrap_or_default(),
        })
    }
}

#[derive(Serialize)]
struct ConsentRejectBody<'a> {
    error: &'a str,
    error_debug: &'a str,
    error_description: &'a str,
    error_hint: &'a str,
    status_code: u16,
}

/// Pending consent request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsentRequest {
    #[serde(default, deserialize_with = "null_default")]
    pub challenge: String,
    #[serde(default, deserialize_with = "null_default")]
    pub subject: String,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub redirect_to: Option<String>,
    #[serde(default)]
    pub request_url: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub requested_scope: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub requested_access_token_audience: Vec<String>,
    #[serde(default)]
    pub client: Option<ClientRegistration>,
    #[serde(default, deserialize_with = "null_default")]
    pub context: BTreeMap<String, String>,
}

impl ConsentRequest {
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client.as_ref().and_then(|c| c.client_id.as_deref())
    }

    /// Accept decision granting everything that was requested, for the
    /// skip path where consent was remembered earlier
    #[must_use]
    pub fn remembered_accept(&self) -> ConsentAcceptDecision {
        ConsentAcceptDecision {
            subject: (!self.subject.is_empty()).then(|| self.subject.clone()),
            grant_scope: self.requested_scope.clone(),
            grant_access_token_audience: self.requested_access_token_audience.clone(),
            ..ConsentAcceptDecision::default()
        }
    }
}

/// Claims issued into the tokens minted for this consent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsentSession {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub access_token: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub id_token: BTreeMap<String, Value>,
}

/// Decision accepting a consent request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsentAcceptDecision {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Order is irrelevant to the server
    pub grant_scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grant_access_token_audience: Vec<String>,
    pub session: ConsentSession,
    pub remember: bool,
    pub remember_for: u64,
}

impl ConsentAcceptDecision {
    #[must_use]
    pub fn new<I, S>(grant_scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            grant_scope: grant_scope.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    #[must_use]
    pub fn with_audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grant_access_token_audience = audience.into_iter().map(Into::into).collect();
        self
    }

    /// Ask the server to skip the consent prompt for `seconds`
    #[must_use]
    pub fn remember_for(mut self, seconds: u64) -> Self {
        self.remember = true;
        self.remember_for = seconds;
        self
    }

    #[must_use]
    pub fn with_access_token_claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.session.access_token.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_id_token_claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.session.id_token.insert(name.into(), value);
        self
    }
}

/// `GET {url}?consent_challenge=...`
///
/// `NotFound` here means the challenge does not exist or was already
/// resolved.
///
/// # Errors
///
/// See [`fetch_challenge`].
pub async fn get_consent_request(
    transport: &dyn Transport,
    url: &str,
    challenge: &str,
    options: &CallOptions,
) -> Result<ConsentRequest> {
    fetch_challenge::<Consent>(transport, url, challenge, options).await
}

/// `PUT {url}?consent_challenge=...` with the accept decision
///
/// # Errors
///
/// See [`accept_challenge`].
pub async fn accept_consent(
    transport: &dyn Transport,
    url: &str,
    challenge: &str,
    decision: &ConsentAcceptDecision,
    options: &CallOptions,
) -> Result<RedirectOutcome> {
    accept_challenge::<Consent>(transport, url, challenge, decision, options).await
}

/// `PUT {url}?consent_challenge=...` with an error tuple
///
/// # Errors
///
/// See [`reject_challenge`].
pub async fn reject_consent(
    transport: &dyn Transport,
    url: &str,
    challenge: &str,
    decision: &RejectDecision,
    options: &CallOptions,
) -> Result<RedirectOutcome> {
    reject_challenge::<Consent>(transport, url, challenge, decision, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accept_body_always_carries_required_fields() {
        let json = serde_json::to_value(ConsentAcceptDecision::new(["openid"])).unwrap();
        assert_eq!(
            json,
            json!({
                "grant_scope": ["openid"],
                "session": {},
                "remember": false,
                "remember_for": 0
            })
        );
    }

    #[test]
    fn test_accept_body_with_claims() {
        let decision = ConsentAcceptDecision::new(["openid", "offline"])
            .with_subject("alice")
            .with_audience(["api"])
            .remember_for(600)
            .with_id_token_claim("email", json!("alice@example.com"));
        let json = serde_json::to_value(decision).unwrap();
        assert_eq!(json["subject"], "alice");
        assert_eq!(json["grant_access_token_audience"], json!(["api"]));
        assert_eq!(json["session"]["id_token"]["email"], "alice@example.com");
        assert!(json["session"].get("access_token").is_none());
        assert_eq!(json["remember"], true);
        assert_eq!(json["remember_for"], 600);
    }

    #[test]
    fn test_remembered_accept_copies_previous_grant() {
        let request: ConsentRequest = serde_json::from_value(json!({
            "challenge": "c",
            "subject": "alice",
            "skip": true,
            "redirect_to": null,
            "requested_scope": ["openid", "profile"],
            "requested_access_token_audience": ["api"],
            "client": {"client_id": "spa"},
            "context": {"origin": "mobile"}
        }))
        .unwrap();

        let decision = request.remembered_accept();
        assert_eq!(decision.subject.as_deref(), Some("alice"));
        assert_eq!(decision.grant_scope, vec!["openid", "profile"]);
        assert_eq!(decision.grant_access_token_audience, vec!["api"]);
        assert_eq!(request.client_id(), Some("spa"));
        assert_eq!(request.context.get("origin").map(String::as_str), Some("mobile"));
    }
}
