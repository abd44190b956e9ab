//! Logout challenge: acknowledgement only, there is no reject path

use serde::{Deserialize, Serialize};

use crate::challenge::{accept_challenge, fetch_challenge, ChallengeFlow, RedirectOutcome};
use crate::error::Result;
use crate::transport::{CallOptions, Transport};
use crate::utils::wire::null_default;

/// Logout flow marker
#[derive(Debug, Clone, Copy)]
pub struct Logout;

impl ChallengeFlow for Logout {
    const NAME: &'static str = "logout";
    const CHALLENGE_PARAM: &'static str = "logout_challenge";
    type Request = LogoutRequest;
    type Accept = LogoutAcceptDecision;
}

/// Pending logout request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutRequest {
    #[serde(default, deserialize_with = "null_default")]
    pub request_url: String,
    /// Initiated by the relying party rather than the user agent
    #[serde(default)]
    pub rp_initiated: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub sid: String,
    #[serde(default, deserialize_with = "null_default")]
    pub subject: String,
}

/// Empty acknowledgement; serializes as `{}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutAcceptDecision {}

/// `GET {url}?logout_challenge=...`
///
/// # Errors
///
/// See [`fetch_challenge`].
pub async fn get_logout_request(
    transport: &dyn Transport,
    url: &str,
    challenge: &str,
    options: &CallOptions,
) -> Result<LogoutRequest> {
    fetch_challenge::<Logout>(transport, url, challenge, options).await
}

/// `PUT {url}?logout_challenge=...` with an empty body
///
/// # Errors
///
/// See [`accept_challenge`].
pub async fn accept_logout(
    transport: &dyn Transport,
    url: &str,
    challenge: &str,
    options: &CallOptions,
) -> Result<RedirectOutcome> {
    accept_challenge::<Logout>(transport, url, challenge, &LogoutAcceptDecision {}, options).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_serializes_to_empty_object() {
        assert_eq!(serde_json::to_string(&LogoutAcceptDecision {}).unwrap(), "{}");
    }

    #[test]
    fn test_logout_request_fields() {
        let request: LogoutRequest = serde_json::from_str(
            r#"{"request_url":"https://hydra/oauth2/sessions/logout","rp_initiated":true,"sid":"s-1","subject":"alice"}"#,
        )
        .unwrap();
        assert!(request.rp_initiated);
        assert_eq!(request.sid, "s-1");
        assert_eq!(request.subject, "alice");
    }
}
