//! Token introspection and user info
//!
//! Introspection of an invalid, expired or revoked token is not an error:
//! the server answers `200` with `active: false`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decode::{decode_json, SUCCESS_OK};
use crate::error::Result;
use crate::transport::{CallOptions, Method, RequestBody, Transport, TransportRequest};
use crate::utils::logging::LoggingHelper;
use crate::utils::wire::null_default;

/// Verdict for one token, computed fresh on every call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntrospectionResult {
    pub active: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub aud: Vec<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub obfuscated_subject: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Extra claims set by the consent session
    #[serde(default, deserialize_with = "null_default")]
    pub ext: BTreeMap<String, Value>,
}

impl IntrospectionResult {
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    #[must_use]
    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.nbf.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    /// Granted scopes as individual values
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or("").split_whitespace()
    }

    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().any(|s| s == scope)
    }
}

/// Claims returned by the user info endpoint; only `sub` is guaranteed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(flatten)]
    pub claims: BTreeMap<String, Value>,
}

/// `POST {url}` with form fields `token` and `scope`
///
/// Both fields are always sent; an empty `scope` asks for no scope check.
///
/// # Errors
///
/// Returns a protocol error for non-200 answers (an inactive token is not
/// one), and any transport or decode failure.
pub async fn introspect_token(
    transport: &dyn Transport,
    url: &str,
    token: &str,
    scope: &str,
    options: &CallOptions,
) -> Result<IntrospectionResult> {
    let form = vec![
        ("token".to_string(), token.to_string()),
        ("scope".to_string(), scope.to_string()),
    ];
    let request =
        TransportRequest::new(Method::Post, url, options).body(RequestBody::Form(form));
    let raw = transport.send(request).await?;
    let result: IntrospectionResult = decode_json(&raw, SUCCESS_OK)?;
    LoggingHelper::log_introspection(token, result.active);
    Ok(result)
}

/// `GET {url}` with bearer credentials
///
/// # Errors
///
/// Returns a protocol error for non-200 answers, and any transport or decode
/// failure.
pub async fn get_user_info(
    transport: &dyn Transport,
    url: &str,
    options: &CallOptions,
) -> Result<UserInfo> {
    let request = TransportRequest::new(Method::Get, url, options);
    let raw = transport.send(request).await?;
    decode_json(&raw, SUCCESS_OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::ScriptedTransport;
    use serde_json::json;

    #[tokio::test]
    async fn test_inactive_token_is_not_an_error() {
        let transport = ScriptedTransport::new();
        transport.push_json(200, &json!({"active": false}));

        let result = introspect_token(
            &transport,
            "http://hydra/oauth2/introspect",
            "revoked-token",
            "",
            &CallOptions::default(),
        )
        .await
        .unwrap();
        assert!(!result.active);
        assert!(result.aud.is_empty());

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::Post);
        assert_eq!(sent.body.form_value("token"), Some("revoked-token"));
        assert_eq!(sent.body.form_value("scope"), Some(""));
    }

    #[tokio::test]
    async fn test_active_token_fields() {
        let transport = ScriptedTransport::new();
        transport.push_json(
            200,
            &json!({
                "active": true,
                "aud": ["api"],
                "client_id": "spa",
                "exp": 1_700_000_000,
                "iat": 1_699_996_400,
                "iss": "https://hydra/",
                "nbf": 1_699_996_400,
                "obfuscated_subject": "",
                "scope": "openid offline",
                "sub": "alice",
                "token_type": "access_token",
                "username": "",
                "ext": {"tenant": "acme"}
            }),
        );

        let result = introspect_token(
            &transport,
            "http://hydra/oauth2/introspect",
            "token",
            "openid",
            &CallOptions::default(),
        )
        .await
        .unwrap();
        assert!(result.active);
        assert!(result.has_scope("offline"));
        assert!(!result.has_scope("email"));
        assert_eq!(result.expires_at().unwrap().timestamp(), 1_700_000_000);
        assert_eq!(result.ext["tenant"], "acme");
        assert_eq!(transport.requests()[0].body.form_value("scope"), Some("openid"));
    }

    #[test]
    fn test_user_info_keeps_extra_claims() {
        let info: UserInfo =
            serde_json::from_str(r#"{"sub":"alice","email":"alice@example.com"}"#).unwrap();
        assert_eq!(info.sub, "alice");
        assert_eq!(info.claims["email"], "alice@example.com");
    }
}
