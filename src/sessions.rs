//! Remembered login sessions

use serde::{Deserialize, Serialize};

use crate::decode::{decode_optional, SUCCESS_NO_CONTENT};
use crate::error::Result;
use crate::transport::{CallOptions, Method, Transport, TransportRequest};
use crate::utils::logging::LoggingHelper;

/// Body the server may send back when revoking sessions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRevocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// `DELETE {url}?subject=...`: sign the subject out everywhere
///
/// Revokes every remembered login session of `subject`, so the next login
/// challenge for it will not be skippable.
///
/// # Errors
///
/// Returns a protocol error for failure statuses, and any transport or
/// decode failure.
pub async fn delete_login_sessions(
    transport: &dyn Transport,
    url: &str,
    subject: &str,
    options: &CallOptions,
) -> Result<SessionRevocation> {
    let request = TransportRequest::new(Method::Delete, url, options).query("subject", subject);
    let raw = transport.send(request).await?;
    let outcome = decode_optional(&raw, SUCCESS_NO_CONTENT)?;
    LoggingHelper::log_sessions_revoked(subject);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::ScriptedTransport;
    use crate::transport::RawResponse;

    #[tokio::test]
    async fn test_no_content_is_success() {
        let transport = ScriptedTransport::new();
        transport.push(RawResponse::new(204, ""));

        let outcome = delete_login_sessions(
            &transport,
            "http://hydra/oauth2/auth/sessions/login",
            "alice",
            &CallOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, SessionRevocation::default());

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, Method::Delete);
        assert_eq!(sent.query_value("subject"), Some("alice"));
    }

    #[tokio::test]
    async fn test_unknown_subject_is_not_found() {
        let transport = ScriptedTransport::new();
        transport.push(RawResponse::new(
            404,
            r#"{"error":"Not Found","status_code":404}"#,
        ));

        let err = delete_login_sessions(
            &transport,
            "http://hydra/oauth2/auth/sessions/login",
            "nobody",
            &CallOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
