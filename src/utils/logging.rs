// Centralized logging for the mediator. Challenges, tokens and secrets are
// credentials: only their lengths are ever logged.
use log::{debug, info, warn};

use crate::error::{ProtocolError, ProtocolErrorKind};
use crate::transport::Method;

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log a client-credentials grant request
    pub fn log_token_request(token_url: &str, client_id: &str) {
        debug!("🔄 Requesting client-credentials token from {token_url} for client {client_id}");
    }

    /// Log a freshly cached access token
    pub fn log_token_refreshed(token_len: usize, lifetime_seconds: i64) {
        info!("🔑 Obtained access token (length: {token_len}), valid for {lifetime_seconds}s");
    }

    /// Log an outgoing request
    pub fn log_request_sent(method: Method, url: &str) {
        debug!("➡️  {method} {url}");
    }

    /// Log the status of a received answer
    pub fn log_response_received(method: Method, url: &str, status: u16, body_len: usize) {
        debug!("⬅️  {method} {url} -> {status} ({body_len} bytes)");
    }

    /// Log a request aborted by its cancellation token
    pub fn log_request_cancelled(url: &str) {
        warn!("⏹️  Request to {url} cancelled by caller");
    }

    /// Log a classified failure status
    pub fn log_protocol_error(error: &ProtocolError) {
        match error.kind {
            ProtocolErrorKind::ServerError | ProtocolErrorKind::Unhandled => {
                warn!("❌ Authorization server answered {}: {}", error.status, error.kind);
            }
            _ => debug!("Authorization server answered {}: {}", error.status, error.kind),
        }
    }

    /// Log a challenge fetch
    pub fn log_challenge_fetch(flow: &str, challenge: &str) {
        debug!("🔍 Fetching {flow} request (challenge length: {})", challenge.len());
    }

    /// Log a resolved challenge; the redirect's query carries the verifier
    pub fn log_challenge_resolved(flow: &str, redirect_to: &str) {
        info!(
            "✅ Resolved {flow} challenge, redirecting to {}",
            Self::redirect_target(redirect_to)
        );
    }

    /// Log a client registry change
    pub fn log_client_change(action: &str, client_id: &str) {
        info!("📝 OAuth2 client {client_id} {action}");
    }

    /// Log an introspection verdict
    pub fn log_introspection(token: &str, active: bool) {
        debug!("🔍 Introspected token (length: {}): active={active}", token.len());
    }

    /// Log revocation of remembered login sessions
    pub fn log_sessions_revoked(subject: &str) {
        info!("🚪 Revoked login sessions for subject {subject}");
    }

    /// Log the endpoints in use once settings are resolved
    pub fn log_mediator_configured(admin_url: &str, public_url: &str, has_credentials: bool) {
        info!("🔧 Consent mediator using admin API {admin_url}, public API {public_url}");
        if has_credentials {
            info!("✅ Client credentials configured");
        } else {
            info!("❌ Client credentials not configured - calls go out unauthenticated");
        }
    }

    /// Origin and path of a redirect URL, without query or fragment
    fn redirect_target(redirect_to: &str) -> String {
        match url::Url::parse(redirect_to) {
            Ok(url) => format!("{}{}", url.origin().ascii_serialization(), url.path()),
            Err(_) => format!("<unparseable url, length {}>", redirect_to.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_target_drops_verifier() {
        let target = LoggingHelper::redirect_target(
            "https://hydra.example.com/oauth2/auth?client_id=spa&login_verifier=secret-v",
        );
        assert_eq!(target, "https://hydra.example.com/oauth2/auth");
    }

    #[test]
    fn test_redirect_target_hides_unparseable_input() {
        let target = LoggingHelper::redirect_target("not a url?login_verifier=secret-v");
        assert!(!target.contains("secret-v"));
    }
}
