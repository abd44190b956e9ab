//! Test fixtures providing pre-built test objects

use serde_json::{json, Value};

use crate::clients::ClientRegistration;
use crate::settings::MediatorSettings;
use crate::transport::ClientCredentials;

use super::constants::{
    FAKE_ADMIN_URL, FAKE_PUBLIC_URL, TEST_CLIENT_ID, TEST_CLIENT_SECRET, TEST_REDIRECT_URI,
    TEST_SCOPES, TEST_SUBJECT,
};

/// Central fixture provider for all test data
pub struct TestFixtures;

impl TestFixtures {
    /// Authorization-code client as a relying party would register it
    #[must_use]
    pub fn client_registration() -> ClientRegistration {
        ClientRegistration {
            client_id: Some(TEST_CLIENT_ID.to_string()),
            client_name: "Test Application".to_string(),
            client_secret: Some(TEST_CLIENT_SECRET.to_string()),
            scope: TEST_SCOPES.join(" "),
            grant_types: vec!["authorization_code".to_string(), "refresh_token".to_string()],
            response_types: vec!["code".to_string(), "id_token".to_string()],
            redirect_uris: vec![TEST_REDIRECT_URI.to_string()],
            token_endpoint_auth_method: Some("client_secret_basic".to_string()),
            ..ClientRegistration::default()
        }
    }

    /// Login request as the server sends it for a fresh browser
    #[must_use]
    pub fn login_request_json(challenge: &str) -> Value {
        json!({
            "challenge": challenge,
            "skip": false,
            "subject": "",
            "client": {"client_id": TEST_CLIENT_ID, "client_name": "Test Application"},
            "request_url": format!("{FAKE_PUBLIC_URL}/oauth2/auth?client_id={TEST_CLIENT_ID}"),
            "requested_scope": TEST_SCOPES,
            "requested_access_token_audience": null,
            "session_id": "session-1",
            "context": null
        })
    }

    /// Consent request, optionally for a subject who consented before
    #[must_use]
    pub fn consent_request_json(challenge: &str, skip: bool) -> Value {
        json!({
            "challenge": challenge,
            "skip": skip,
            "subject": TEST_SUBJECT,
            "client": {"client_id": TEST_CLIENT_ID},
            "requested_scope": TEST_SCOPES,
            "requested_access_token_audience": ["https://api.example.com"],
        })
    }

    /// Settings pointing at the fake server with full client credentials
    #[must_use]
    pub fn settings() -> MediatorSettings {
        let mut settings = MediatorSettings::default();
        settings.authorization_server.admin_url = FAKE_ADMIN_URL.to_string();
        settings.authorization_server.public_url = FAKE_PUBLIC_URL.to_string();
        settings.credentials.client_id = Some("consent-app".to_string());
        settings.credentials.client_secret = Some("consent-app-secret".to_string());
        settings.credentials.token_url = Some(format!("{FAKE_PUBLIC_URL}/oauth2/token"));
        settings
    }

    /// Client credentials for a token endpoint at `token_url`
    #[must_use]
    pub fn client_credentials(token_url: &str) -> ClientCredentials {
        ClientCredentials {
            client_id: "consent-app".to_string(),
            client_secret: "consent-app-secret".to_string(),
            token_url: token_url.to_string(),
            scopes: vec!["hydra.clients".to_string(), "hydra.consent".to_string()],
            audience: Some("hydra".to_string()),
        }
    }
}
