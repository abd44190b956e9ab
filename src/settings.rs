use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::transport::ClientCredentials;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MediatorSettings {
    pub authorization_server: AuthorizationServerSettings,
    pub endpoints: EndpointSettings,
    pub credentials: CredentialsSettings,
    pub http: HttpSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationServerSettings {
    /// Base URL of the administrative API (challenges, clients, introspection)
    pub admin_url: String,
    /// Base URL of the public API (user info)
    pub public_url: String,
}

/// Optional per-endpoint overrides; unset entries derive from the base URLs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub login_request_url: Option<String>,
    pub login_accept_url: Option<String>,
    pub login_reject_url: Option<String>,
    pub consent_request_url: Option<String>,
    pub consent_accept_url: Option<String>,
    pub consent_reject_url: Option<String>,
    pub logout_request_url: Option<String>,
    pub logout_accept_url: Option<String>,
    pub clients_url: Option<String>,
    pub introspect_url: Option<String>,
    pub userinfo_url: Option<String>,
    pub login_sessions_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsSettings {
    // Direct values (can be overridden by environment variables)
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    // Environment variable names for overrides
    pub client_id_env: Option<String>,
    pub client_secret_env: Option<String>,

    /// Token endpoint for the client-credentials grant. Discovery is not
    /// performed; this must be configured for authenticated calls.
    pub token_url: Option<String>,
    pub scopes: Vec<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_seconds: u64,
    /// Attach bearer credentials to login/consent/logout calls too. Some
    /// deployments expose those endpoints without authentication.
    pub authenticate_challenge_calls: bool,
    /// Attach bearer credentials to token introspection
    pub authenticate_introspection: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

/// Fully resolved endpoint URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login_request: String,
    pub login_accept: String,
    pub login_reject: String,
    pub consent_request: String,
    pub consent_accept: String,
    pub consent_reject: String,
    pub logout_request: String,
    pub logout_accept: String,
    pub clients: String,
    pub introspect: String,
    pub userinfo: String,
    pub login_sessions: String,
}

impl Default for AuthorizationServerSettings {
    fn default() -> Self {
        Self {
            admin_url: "http://localhost:4445".to_string(),
            public_url: "http://localhost:4444".to_string(),
        }
    }
}

impl Default for CredentialsSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            client_id_env: None,
            client_secret_env: None,
            token_url: None,
            scopes: vec!["openid".to_string()],
            audience: Some("hydra".to_string()),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            authenticate_challenge_calls: true,
            authenticate_introspection: true,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl MediatorSettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a settings file exists but cannot be read or
    /// parsed.
    pub fn load() -> Result<Self> {
        load_env_file(Path::new(".env"));

        let mut settings = Self::load_base_settings()?;
        Self::apply_env_overrides(&mut settings);
        settings.init_logging();

        Ok(settings)
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `CONSENTRS_CONFIG_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    fn load_base_settings() -> Result<Self> {
        let mut settings = Self::default();

        let default_config_path = Path::new("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_file(default_config_path)?;
        }

        if let Ok(config_dir) = std::env::var("CONSENTRS_CONFIG_DIR") {
            let config_path = Path::new(&config_dir).join("Settings.toml");
            if config_path.exists() {
                settings = Self::from_file(&config_path)?;
            }
        }

        Ok(settings)
    }

    /// Parse one TOML settings file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        basic_toml::from_str(&content)
            .with_context(|| format!("failed to parse settings from {}", path.display()))
    }

    /// Initialize `env_logger` at the configured level; a logger installed
    /// earlier is left in place
    pub fn init_logging(&self) {
        let env = env_logger::Env::default().default_filter_or(self.logging.level.as_str());
        if env_logger::Builder::from_env(env).try_init().is_err() {
            log::debug!("Logger already initialized, keeping existing configuration");
        }
    }

    /// Apply environment variable overrides to settings
    pub fn apply_env_overrides(settings: &mut Self) {
        Self::apply_server_env_overrides(&mut settings.authorization_server);
        Self::apply_credentials_env_overrides(&mut settings.credentials);
        Self::apply_http_env_overrides(&mut settings.http);
        if let Ok(level) = std::env::var("RUST_LOG") {
            settings.logging.level = level;
        }
    }

    fn apply_server_env_overrides(server: &mut AuthorizationServerSettings) {
        if let Ok(admin_url) = std::env::var("HYDRA_ADMIN_URL") {
            server.admin_url = admin_url;
        }
        if let Ok(public_url) = std::env::var("HYDRA_PUBLIC_URL") {
            server.public_url = public_url;
        }
    }

    fn apply_credentials_env_overrides(credentials: &mut CredentialsSettings) {
        if let Ok(client_id) = std::env::var("CLIENT_ID") {
            credentials.client_id = Some(client_id);
        }
        if let Ok(client_secret) = std::env::var("CLIENT_SECRET") {
            credentials.client_secret = Some(client_secret);
        }
        if let Ok(token_url) = std::env::var("TOKEN_URL") {
            credentials.token_url = Some(token_url);
        }
    }

    fn apply_http_env_overrides(http: &mut HttpSettings) {
        if let Ok(value) = std::env::var("HTTP_TIMEOUT_SECONDS") {
            if let Ok(timeout) = value.parse::<u64>() {
                http.timeout_seconds = timeout;
            }
        }
        if let Ok(value) = std::env::var("AUTHENTICATE_CHALLENGE_CALLS") {
            if let Ok(enabled) = value.parse::<bool>() {
                http.authenticate_challenge_calls = enabled;
            }
        }
    }

    /// Client credentials for the transport, if id, secret and token URL are
    /// all configured
    #[must_use]
    pub fn client_credentials(&self) -> Option<ClientCredentials> {
        Some(ClientCredentials {
            client_id: self.credentials.get_client_id()?,
            client_secret: self.credentials.get_client_secret()?,
            token_url: self.credentials.token_url.clone()?,
            scopes: self.credentials.scopes.clone(),
            audience: self.credentials.audience.clone(),
        })
    }

    /// Resolve every endpoint URL
    #[must_use]
    pub fn endpoints(&self) -> Endpoints {
        self.endpoints.resolve(&self.authorization_server)
    }
}

impl CredentialsSettings {
    /// Get the client ID, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_client_id(&self) -> Option<String> {
        if let Some(env_var) = &self.client_id_env {
            if let Ok(value) = std::env::var(env_var) {
                return Some(value);
            }
        }
        self.client_id.clone()
    }

    /// Get the client secret, checking environment variable first, then falling back to direct value
    #[must_use]
    pub fn get_client_secret(&self) -> Option<String> {
        if let Some(env_var) = &self.client_secret_env {
            if let Ok(value) = std::env::var(env_var) {
                return Some(value);
            }
        }
        self.client_secret.clone()
    }
}

impl EndpointSettings {
    #[must_use]
    pub fn resolve(&self, server: &AuthorizationServerSettings) -> Endpoints {
        let admin = server.admin_url.trim_end_matches('/');
        let public = server.public_url.trim_end_matches('/');
        let pick = |value: &Option<String>, default: String| value.clone().unwrap_or(default);

        Endpoints {
            login_request: pick(
                &self.login_request_url,
                format!("{admin}/oauth2/auth/requests/login"),
            ),
            login_accept: pick(
                &self.login_accept_url,
                format!("{admin}/oauth2/auth/requests/login/accept"),
            ),
            login_reject: pick(
                &self.login_reject_url,
                format!("{admin}/oauth2/auth/requests/login/reject"),
            ),
            consent_request: pick(
                &self.consent_request_url,
                format!("{admin}/oauth2/auth/requests/consent"),
            ),
            consent_accept: pick(
                &self.consent_accept_url,
                format!("{admin}/oauth2/auth/requests/consent/accept"),
            ),
            consent_reject: pick(
                &self.consent_reject_url,
                format!("{admin}/oauth2/auth/requests/consent/reject"),
            ),
            logout_request: pick(
                &self.logout_request_url,
                format!("{admin}/oauth2/auth/requests/logout"),
            ),
            logout_accept: pick(
                &self.logout_accept_url,
                format!("{admin}/oauth2/auth/requests/logout/accept"),
            ),
            clients: pick(&self.clients_url, format!("{admin}/clients")),
            introspect: pick(&self.introspect_url, format!("{admin}/oauth2/introspect")),
            userinfo: pick(&self.userinfo_url, format!("{public}/userinfo")),
            login_sessions: pick(
                &self.login_sessions_url,
                format!("{admin}/oauth2/auth/sessions/login"),
            ),
        }
    }
}

/// Load environment variables from a `.env` file, keeping values already set
fn load_env_file(path: &Path) {
    if let Ok(contents) = fs::read_to_string(path) {
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                if std::env::var_os(key.trim()).is_none() {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    // Helper function to clean all relevant environment variables for tests
    fn clean_env_vars() {
        for var in [
            "HYDRA_ADMIN_URL",
            "HYDRA_PUBLIC_URL",
            "CLIENT_ID",
            "CLIENT_SECRET",
            "TOKEN_URL",
            "HTTP_TIMEOUT_SECONDS",
            "AUTHENTICATE_CHALLENGE_CALLS",
            "CONSENTRS_TEST_SECRET",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_endpoints() {
        let endpoints = MediatorSettings::default().endpoints();
        assert_eq!(
            endpoints.login_request,
            "http://localhost:4445/oauth2/auth/requests/login"
        );
        assert_eq!(
            endpoints.consent_reject,
            "http://localhost:4445/oauth2/auth/requests/consent/reject"
        );
        assert_eq!(endpoints.clients, "http://localhost:4445/clients");
        assert_eq!(endpoints.userinfo, "http://localhost:4444/userinfo");
    }

    #[test]
    fn test_endpoint_override_and_trailing_slash() {
        let mut settings = MediatorSettings::default();
        settings.authorization_server.admin_url = "https://admin.example.com/".to_string();
        settings.endpoints.introspect_url = Some("https://edge.example.com/introspect".to_string());

        let endpoints = settings.endpoints();
        assert_eq!(
            endpoints.logout_accept,
            "https://admin.example.com/oauth2/auth/requests/logout/accept"
        );
        assert_eq!(endpoints.introspect, "https://edge.example.com/introspect");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Settings.toml");
        fs::write(
            &path,
            r#"
[authorization_server]
admin_url = "http://hydra:4445"

[credentials]
client_id = "consent-app"
token_url = "http://hydra:4444/oauth2/token"
"#,
        )
        .unwrap();

        let settings = MediatorSettings::from_file(&path).unwrap();
        assert_eq!(settings.authorization_server.admin_url, "http://hydra:4445");
        assert_eq!(settings.authorization_server.public_url, "http://localhost:4444");
        assert_eq!(settings.credentials.scopes, vec!["openid"]);
        assert_eq!(settings.http.timeout_seconds, 10);
        // No secret yet, so no credentials for the transport
        assert!(settings.client_credentials().is_none());
    }

    #[test]
    fn test_invalid_toml_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Settings.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let err = MediatorSettings::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Settings.toml"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clean_env_vars();
        std::env::set_var("HYDRA_ADMIN_URL", "http://hydra-admin:4445");
        std::env::set_var("CLIENT_ID", "env-client");
        std::env::set_var("CLIENT_SECRET", "env-secret");
        std::env::set_var("TOKEN_URL", "http://hydra:4444/oauth2/token");
        std::env::set_var("HTTP_TIMEOUT_SECONDS", "3");
        std::env::set_var("AUTHENTICATE_CHALLENGE_CALLS", "false");

        let mut settings = MediatorSettings::default();
        MediatorSettings::apply_env_overrides(&mut settings);

        assert_eq!(settings.authorization_server.admin_url, "http://hydra-admin:4445");
        assert_eq!(settings.http.timeout_seconds, 3);
        assert!(!settings.http.authenticate_challenge_calls);
        let credentials = settings.client_credentials().unwrap();
        assert_eq!(credentials.client_id, "env-client");
        assert_eq!(credentials.client_secret, "env-secret");
        assert_eq!(credentials.audience.as_deref(), Some("hydra"));

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_numeric_override_is_ignored() {
        clean_env_vars();
        std::env::set_var("HTTP_TIMEOUT_SECONDS", "soon");

        let mut settings = MediatorSettings::default();
        MediatorSettings::apply_env_overrides(&mut settings);
        assert_eq!(settings.http.timeout_seconds, 10);

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_secret_env_indirection() {
        clean_env_vars();
        let credentials = CredentialsSettings {
            client_secret: Some("file-secret".to_string()),
            client_secret_env: Some("CONSENTRS_TEST_SECRET".to_string()),
            ..CredentialsSettings::default()
        };
        assert_eq!(credentials.get_client_secret().as_deref(), Some("file-secret"));

        std::env::set_var("CONSENTRS_TEST_SECRET", "indirect-secret");
        assert_eq!(
            credentials.get_client_secret().as_deref(),
            Some("indirect-secret")
        );

        clean_env_vars();
    }

    #[test]
    #[serial]
    fn test_env_file_does_not_clobber_existing_vars() {
        clean_env_vars();
        std::env::set_var("CLIENT_ID", "already-set");
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "# comment\nCLIENT_ID=from-file\nCLIENT_SECRET = file-secret\n").unwrap();

        load_env_file(&path);
        assert_eq!(std::env::var("CLIENT_ID").unwrap(), "already-set");
        assert_eq!(std::env::var("CLIENT_SECRET").unwrap(), "file-secret");

        clean_env_vars();
    }
}
