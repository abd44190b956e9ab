//! Configured façade over every operation
//!
//! [`ConsentMediator`] is built once at startup and shared by cloning. It
//! holds the transport, the resolved endpoint URLs and the per-call defaults,
//! so request handlers only pass the challenge or client at hand.
//!
//! ```no_run
//! use consentrs::{ConsentMediator, LoginAcceptDecision, MediatorSettings};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let settings = MediatorSettings::load()?;
//! let mediator = ConsentMediator::from_settings(&settings)?;
//!
//! let login = mediator.get_login_request("challenge-from-query").await?;
//! let subject = login.subject().unwrap_or("alice").to_string();
//! let outcome = mediator
//!     .accept_login(&login.challenge, &LoginAcceptDecision::new(subject))
//!     .await?;
//! println!("redirect the browser to {}", outcome.redirect_to);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::challenge::{
    self, ConsentAcceptDecision, ConsentRequest, LoginAcceptDecision, LoginRequest,
    LogoutRequest, RedirectOutcome, RejectDecision,
};
use crate::clients::{self, ClientRegistration};
use crate::error::{Result, TransportError};
use crate::introspection::{self, IntrospectionResult, UserInfo};
use crate::sessions::{self, SessionRevocation};
use crate::settings::{Endpoints, MediatorSettings};
use crate::transport::{CallOptions, HttpTransport, Transport};
use crate::utils::logging::LoggingHelper;

/// Per-call defaults applied by the mediator
#[derive(Debug, Clone)]
pub struct MediatorDefaults {
    /// Send bearer credentials on login/consent/logout calls
    pub authenticate_challenges: bool,
    /// Send bearer credentials on client, session and user info calls
    pub authenticate_admin: bool,
    /// Send bearer credentials on token introspection
    pub authenticate_introspection: bool,
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

impl Default for MediatorDefaults {
    fn default() -> Self {
        Self {
            authenticate_challenges: true,
            authenticate_admin: true,
            authenticate_introspection: true,
            timeout: None,
            cancellation: None,
        }
    }
}

/// Mediator between the relying application and the Authorization Server
#[derive(Debug, Clone)]
pub struct ConsentMediator {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    defaults: MediatorDefaults,
}

impl ConsentMediator {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
            defaults: MediatorDefaults::default(),
        }
    }

    /// Build an HTTP-backed mediator from settings
    ///
    /// Without configured client credentials every call goes out
    /// unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_settings(settings: &MediatorSettings) -> std::result::Result<Self, TransportError> {
        let transport = HttpTransport::from_settings(settings)?;
        let has_credentials = transport.has_credentials();
        LoggingHelper::log_mediator_configured(
            &settings.authorization_server.admin_url,
            &settings.authorization_server.public_url,
            has_credentials,
        );

        let defaults = MediatorDefaults {
            authenticate_challenges: has_credentials && settings.http.authenticate_challenge_calls,
            authenticate_admin: has_credentials,
            authenticate_introspection: has_credentials
                && settings.http.authenticate_introspection,
            ..MediatorDefaults::default()
        };
        Ok(Self::new(Arc::new(transport), settings.endpoints()).with_defaults(defaults))
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: MediatorDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Clone whose calls carry `timeout` as their deadline
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let mut mediator = self.clone();
        mediator.defaults.timeout = Some(timeout);
        mediator
    }

    /// Clone whose calls abort when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        let mut mediator = self.clone();
        mediator.defaults.cancellation = Some(token);
        mediator
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    #[must_use]
    pub fn defaults(&self) -> &MediatorDefaults {
        &self.defaults
    }

    fn options(&self, authenticated: bool) -> CallOptions {
        CallOptions {
            authenticated,
            timeout: self.defaults.timeout,
            cancellation: self.defaults.cancellation.clone(),
        }
    }

    fn challenge_options(&self) -> CallOptions {
        self.options(self.defaults.authenticate_challenges)
    }

    fn admin_options(&self) -> CallOptions {
        self.options(self.defaults.authenticate_admin)
    }

    // Login

    /// # Errors
    ///
    /// See [`challenge::fetch_challenge`].
    pub async fn get_login_request(&self, challenge: &str) -> Result<LoginRequest> {
        challenge::get_login_request(
            self.transport.as_ref(),
            &self.endpoints.login_request,
            challenge,
            &self.challenge_options(),
        )
        .await
    }

    /// # Errors
    ///
    /// See [`challenge::accept_challenge`].
    pub async fn accept_login(
        &self,
        challenge: &str,
        decision: &LoginAcceptDecision,
    ) -> Result<RedirectOutcome> {
        challenge::accept_login(
            self.transport.as_ref(),
            &self.endpoints.login_accept,
            challenge,
            decision,
            &self.challenge_options(),
        )
        .await
    }

    /// # Errors
    ///
    /// See [`challenge::accept_challenge`].
    pub async fn reject_login(
        &self,
        challenge: &str,
        decision: &RejectDecision,
    ) -> Result<RedirectOutcome> {
        challenge::reject_login(
            self.transport.as_ref(),
            &self.endpoints.login_reject,
            challenge,
            decision,
            &self.challenge_options(),
        )
        .await
    }

    // Consent

    /// # Errors
    ///
    /// See [`challenge::fetch_challenge`].
    pub async fn get_consent_request(&self, challenge: &str) -> Result<ConsentRequest> {
        challenge::get_consent_request(
            self.transport.as_ref(),
            &self.endpoints.consent_request,
            challenge,
            &self.challenge_options(),
        )
        .await
    }

    /// # Errors
    ///
    /// See [`challenge::accept_challenge`].
    pub async fn accept_consent(
        &self,
        challenge: &str,
        decision: &ConsentAcceptDecision,
    ) -> Result<RedirectOutcome> {
        challenge::accept_consent(
            self.transport.as_ref(),
            &self.endpoints.consent_accept,
            challenge,
            decision,
            &self.challenge_options(),
        )
        .await
    }

    /// # Errors
    ///
    /// See [`challenge::accept_challenge`].
    pub async fn reject_consent(
        &self,
        challenge: &str,
        decision: &RejectDecision,
    ) -> Result<RedirectOutcome> {
        challenge::reject_consent(
            self.transport.as_ref(),
            &self.endpoints.consent_reject,
            challenge,
            decision,
            &self.challenge_options(),
        )
        .await
    }

    // Logout

    /// # Errors
    ///
    /// See [`challenge::fetch_challenge`].
    pub async fn get_logout_request(&self, challenge: &str) -> Result<LogoutRequest> {
        challenge::get_logout_request(
            self.transport.as_ref(),
            &self.endpoints.logout_request,
            challenge,
            &self.challenge_options(),
        )
        .await
    }

    /// # Errors
    ///
    /// See [`challenge::accept_challenge`].
    pub async fn accept_logout(&self, challenge: &str) -> Result<RedirectOutcome> {
        challenge::accept_logout(
            self.transport.as_ref(),
            &self.endpoints.logout_accept,
            challenge,
            &self.challenge_options(),
        )
        .await
    }

    // Clients

    /// # Errors
    ///
    /// See [`clients::create_client`].
    pub async fn create_client(&self, registration: &ClientRegistration) -> Result<ClientRegistration> {
        clients::create_client(
            self.transport.as_ref(),
            &self.endpoints.clients,
            registration,
            &self.admin_options(),
        )
        .await
    }

    /// # Errors
    ///
    /// See [`clients::get_client`].
    pub async fn get_client(&self, client_id: &str) -> Result<ClientRegistration> {
        clients::get_client(
            self.transport.as_ref(),
            &self.endpoints.clients,
            client_id,
            &self.admin_options(),
        )
        .await
    }

    /// Full replace of the registration stored under `client_id`
    ///
    /// # Errors
    ///
    /// See [`clients::update_client`].
    pub async fn update_client(
        &self,
        client_id: &str,
        registration: &ClientRegistration,
    ) -> Result<ClientRegistration> {
        clients::update_client(
            self.transport.as_ref(),
            &self.endpoints.clients,
            client_id,
            registration,
            &self.admin_options(),
        )
        .await
    }

    /// # Errors
    ///
    /// See [`clients::delete_client`].
    pub async fn delete_client(&self, client_id: &str) -> Result<()> {
        clients::delete_client(
            self.transport.as_ref(),
            &self.endpoints.clients,
            client_id,
            &self.admin_options(),
        )
        .await
    }

    // Tokens and sessions

    /// # Errors
    ///
    /// See [`introspection::introspect_token`].
    pub async fn introspect_token(&self, token: &str, scope: &str) -> Result<IntrospectionResult> {
        introspection::introspect_token(
            self.transport.as_ref(),
            &self.endpoints.introspect,
            token,
            scope,
            &self.options(self.defaults.authenticate_introspection),
        )
        .await
    }

    /// # Errors
    ///
    /// See [`introspection::get_user_info`].
    pub async fn get_user_info(&self) -> Result<UserInfo> {
        introspection::get_user_info(
            self.transport.as_ref(),
            &self.endpoints.userinfo,
            &self.admin_options(),
        )
        .await
    }

    /// # Errors
    ///
    /// See [`sessions::delete_login_sessions`].
    pub async fn delete_login_sessions(&self, subject: &str) -> Result<SessionRevocation> {
        sessions::delete_login_sessions(
            self.transport.as_ref(),
            &self.endpoints.login_sessions,
            subject,
            &self.admin_options(),
        )
        .await
    }
}
