//! In-memory Authorization Server
//!
//! [`FakeAuthorizationServer`] implements [`Transport`] and answers the admin
//! API the way the real server does, keeping just enough state to exercise
//! whole flows:
//!
//! - challenges are issued by the test and resolve exactly once; any later
//!   fetch or resolution is a `404`
//! - accepting a login with `remember` makes later login challenges for that
//!   subject skippable, and the same goes for consent per subject and client
//! - accepting a consent mints an access token that introspection reports
//!   as active until it is revoked
//! - client updates replace the whole registration
//!
//! Routing only looks at the URL path, so any base URL works.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::challenge::{
    ConsentAcceptDecision, ConsentRequest, LoginAcceptDecision, LoginRequest, LogoutRequest,
    RejectDecision,
};
use crate::clients::ClientRegistration;
use crate::error::TransportError;
use crate::introspection::{IntrospectionResult, UserInfo};
use crate::mediator::ConsentMediator;
use crate::settings::{AuthorizationServerSettings, EndpointSettings, Endpoints};
use crate::transport::{Method, RawResponse, RequestBody, Transport, TransportRequest};

use super::constants::{FAKE_ADMIN_URL, FAKE_PUBLIC_URL};

const LOGIN_PATH: &str = "/oauth2/auth/requests/login";
const CONSENT_PATH: &str = "/oauth2/auth/requests/consent";
const LOGOUT_PATH: &str = "/oauth2/auth/requests/logout";
const CLIENTS_PATH: &str = "/clients";
const INTROSPECT_PATH: &str = "/oauth2/introspect";
const USERINFO_PATH: &str = "/userinfo";
const LOGIN_SESSIONS_PATH: &str = "/oauth2/auth/sessions/login";

#[derive(Debug, Default)]
struct ServerState {
    login: HashMap<String, LoginRequest>,
    consent: HashMap<String, ConsentRequest>,
    logout: HashMap<String, LogoutRequest>,
    clients: BTreeMap<String, ClientRegistration>,
    remembered_logins: HashSet<String>,
    // (subject, client_id) -> granted scopes
    remembered_consents: HashMap<(String, String), Vec<String>>,
    tokens: HashMap<String, IntrospectionResult>,
    consent_tokens: HashMap<String, String>,
    user_info: Option<UserInfo>,
    requests: Vec<TransportRequest>,
}

#[derive(Debug, Default)]
pub struct FakeAuthorizationServer {
    state: Mutex<ServerState>,
    next_id: AtomicU64,
}

impl FakeAuthorizationServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint URLs pointing at this server
    #[must_use]
    pub fn endpoints() -> Endpoints {
        EndpointSettings::default().resolve(&AuthorizationServerSettings {
            admin_url: FAKE_ADMIN_URL.to_string(),
            public_url: FAKE_PUBLIC_URL.to_string(),
        })
    }

    /// Mediator wired to this server
    #[must_use]
    pub fn mediator(self: &Arc<Self>) -> ConsentMediator {
        let transport: Arc<dyn Transport> = self.clone();
        ConsentMediator::new(transport, Self::endpoints())
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Start a login for `client_id` from a fresh browser
    pub fn issue_login_challenge(&self, client_id: &str, requested_scope: &[&str]) -> String {
        self.issue_login(client_id, requested_scope, None)
    }

    /// Start a login from a browser that already carries a session for
    /// `subject`; skippable if that subject asked to be remembered
    pub fn issue_login_challenge_with_session(
        &self,
        client_id: &str,
        requested_scope: &[&str],
        subject: &str,
    ) -> String {
        self.issue_login(client_id, requested_scope, Some(subject))
    }

    fn issue_login(
        &self,
        client_id: &str,
        requested_scope: &[&str],
        subject: Option<&str>,
    ) -> String {
        let challenge = self.next_id("login-challenge");
        let mut state = self.state();
        let skip = subject.is_some_and(|s| state.remembered_logins.contains(s));
        let request = LoginRequest {
            challenge: challenge.clone(),
            skip,
            subject: if skip { subject.unwrap_or_default().to_string() } else { String::new() },
            client: Some(Self::public_view(&state, client_id)),
            request_url: Some(format!(
                "{FAKE_PUBLIC_URL}/oauth2/auth?client_id={client_id}&response_type=code"
            )),
            requested_scope: requested_scope.iter().map(ToString::to_string).collect(),
            session_id: Some(self.next_id("session")),
            ..LoginRequest::default()
        };
        state.login.insert(challenge.clone(), request);
        challenge
    }

    /// Start a consent for `subject` and `client_id`; skippable if a
    /// remembered consent already covers every requested scope
    pub fn issue_consent_challenge(
        &self,
        client_id: &str,
        subject: &str,
        requested_scope: &[&str],
    ) -> String {
        let challenge = self.next_id("consent-challenge");
        let mut state = self.state();
        let skip = state
            .remembered_consents
            .get(&(subject.to_string(), client_id.to_string()))
            .is_some_and(|granted| {
                requested_scope
                    .iter()
                    .all(|s| granted.iter().any(|g| g.as_str() == *s))
            });
        let request = ConsentRequest {
            challenge: challenge.clone(),
            subject: subject.to_string(),
            skip,
            request_url: Some(format!("{FAKE_PUBLIC_URL}/oauth2/auth?client_id={client_id}")),
            requested_scope: requested_scope.iter().map(ToString::to_string).collect(),
            client: Some(Self::public_view(&state, client_id)),
            ..ConsentRequest::default()
        };
        state.consent.insert(challenge.clone(), request);
        challenge
    }

    /// Start a logout for `subject`
    pub fn issue_logout_challenge(&self, subject: &str, rp_initiated: bool) -> String {
        let challenge = self.next_id("logout-challenge");
        let request = LogoutRequest {
            request_url: format!("{FAKE_PUBLIC_URL}/oauth2/sessions/logout"),
            rp_initiated,
            sid: self.next_id("sid"),
            subject: subject.to_string(),
        };
        self.state().logout.insert(challenge.clone(), request);
        challenge
    }

    /// Register a client directly, bypassing the API
    pub fn register_client(&self, registration: ClientRegistration) -> String {
        let client_id = registration
            .client_id
            .clone()
            .unwrap_or_else(|| self.next_id("client"));
        let stored = ClientRegistration {
            client_id: Some(client_id.clone()),
            ..registration
        };
        self.state().clients.insert(client_id.clone(), stored);
        client_id
    }

    /// Access token minted when `consent_challenge` was accepted
    #[must_use]
    pub fn token_for_consent(&self, consent_challenge: &str) -> Option<String> {
        self.state().consent_tokens.get(consent_challenge).cloned()
    }

    /// Mark an issued token inactive
    pub fn revoke_token(&self, token: &str) {
        self.state().tokens.remove(token);
    }

    /// Claims served by the user info endpoint
    pub fn set_user_info(&self, user_info: UserInfo) {
        self.state().user_info = Some(user_info);
    }

    #[must_use]
    pub fn has_login_session(&self, subject: &str) -> bool {
        self.state().remembered_logins.contains(subject)
    }

    /// Requests received so far, oldest first
    #[must_use]
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.state().requests.clone()
    }

    // Registration as embedded in challenge requests: never carries the secret
    fn public_view(state: &ServerState, client_id: &str) -> ClientRegistration {
        state.clients.get(client_id).map_or_else(
            || ClientRegistration {
                client_id: Some(client_id.to_string()),
                ..ClientRegistration::default()
            },
            |registration| ClientRegistration {
                client_secret: None,
                ..registration.clone()
            },
        )
    }

    fn route(&self, request: &TransportRequest) -> RawResponse {
        let path = match url::Url::parse(&request.url) {
            Ok(url) => url.path().trim_end_matches('/').to_string(),
            Err(_) => return error_response(400, "invalid_request", "unparseable URL"),
        };
        let challenge = |param: &str| request.query_value(param).unwrap_or_default().to_string();

        match (request.method, path.as_str()) {
            (Method::Get, LOGIN_PATH) => self.get_login(&challenge("login_challenge")),
            (Method::Put, p) if p == format!("{LOGIN_PATH}/accept") => {
                self.accept_login(&challenge("login_challenge"), &request.body)
            }
            (Method::Put, p) if p == format!("{LOGIN_PATH}/reject") => {
                self.reject_login(&challenge("login_challenge"), &request.body)
            }
            (Method::Get, CONSENT_PATH) => self.get_consent(&challenge("consent_challenge")),
            (Method::Put, p) if p == format!("{CONSENT_PATH}/accept") => {
                self.accept_consent(&challenge("consent_challenge"), &request.body)
            }
            (Method::Put, p) if p == format!("{CONSENT_PATH}/reject") => {
                self.reject_consent(&challenge("consent_challenge"), &request.body)
            }
            (Method::Get, LOGOUT_PATH) => self.get_logout(&challenge("logout_challenge")),
            (Method::Put, p) if p == format!("{LOGOUT_PATH}/accept") => {
                self.accept_logout(&challenge("logout_challenge"))
            }
            (Method::Post, CLIENTS_PATH) => self.create_client(&request.body),
            (method, p) if p.starts_with("/clients/") => {
                let Ok(client_id) = urlencoding::decode(&p[CLIENTS_PATH.len() + 1..]) else {
                    return error_response(400, "invalid_request", "client id is not UTF-8");
                };
                match method {
                    Method::Get => self.get_client(&client_id),
                    Method::Put => self.update_client(&client_id, &request.body),
                    Method::Delete => self.delete_client(&client_id),
                    Method::Post => error_response(405, "method_not_allowed", "POST on a client"),
                }
            }
            (Method::Post, INTROSPECT_PATH) => self.introspect(&request.body),
            (Method::Get, USERINFO_PATH) => self.user_info(),
            (Method::Delete, LOGIN_SESSIONS_PATH) => {
                self.delete_login_sessions(request.query_value("subject").unwrap_or_default())
            }
            _ => error_response(404, "not_found", "unknown route"),
        }
    }

    fn get_login(&self, challenge: &str) -> RawResponse {
        match self.state().login.get(challenge) {
            Some(request) => json_response(200, request),
            None => unknown_challenge(),
        }
    }

    fn accept_login(&self, challenge: &str, body: &RequestBody) -> RawResponse {
        let decision: LoginAcceptDecision = match parse_body(body) {
            Ok(decision) => decision,
            Err(response) => return response,
        };
        if decision.subject.is_empty() {
            return error_response(400, "invalid_request", "subject must not be empty");
        }
        let mut state = self.state();
        let Some(request) = state.login.remove(challenge) else {
            return unknown_challenge();
        };
        if decision.remember {
            state.remembered_logins.insert(decision.subject.clone());
        }
        let client_id = request.client_id().unwrap_or_default().to_string();
        drop(state);
        redirect(&format!(
            "{FAKE_PUBLIC_URL}/oauth2/auth?client_id={client_id}&login_verifier={}",
            self.next_id("verifier")
        ))
    }

    fn reject_login(&self, challenge: &str, body: &RequestBody) -> RawResponse {
        let decision: RejectDecision = match parse_body(body) {
            Ok(decision) => decision,
            Err(response) => return response,
        };
        let Some(request) = self.state().login.remove(challenge) else {
            return unknown_challenge();
        };
        rejection_redirect(request.client.as_ref(), &decision)
    }

    fn get_consent(&self, challenge: &str) -> RawResponse {
        match self.state().consent.get(challenge) {
            Some(request) => json_response(200, request),
            None => unknown_challenge(),
        }
    }

    fn accept_consent(&self, challenge: &str, body: &RequestBody) -> RawResponse {
        let decision: ConsentAcceptDecision = match parse_body(body) {
            Ok(decision) => decision,
            Err(response) => return response,
        };
        let token = self.next_id("access-token");
        let mut state = self.state();
        let Some(request) = state.consent.remove(challenge) else {
            return unknown_challenge();
        };
        let client_id = request.client_id().unwrap_or_default().to_string();
        let subject = decision.subject.clone().unwrap_or_else(|| request.subject.clone());

        if decision.remember {
            state.remembered_consents.insert(
                (subject.clone(), client_id.clone()),
                decision.grant_scope.clone(),
            );
        }
        let now = chrono::Utc::now().timestamp();
        state.tokens.insert(
            token.clone(),
            IntrospectionResult {
                active: true,
                aud: decision.grant_access_token_audience.clone(),
                client_id: Some(client_id.clone()),
                exp: Some(now + 3600),
                iat: Some(now),
                iss: Some(format!("{FAKE_PUBLIC_URL}/")),
                nbf: Some(now),
                scope: Some(decision.grant_scope.join(" ")),
                sub: Some(subject),
                token_type: Some("access_token".to_string()),
                ext: decision.session.access_token.clone(),
                ..IntrospectionResult::default()
            },
        );
        state.consent_tokens.insert(challenge.to_string(), token);
        drop(state);

        redirect(&format!(
            "{FAKE_PUBLIC_URL}/oauth2/auth?client_id={client_id}&consent_verifier={}",
            self.next_id("verifier")
        ))
    }

    fn reject_consent(&self, challenge: &str, body: &RequestBody) -> RawResponse {
        let decision: RejectDecision = match parse_body(body) {
            Ok(decision) => decision,
            Err(response) => return response,
        };
        let Some(request) = self.state().consent.remove(challenge) else {
            return unknown_challenge();
        };
        rejection_redirect(request.client.as_ref(), &decision)
    }

    fn get_logout(&self, challenge: &str) -> RawResponse {
        match self.state().logout.get(challenge) {
            Some(request) => json_response(200, request),
            None => unknown_challenge(),
        }
    }

    fn accept_logout(&self, challenge: &str) -> RawResponse {
        let mut state = self.state();
        let Some(request) = state.logout.remove(challenge) else {
            return unknown_challenge();
        };
        state.remembered_logins.remove(&request.subject);
        drop(state);
        redirect(&format!(
            "{FAKE_PUBLIC_URL}/oauth2/sessions/logout?logout_verifier={}",
            self.next_id("verifier")
        ))
    }

    fn create_client(&self, body: &RequestBody) -> RawResponse {
        let registration: ClientRegistration = match parse_body(body) {
            Ok(registration) => registration,
            Err(response) => return response,
        };
        if let Some(invalid) = registration
            .redirect_uris
            .iter()
            .find(|uri| url::Url::parse(uri).is_err())
        {
            return error_response(
                400,
                "invalid_redirect_uri",
                &format!("redirect_uri {invalid} is not a valid URL"),
            );
        }
        let client_id = registration
            .client_id
            .clone()
            .unwrap_or_else(|| self.next_id("client"));
        if self.state().clients.contains_key(&client_id) {
            return error_response(409, "conflict", "client already exists");
        }
        let stored = ClientRegistration {
            client_id: Some(client_id.clone()),
            client_secret: Some(
                registration
                    .client_secret
                    .clone()
                    .unwrap_or_else(|| self.next_id("secret")),
            ),
            ..registration
        };
        self.state().clients.insert(client_id, stored.clone());
        json_response(201, &stored)
    }

    fn get_client(&self, client_id: &str) -> RawResponse {
        match self.state().clients.get(client_id) {
            Some(registration) => json_response(
                200,
                &ClientRegistration {
                    client_secret: None,
                    ..registration.clone()
                },
            ),
            None => error_response(404, "Not Found", "Unable to locate the resource"),
        }
    }

    fn update_client(&self, client_id: &str, body: &RequestBody) -> RawResponse {
        let registration: ClientRegistration = match parse_body(body) {
            Ok(registration) => registration,
            Err(response) => return response,
        };
        let mut state = self.state();
        let Some(existing) = state.clients.get(client_id) else {
            return error_response(404, "Not Found", "Unable to locate the resource");
        };
        let stored = ClientRegistration {
            client_id: Some(client_id.to_string()),
            client_secret: registration
                .client_secret
                .clone()
                .or_else(|| existing.client_secret.clone()),
            ..registration
        };
        state.clients.insert(client_id.to_string(), stored.clone());
        json_response(
            200,
            &ClientRegistration {
                client_secret: None,
                ..stored
            },
        )
    }

    fn delete_client(&self, client_id: &str) -> RawResponse {
        match self.state().clients.remove(client_id) {
            Some(_) => RawResponse::new(204, ""),
            None => error_response(404, "Not Found", "Unable to locate the resource"),
        }
    }

    fn introspect(&self, body: &RequestBody) -> RawResponse {
        let Some(token) = body.form_value("token").filter(|t| !t.is_empty()) else {
            return error_response(400, "invalid_request", "token is required");
        };
        let state = self.state();
        let mut result = state
            .tokens
            .get(token)
            .cloned()
            .unwrap_or_default();
        if let Some(required) = body.form_value("scope") {
            if result.active && !required.split_whitespace().all(|s| result.has_scope(s)) {
                result = IntrospectionResult::default();
            }
        }
        json_response(200, &result)
    }

    fn user_info(&self) -> RawResponse {
        match &self.state().user_info {
            Some(info) => json_response(200, info),
            None => error_response(401, "request_unauthorized", "no user info configured"),
        }
    }

    fn delete_login_sessions(&self, subject: &str) -> RawResponse {
        if subject.is_empty() {
            return error_response(400, "invalid_request", "subject is required");
        }
        self.state().remembered_logins.remove(subject);
        RawResponse::new(204, "")
    }
}

#[async_trait]
impl Transport for FakeAuthorizationServer {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError> {
        if request.options.is_cancelled() {
            return Err(TransportError::Cancelled { url: request.url });
        }
        let response = self.route(&request);
        self.state().requests.push(request);
        Ok(response)
    }
}

fn json_response<T: serde::Serialize>(status: u16, value: &T) -> RawResponse {
    match serde_json::to_vec(value) {
        Ok(body) => RawResponse::new(status, body),
        Err(e) => error_response(500, "server_error", &e.to_string()),
    }
}

fn error_response(status: u16, error: &str, description: &str) -> RawResponse {
    RawResponse::json(
        status,
        &json!({
            "error": error,
            "error_description": description,
            "status_code": status,
        }),
    )
}

fn unknown_challenge() -> RawResponse {
    error_response(404, "Not Found", "Unable to locate the requested resource")
}

fn redirect(redirect_to: &str) -> RawResponse {
    RawResponse::json(200, &json!({ "redirect_to": redirect_to }))
}

fn rejection_redirect(
    client: Option<&ClientRegistration>,
    decision: &RejectDecision,
) -> RawResponse {
    let base = client
        .and_then(|c| c.redirect_uris.first().cloned())
        .unwrap_or_else(|| format!("{FAKE_PUBLIC_URL}/oauth2/fallbacks/error"));
    let mut url = match url::Url::parse(&base) {
        Ok(url) => url,
        Err(e) => return error_response(500, "server_error", &e.to_string()),
    };
    let error = if decision.error.is_empty() {
        "request_denied"
    } else {
        decision.error.as_str()
    };
    url.query_pairs_mut()
        .append_pair("error", error)
        .append_pair("error_description", &decision.error_description);
    redirect(url.as_str())
}

fn parse_body<T: DeserializeOwned>(body: &RequestBody) -> Result<T, RawResponse> {
    let value: Value = body
        .as_json()
        .ok_or_else(|| error_response(400, "invalid_request", "expected a JSON body"))?;
    serde_json::from_value(value)
        .map_err(|e| error_response(400, "invalid_request", &e.to_string()))
}
