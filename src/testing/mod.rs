//! Test doubles for code built on the mediator
//!
//! Available to this crate's unit tests and, behind the `testing` feature,
//! to downstream crates and integration tests.
//!
//! - [`mock`] - scripted transport that replays queued answers
//! - [`server`] - stateful in-memory Authorization Server
//! - [`fixtures`] - pre-built registrations, wire documents and settings
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use consentrs::testing::FakeAuthorizationServer;
//! use consentrs::LoginAcceptDecision;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let server = Arc::new(FakeAuthorizationServer::new());
//! let challenge = server.issue_login_challenge("spa", &["openid"]);
//! let mediator = server.mediator();
//!
//! let outcome = mediator
//!     .accept_login(&challenge, &LoginAcceptDecision::new("alice"))
//!     .await
//!     .unwrap();
//! assert!(outcome.redirect_to.contains("login_verifier"));
//! # }
//! ```

pub mod fixtures;
pub mod mock;
pub mod server;

pub use fixtures::TestFixtures;
pub use mock::ScriptedTransport;
pub use server::FakeAuthorizationServer;

/// Common test constants
pub mod constants {
    /// Admin API base of the fake server
    pub const FAKE_ADMIN_URL: &str = "http://hydra.test:4445";

    /// Public API base of the fake server
    pub const FAKE_PUBLIC_URL: &str = "http://hydra.test:4444";

    pub const TEST_SUBJECT: &str = "alice@example.com";

    pub const TEST_CLIENT_ID: &str = "test-app";

    pub const TEST_CLIENT_SECRET: &str = "test-app-secret";

    pub const TEST_REDIRECT_URI: &str = "https://app.example.com/callback";

    pub const TEST_SCOPES: &[&str] = &["openid", "offline", "profile"];
}
