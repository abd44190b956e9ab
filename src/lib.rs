#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Client-side mediator for the login, consent and logout delegation
//! protocol of an OAuth2/OpenID Connect Authorization Server, plus client
//! registration, token introspection and session revocation.

/// Version of the consentrs library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod challenge;
pub mod clients;
pub mod decode;
pub mod error;
pub mod introspection;
pub mod mediator;
pub mod sessions;
pub mod settings;
pub mod transport;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use challenge::{
    ConsentAcceptDecision, ConsentRequest, ConsentSession, LoginAcceptDecision, LoginRequest,
    LogoutRequest, RedirectOutcome, RejectDecision,
};
pub use clients::ClientRegistration;
pub use error::{Error, ProtocolError, ProtocolErrorKind, Result, TransportError};
pub use introspection::{IntrospectionResult, UserInfo};
pub use mediator::{ConsentMediator, MediatorDefaults};
pub use sessions::SessionRevocation;
pub use settings::MediatorSettings;
pub use transport::{CallOptions, HttpTransport, RawResponse, Transport, TransportRequest};
