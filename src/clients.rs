//! OAuth2 client registrations
//!
//! `create` posts to the collection URL; `get`, `update` and `delete` address
//! `{url}/{client_id}`. An update is a full replace: every field of the
//! registration is sent, and anything left empty is cleared by the server.
//! Callers that want to change one field must resend the whole current
//! registration.

use serde::{Deserialize, Serialize};

use crate::decode::{decode_empty, decode_json, SUCCESS_CREATED, SUCCESS_NO_CONTENT, SUCCESS_OK};
use crate::error::{Result, TransportError};
use crate::transport::{CallOptions, Method, RequestBody, Transport, TransportRequest};
use crate::utils::logging::LoggingHelper;
use crate::utils::wire::null_default;

/// An OAuth2 client registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistration {
    /// Assigned by the server on create, immutable afterwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub client_name: String,
    /// Generated by the server when omitted on create
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Space-separated scope string
    #[serde(default, deserialize_with = "null_default")]
    pub scope: String,
    #[serde(default, deserialize_with = "null_default")]
    pub grant_types: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub audience: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub response_types: Vec<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub redirect_uris: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub post_logout_redirect_uris: Vec<String>,
}

impl ClientRegistration {
    #[must_use]
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            ..Self::default()
        }
    }

    /// Scopes as individual values
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }

    /// True when the caller-supplied fields match, ignoring the server-managed
    /// identifier and secret
    #[must_use]
    pub fn same_settings(&self, other: &Self) -> bool {
        let strip = |r: &Self| Self {
            client_id: None,
            client_secret: None,
            ..r.clone()
        };
        strip(self) == strip(other)
    }
}

fn client_url(base_url: &str, client_id: &str) -> std::result::Result<String, TransportError> {
    let mut url = url::Url::parse(base_url).map_err(|e| TransportError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    url.path_segments_mut()
        .map_err(|()| TransportError::InvalidUrl {
            url: base_url.to_string(),
            reason: "url cannot carry a path".to_string(),
        })?
        .pop_if_empty()
        .push(client_id);
    Ok(url.into())
}

/// `POST {url}`; the server assigns `client_id` (and `client_secret` if unset)
///
/// # Errors
///
/// Returns [`crate::Error::Protocol`] (`BadRequest` for an invalid
/// registration) and any transport, encode or decode failure.
pub async fn create_client(
    transport: &dyn Transport,
    url: &str,
    registration: &ClientRegistration,
    options: &CallOptions,
) -> Result<ClientRegistration> {
    let request = TransportRequest::new(Method::Post, url, options)
        .body(RequestBody::json(registration)?);
    let raw = transport.send(request).await?;
    let created: ClientRegistration = decode_json(&raw, SUCCESS_CREATED)?;
    LoggingHelper::log_client_change("created", created.client_id.as_deref().unwrap_or(""));
    Ok(created)
}

/// `GET {url}/{client_id}`
///
/// # Errors
///
/// Returns `NotFound` if the client is unknown, and any transport or decode
/// failure.
pub async fn get_client(
    transport: &dyn Transport,
    url: &str,
    client_id: &str,
    options: &CallOptions,
) -> Result<ClientRegistration> {
    let request = TransportRequest::new(Method::Get, client_url(url, client_id)?, options);
    let raw = transport.send(request).await?;
    decode_json(&raw, SUCCESS_OK)
}

/// `PUT {url}/{client_id}`: full replace, not a merge
///
/// The body's `client_id` is forced to `client_id`.
///
/// # Errors
///
/// Returns `NotFound` if the client is unknown, and any transport, encode or
/// decode failure.
pub async fn update_client(
    transport: &dyn Transport,
    url: &str,
    client_id: &str,
    registration: &ClientRegistration,
    options: &CallOptions,
) -> Result<ClientRegistration> {
    let body = ClientRegistration {
        client_id: Some(client_id.to_string()),
        ..registration.clone()
    };
    let request = TransportRequest::new(Method::Put, client_url(url, client_id)?, options)
        .body(RequestBody::json(&body)?);
    let raw = transport.send(request).await?;
    let updated = decode_json(&raw, SUCCESS_OK)?;
    LoggingHelper::log_client_change("updated", client_id);
    Ok(updated)
}

/// `DELETE {url}/{client_id}`
///
/// Deleting an already deleted client yields `NotFound`; whether that counts
/// as success is the caller's call.
///
/// # Errors
///
/// Returns `NotFound` if the client is unknown, and any transport failure.
pub async fn delete_client(
    transport: &dyn Transport,
    url: &str,
    client_id: &str,
    options: &CallOptions,
) -> Result<()> {
    let request = TransportRequest::new(Method::Delete, client_url(url, client_id)?, options);
    let raw = transport.send(request).await?;
    decode_empty(&raw, SUCCESS_NO_CONTENT)?;
    LoggingHelper::log_client_change("deleted", client_id);
    Ok(())
}
