//! Response decoder: the single place that maps status codes to outcomes
//!
//! | Status | Outcome |
//! |---|---|
//! | accepted (200 by default) | body decoded as JSON into the target shape |
//! | 400 / 401 / 403 / 404 | [`ProtocolError`] carrying the raw body |
//! | 500 | [`ProtocolError`] without the body |
//! | anything else | [`ProtocolErrorKind::Unhandled`](crate::error::ProtocolErrorKind::Unhandled) |

use serde::de::DeserializeOwned;

use crate::error::{Error, ProtocolError, Result};
use crate::transport::RawResponse;
use crate::utils::logging::LoggingHelper;

/// Success statuses for ordinary reads and resolutions
pub const SUCCESS_OK: &[u16] = &[200];

/// Client creation answers `201 Created`
pub const SUCCESS_CREATED: &[u16] = &[200, 201];

/// Deletions answer `204 No Content`
pub const SUCCESS_NO_CONTENT: &[u16] = &[200, 204];

/// Map a non-success status to its protocol error
#[must_use]
pub fn classify(status: u16, body: &[u8]) -> ProtocolError {
    ProtocolError::new(status, body)
}

fn check_status(raw: &RawResponse, accepted: &[u16]) -> Result<()> {
    if accepted.contains(&raw.status) {
        return Ok(());
    }
    let error = classify(raw.status, &raw.body);
    LoggingHelper::log_protocol_error(&error);
    Err(Error::Protocol(error))
}

/// Decode a JSON body into `T` if the status is accepted
///
/// # Errors
///
/// Returns [`Error::Protocol`] for any status outside `accepted` and
/// [`Error::Decode`] (with the raw body) if the JSON is malformed or does
/// not match `T`.
pub fn decode_json<T: DeserializeOwned>(raw: &RawResponse, accepted: &[u16]) -> Result<T> {
    check_status(raw, accepted)?;
    serde_json::from_slice(&raw.body).map_err(|e| Error::decode(e, &raw.body))
}

/// Accept a response whose success carries no payload we care about
///
/// # Errors
///
/// Returns [`Error::Protocol`] for any status outside `accepted`.
pub fn decode_empty(raw: &RawResponse, accepted: &[u16]) -> Result<()> {
    check_status(raw, accepted)
}

/// Decode `T` when a body is present, otherwise fall back to `T::default()`
///
/// # Errors
///
/// Same as [`decode_json`].
pub fn decode_optional<T: DeserializeOwned + Default>(
    raw: &RawResponse,
    accepted: &[u16],
) -> Result<T> {
    check_status(raw, accepted)?;
    if raw.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&raw.body).map_err(|e| Error::decode(e, &raw.body))
}
