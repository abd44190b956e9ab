//! Scripted transport for unit tests
//!
//! Answers are queued up front and handed out in order, one per request.
//! Every request is recorded so tests can assert on what was sent.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::{RawResponse, Transport, TransportRequest};

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    answers: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw answer
    pub fn push(&self, response: RawResponse) {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(response));
    }

    /// Queue a JSON answer
    pub fn push_json(&self, status: u16, body: &serde_json::Value) {
        self.push(RawResponse::json(status, body));
    }

    /// Queue a transport failure
    pub fn push_error(&self, error: TransportError) {
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(error));
    }

    /// Requests received so far, oldest first
    #[must_use]
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError> {
        let cancelled = request.options.is_cancelled();
        let url = request.url.clone();
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if cancelled {
            return Err(TransportError::Cancelled { url });
        }
        self.answers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::Other(format!(
                    "no scripted answer left for {url}"
                )))
            })
    }
}
