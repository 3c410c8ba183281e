// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The inner network send primitive consumed by the engine.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::Envelope;

/// A response from a live delivery attempt.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    /// HTTP-style status code, if the inner transport produced one.
    pub status_code: Option<u16>,
    /// Response headers, lower-cased keys. Only `retry-after` is
    /// inspected by the engine.
    pub headers: HashMap<String, String>,
}

impl TransportResponse {
    /// Returns `true` if `status_code` is present and `>= 400`.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code.is_some_and(|code| code >= 400)
    }

    /// Returns the raw `retry-after` header value, if present.
    #[must_use]
    pub fn retry_after(&self) -> Option<&str> {
        self.headers.get("retry-after").map(String::as_str)
    }
}

/// An error raised by a failed live delivery attempt.
#[derive(thiserror::Error, Debug)]
#[error("transport send failed: {message}")]
pub struct TransportError {
    /// Human-readable failure description.
    pub message: String,
}

impl TransportError {
    /// Builds a new transport error from any displayable cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The inner send channel the engine wraps with persistence and retry.
///
/// Implementations are expected to be cheap to clone/share and are only
/// ever driven from the engine's single-threaded local task set, hence the
/// `?Send` bound.
#[async_trait(?Send)]
pub trait Transport {
    /// The envelope type this transport carries.
    type Envelope: Envelope;

    /// Attempts one live delivery of `envelope`.
    ///
    /// Takes the envelope by reference, not by value: on failure the
    /// engine needs it back, intact, to decide whether to persist it to
    /// the durable queue — an owning signature would force the engine to
    /// reconstruct or clone the envelope on every retry path.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on any failure to reach the remote
    /// endpoint (connection failure, timeout, transport-level protocol
    /// error). A non-2xx/3xx HTTP response is *not* an error at this layer
    /// — it is returned as an `Ok(TransportResponse)` whose
    /// `is_server_error()` is `true`.
    async fn send(&self, envelope: &Self::Envelope) -> Result<TransportResponse, TransportError>;

    /// Asks the inner transport to flush any of its own internal
    /// buffering, bounded by `timeout`. Returns `true` if the flush
    /// completed before the timeout elapsed.
    async fn flush(&self, timeout: Option<Duration>) -> bool;
}
