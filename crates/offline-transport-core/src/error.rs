// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors surfaced at the codec and transport boundaries.
//!
//! Important note: it is important not to use `!Send` data types in errors
//! (e.g. avoid using `Rc`) to ensure these errors can be emitted in both
//! `Send` and `!Send` contexts.

/// Errors raised by an [`crate::EnvelopeCodec`] implementation.
///
/// These are always swallowed at the `offline-transport-queue` adapter
/// boundary: a serialization or parse failure is treated as best-effort data
/// loss, never propagated to the caller.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// The envelope could not be serialized to bytes.
    #[error("failed to serialize envelope: {0}")]
    Serialize(String),

    /// The stored bytes could not be parsed back into an envelope.
    #[error("failed to parse envelope: {0}")]
    Parse(String),
}
