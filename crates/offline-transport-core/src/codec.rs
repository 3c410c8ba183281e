// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The external serialization boundary.
//!
//! Envelope wire format is out of scope for this crate: callers inject a
//! concrete [`EnvelopeCodec`] that knows how to turn their envelope type
//! into bytes and back.

use crate::{error::CodecError, Envelope};

/// Serializes envelopes to bytes for durable storage and parses them back.
pub trait EnvelopeCodec {
    /// The envelope type this codec knows how to handle.
    type Envelope: Envelope;

    /// Serializes an envelope to its durable byte representation.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialize`] if the envelope cannot be encoded.
    fn serialize(&self, envelope: &Self::Envelope) -> Result<Vec<u8>, CodecError>;

    /// Parses a previously-serialized envelope back from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Parse`] if the bytes are not a valid envelope.
    fn parse(&self, bytes: &[u8]) -> Result<Self::Envelope, CodecError>;
}
