// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Shared vocabulary for the offline transport core: the opaque envelope
//! contract, the item-kind tags the engine is allowed to inspect, the
//! `Transport`/`EnvelopeCodec` trait boundaries to external collaborators,
//! and the crate-wide error type.

/// The external serialization boundary (`EnvelopeCodec`).
pub mod codec;
/// Errors surfaced at the codec and transport boundaries.
pub mod error;
/// Item-kind tags an envelope may carry.
pub mod item_kind;
/// Parsing for the `Retry-After` response header.
pub mod retry_after;
/// The inner network send primitive (`Transport`) the engine wraps.
pub mod transport;

pub use codec::EnvelopeCodec;
pub use error::CodecError;
pub use item_kind::ItemKind;
pub use retry_after::parse_retry_after;
pub use transport::{Transport, TransportError, TransportResponse};

/// An opaque, atomically-sendable telemetry payload.
///
/// The core never inspects envelope contents directly. The only thing it is
/// allowed to ask of an envelope is which [`ItemKind`]s it carries, used to
/// exclude order-sensitive payloads (replay events/recordings, client
/// reports) from the durable queue.
pub trait Envelope: 'static {
    /// Returns the set of item kinds present in this envelope.
    fn item_kinds(&self) -> ItemKind;
}
