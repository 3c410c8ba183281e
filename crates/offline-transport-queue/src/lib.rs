// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The Queue Adapter.
//!
//! Translates envelope-level calls into [`offline_transport_store::DurableQueue`]
//! operations, delegating (de)serialization to an injected
//! [`EnvelopeCodec`]. Codec failures and storage failures are both
//! swallowed here as best-effort telemetry loss: the affected envelope is
//! logged and dropped, never surfaced as an error to the engine above.

use offline_transport_core::EnvelopeCodec;
use offline_transport_store::DurableQueue;

/// Envelope-level façade over the durable FIFO queue.
pub struct QueueAdapter<C: EnvelopeCodec> {
    store: DurableQueue,
    codec: C,
    max_queue_size: u32,
}

impl<C: EnvelopeCodec> QueueAdapter<C> {
    /// Builds an adapter over `store`, capping it at `max_queue_size`
    /// entries and using `codec` to serialize/parse envelopes.
    pub fn new(store: DurableQueue, codec: C, max_queue_size: u32) -> Self {
        Self {
            store,
            codec,
            max_queue_size,
        }
    }

    /// Serializes `envelope` and inserts it, at the head when `to_start`,
    /// otherwise at the tail.
    ///
    /// Never fails: a serialization error or a full queue both result in
    /// the envelope being silently dropped (logged at `warn`/`debug`
    /// respectively), matching the adapter's best-effort contract.
    pub fn insert(&self, envelope: &C::Envelope, to_start: bool) {
        let bytes = match self.codec.serialize(envelope) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(%err, "dropping envelope: serialization failed");
                return;
            }
        };

        match self.store.insert(&bytes, self.max_queue_size, to_start) {
            Ok(true) => {}
            Ok(false) => tracing::debug!("dropping envelope: queue at capacity"),
            Err(err) => tracing::warn!(%err, "dropping envelope: queue storage error"),
        }
    }

    /// Pops and parses the envelope at ascending-key position `offset`.
    ///
    /// Returns `None` if the queue has no entry at that offset *or* if the
    /// stored bytes failed to parse (in which case the bytes are still
    /// removed from the store — the entry is considered unrecoverable, not
    /// retried).
    pub fn pop(&self, offset: usize) -> Option<C::Envelope> {
        let bytes = match self.store.pop(offset) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(%err, "queue pop failed");
                return None;
            }
        };

        match self.codec.parse(&bytes) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                tracing::debug!(%err, "dropping popped envelope: parse failed");
                None
            }
        }
    }

    /// Returns the number of entries currently stored.
    #[must_use]
    pub fn size(&self) -> usize {
        self.store.size()
    }

    /// Removes every entry. Storage errors are logged and swallowed, same
    /// as every other adapter operation.
    pub fn clear(&self) {
        if let Err(err) = self.store.clear() {
            tracing::warn!(%err, "queue clear failed");
        }
    }
}
