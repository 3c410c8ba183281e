// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Item-kind tags an envelope may carry.

use bitflags::bitflags;

bitflags! {
    /// The set of item kinds present in an envelope.
    ///
    /// Only [`ItemKind::REPLAY_EVENT`], [`ItemKind::REPLAY_RECORDING`] and
    /// [`ItemKind::CLIENT_REPORT`] carry built-in meaning to the engine: an
    /// envelope whose kinds intersect that set is never queued (see
    /// `OfflineTransportEngine::send`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ItemKind: u16 {
        /// A session replay event.
        const REPLAY_EVENT = 0b0000_0001;
        /// A session replay recording segment.
        const REPLAY_RECORDING = 0b0000_0010;
        /// A client report (dropped/rate-limited event counters).
        const CLIENT_REPORT = 0b0000_0100;
        /// An ordinary event, transaction, or any other item kind the core
        /// does not treat specially.
        const OTHER = 0b0000_1000;
    }
}

impl ItemKind {
    /// Item kinds that are never persisted to the durable queue: they are
    /// either order-sensitive (replay) or would amplify load during an
    /// outage (client reports).
    pub const NEVER_QUEUED: ItemKind = ItemKind::REPLAY_EVENT
        .union(ItemKind::REPLAY_RECORDING)
        .union(ItemKind::CLIENT_REPORT);

    /// Returns `true` if this kind set intersects the built-in
    /// never-queue exclusion set.
    #[must_use]
    pub fn is_never_queued(self) -> bool {
        self.intersects(Self::NEVER_QUEUED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_and_client_report_are_never_queued() {
        assert!(ItemKind::REPLAY_EVENT.is_never_queued());
        assert!(ItemKind::REPLAY_RECORDING.is_never_queued());
        assert!(ItemKind::CLIENT_REPORT.is_never_queued());
        assert!(!ItemKind::OTHER.is_never_queued());
    }

    #[test]
    fn mixed_kinds_are_never_queued_if_any_excluded_kind_present() {
        let mixed = ItemKind::OTHER | ItemKind::REPLAY_EVENT;
        assert!(mixed.is_never_queued());
    }
}
