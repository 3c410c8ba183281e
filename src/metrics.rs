// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Engine-level observability counters.
//!
//! Deliberately small: no per-signal breakdown, no exported OTLP metric
//! stream — this crate has no signal types of its own and no telemetry
//! exporter to report through, just a handful of counters useful for
//! debugging and dashboards.

use std::cell::Cell;

/// Live, single-threaded counters owned by the engine.
#[derive(Debug, Default)]
pub(crate) struct EngineMetrics {
    enqueued: Cell<u64>,
    delivered: Cell<u64>,
    drained: Cell<u64>,
    refused: Cell<u64>,
    backoff_escalations: Cell<u64>,
}

impl EngineMetrics {
    pub(crate) fn inc_enqueued(&self) {
        self.enqueued.set(self.enqueued.get() + 1);
    }

    pub(crate) fn inc_delivered(&self) {
        self.delivered.set(self.delivered.get() + 1);
    }

    pub(crate) fn inc_drained(&self) {
        self.drained.set(self.drained.get() + 1);
    }

    pub(crate) fn inc_refused(&self) {
        self.refused.set(self.refused.get() + 1);
    }

    pub(crate) fn inc_backoff_escalations(&self) {
        self.backoff_escalations.set(self.backoff_escalations.get() + 1);
    }

    pub(crate) fn snapshot(&self) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            enqueued: self.enqueued.get(),
            delivered: self.delivered.get(),
            drained: self.drained.get(),
            refused: self.refused.get(),
            backoff_escalations: self.backoff_escalations.get(),
        }
    }
}

/// A point-in-time snapshot of [`EngineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineMetricsSnapshot {
    /// Envelopes written to the durable queue (tail or head).
    pub enqueued: u64,
    /// Live sends that received a non-server-error response.
    pub delivered: u64,
    /// Envelopes successfully redelivered from the durable queue.
    pub drained: u64,
    /// Envelopes refused by the `should_store` filter and re-raised to
    /// the caller.
    pub refused: u64,
    /// Number of times the backoff delay was escalated after a failure.
    pub backoff_escalations: u64,
}
