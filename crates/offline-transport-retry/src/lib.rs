// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The Retry Scheduler.
//!
//! Owns the single pending drain timer and the current backoff delay.
//! Deliberately knows nothing about envelopes, the queue, or the engine:
//! callers pass the future to run once the delay elapses, and the
//! scheduler's only job is coalescing ("at most one timer armed") and
//! escalating/resetting the delay value.
//!
//! Must be driven from a `tokio::task::LocalSet` — the scheduled task is
//! spawned with [`tokio::task::spawn_local`] so it is `!Send` and is
//! dropped (cancelling the timer) along with the engine's local task set,
//! so the timer never keeps the process alive on its own.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::time::Duration;

/// The minimum delay used for an opportunistic drain after a live success
/// with no server-directed `Retry-After`.
pub const MIN_DELAY_MS: u64 = 100;
/// The delay applied after the first consecutive send failure.
pub const START_DELAY_MS: u64 = 5_000;
/// The ceiling no backoff delay may exceed.
pub const MAX_DELAY_MS: u64 = 3_600_000;

/// Owns one pending scheduled drain and the current backoff delay.
#[derive(Debug, Default)]
pub struct RetryScheduler {
    retry_delay_ms: Cell<u64>,
    timer: RefCell<Option<tokio::task::JoinHandle<()>>>,
}

impl RetryScheduler {
    /// Builds a scheduler with `retry_delay_ms` at its initial value of
    /// zero and no timer armed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current backoff delay, in milliseconds.
    #[must_use]
    pub fn retry_delay_ms(&self) -> u64 {
        self.retry_delay_ms.get()
    }

    /// Returns `true` if a drain is currently scheduled or running.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.timer
            .borrow()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Escalates the backoff delay after a send failure and returns the
    /// new value.
    ///
    /// `retry_delay_ms := clamp(retry_delay_ms * 2, START_DELAY_MS,
    /// MAX_DELAY_MS)`, which yields exactly `START_DELAY_MS` on the first
    /// failure (since it starts at zero) and doubles on every subsequent
    /// one, up to `MAX_DELAY_MS`.
    pub fn record_failure(&self) -> u64 {
        let doubled = self.retry_delay_ms.get().saturating_mul(2);
        let next = doubled.clamp(START_DELAY_MS, MAX_DELAY_MS);
        self.retry_delay_ms.set(next);
        tracing::debug!(retry_delay_ms = next, "backoff escalated");
        next
    }

    /// Resets the backoff delay to zero after a live 2xx/3xx success.
    pub fn record_success(&self) {
        self.retry_delay_ms.set(0);
    }

    /// Cancels any pending timer, enforcing that at most one drain timer
    /// is ever pending at once.
    pub fn cancel(&self) {
        if let Some(handle) = self.timer.borrow_mut().take() {
            handle.abort();
        }
    }

    /// Cancels any pending timer and arms a new one: `task` runs after
    /// `delay_ms` elapses, on the current `LocalSet`.
    pub fn flush_in<F>(&self, delay_ms: u64, task: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.cancel();
        tracing::trace!(delay_ms, "drain timer armed");
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            task.await;
        });
        *self.timer.borrow_mut() = Some(handle);
    }

    /// Arms a drain at the current backoff delay, unless one is already
    /// pending (coalescing: latest-wins only applies to `flush_in`
    /// directly, `flush_with_backoff` is a no-op while armed).
    pub fn flush_with_backoff<F>(&self, make_task: impl FnOnce() -> F)
    where
        F: Future<Output = ()> + 'static,
    {
        if self.is_armed() {
            tracing::trace!("drain already scheduled, coalescing");
            return;
        }
        self.flush_in(self.retry_delay_ms.get(), make_task());
    }
}
