// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The Offline Transport Engine.
//!
//! Public facade wrapping a user-supplied [`Transport`] with durable
//! persistence, exponential backoff, opportunistic/head drains, and a
//! "full offline" batching mode. It wires together `offline-transport-store`
//! (the durable FIFO queue), `offline-transport-queue` (the envelope-level
//! adapter over it) and `offline-transport-retry` (the backoff scheduler).
//!
//! The engine is `!Send` by design (Rc/Cell throughout, no locks) and must
//! be constructed and driven from inside a `tokio::task::LocalSet` — see
//! [`OfflineTransportEngine::new`].

/// Engine configuration: store location, queue cap, offline/startup flags.
pub mod config;
mod metrics;

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use futures::future::LocalBoxFuture as BoxFuture;

pub use offline_transport_core::{
    parse_retry_after, CodecError, Envelope, EnvelopeCodec, ItemKind, Transport, TransportError,
    TransportResponse,
};
pub use offline_transport_retry::{MAX_DELAY_MS, MIN_DELAY_MS, START_DELAY_MS};
pub use offline_transport_store::DurableQueue;

pub use config::OfflineTransportConfig;
pub use metrics::EngineMetricsSnapshot;

use metrics::EngineMetrics;
use offline_transport_queue::QueueAdapter;
use offline_transport_retry::RetryScheduler;
pub use offline_transport_store::error::StoreError;

/// A user-supplied filter consulted after the built-in replay/client-report
/// exclusion. Returns `true` to allow queueing a failed envelope.
pub type ShouldStoreFilter<E> = Box<dyn Fn(&E, &TransportError, u64) -> bool>;

/// The outcome of a [`OfflineTransportEngine::send`] call that did not
/// error out.
#[derive(Debug)]
pub enum SendOutcome {
    /// The inner transport accepted the envelope live.
    Delivered(TransportResponse),
    /// The envelope was written to the durable queue instead of (or after
    /// failing) live delivery.
    Queued,
}

struct Inner<T: Transport, C: EnvelopeCodec<Envelope = T::Envelope>> {
    transport: T,
    queue: Option<QueueAdapter<C>>,
    scheduler: RetryScheduler,
    config: OfflineTransportConfig,
    should_store: Option<ShouldStoreFilter<T::Envelope>>,
    size_to_flush: Cell<usize>,
    flushed_cnt: Cell<usize>,
    metrics: EngineMetrics,
}

/// Wraps a [`Transport`] with durable persistence, backoff and draining.
///
/// Cheap to clone (an `Rc` handle to shared state); all clones refer to the
/// same queue, timer and backoff state.
pub struct OfflineTransportEngine<T: Transport, C: EnvelopeCodec<Envelope = T::Envelope>> {
    inner: Rc<Inner<T, C>>,
}

impl<T: Transport, C: EnvelopeCodec<Envelope = T::Envelope>> Clone for OfflineTransportEngine<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, C> OfflineTransportEngine<T, C>
where
    T: Transport + 'static,
    C: EnvelopeCodec<Envelope = T::Envelope> + 'static,
{
    /// Builds a new engine.
    ///
    /// `store` is the opened durable queue; pass `None` to disable
    /// persistence entirely (every failed send is then dropped rather than
    /// queued). Must be called from inside a `tokio::task::LocalSet::run_until`
    /// (or a task already spawned onto one), because `flush_at_startup`
    /// may arm a timer via [`tokio::task::spawn_local`].
    pub fn new(
        transport: T,
        codec: C,
        store: Option<DurableQueue>,
        config: OfflineTransportConfig,
        should_store: Option<ShouldStoreFilter<T::Envelope>>,
    ) -> Self {
        let max_queue_size = config.max_queue_size;
        let queue = store.map(|store| QueueAdapter::new(store, codec, max_queue_size));

        let flush_at_startup = config.flush_at_startup;
        let inner = Rc::new(Inner {
            transport,
            queue,
            scheduler: RetryScheduler::new(),
            config,
            should_store,
            size_to_flush: Cell::new(0),
            flushed_cnt: Cell::new(0),
            metrics: EngineMetrics::default(),
        });

        if flush_at_startup {
            tracing::debug!("flush at startup: arming opportunistic drain");
            let scheduled = Rc::clone(&inner);
            inner
                .scheduler
                .flush_with_backoff(move || drain_step(scheduled, false));
        }

        Self { inner }
    }

    /// Convenience constructor that opens the on-disk store described by
    /// `config.store_path`/`db_name`/`store_name` and hands it to
    /// [`Self::new`]. When `store_path` is `None`, persistence is
    /// disabled: every failed send is then dropped rather than queued.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the database or tree cannot be opened.
    pub fn open(
        transport: T,
        codec: C,
        config: OfflineTransportConfig,
        should_store: Option<ShouldStoreFilter<T::Envelope>>,
    ) -> Result<Self, StoreError> {
        let store = match config.db_path() {
            Some(path) => {
                let db = sled::open(path)?;
                Some(DurableQueue::open(&db, &config.store_name)?)
            }
            None => None,
        };
        Ok(Self::new(transport, codec, store, config, should_store))
    }

    /// Attempts live delivery of `envelope`, falling back to the durable
    /// queue on failure or in full-offline mode.
    ///
    /// # Errors
    ///
    /// Returns the inner transport's [`TransportError`] only when the
    /// envelope was refused queueing (the built-in replay/client-report
    /// exclusion, or a user `should_store` filter returning `false`) — the
    /// engine re-raises the original failure rather than silently
    /// dropping it.
    pub async fn send(&self, envelope: T::Envelope) -> Result<SendOutcome, TransportError> {
        send_internal(Rc::clone(&self.inner), envelope, false, false).await
    }

    /// Drives delivery of queued envelopes.
    ///
    /// Outside full-offline mode this simply forwards to the inner
    /// transport's own `flush`. In full-offline mode: `timeout_ms < 0`
    /// purges the queue and returns `true`; if a head drain is already in
    /// progress this returns `false` without restarting it; otherwise a
    /// head drain over the queue's current contents is armed and `true` is
    /// returned immediately (the drain itself runs in the background).
    pub async fn flush(&self, timeout_ms: i64) -> bool {
        if !self.inner.config.full_offline {
            let timeout = (timeout_ms >= 0).then(|| Duration::from_millis(timeout_ms as u64));
            return self.inner.transport.flush(timeout).await;
        }

        if timeout_ms < 0 {
            if let Some(queue) = &self.inner.queue {
                queue.clear();
            }
            self.inner.size_to_flush.set(0);
            self.inner.flushed_cnt.set(0);
            return true;
        }

        if self.inner.size_to_flush.get() > 0 {
            tracing::debug!("head drain already in progress, flush() is a no-op");
            return false;
        }

        let size = self.inner.queue.as_ref().map_or(0, QueueAdapter::size);
        if size > 0 {
            tracing::debug!(size, "arming head drain");
            self.inner.size_to_flush.set(size);
            self.inner.flushed_cnt.set(0);
            let scheduled = Rc::clone(&self.inner);
            self.inner
                .scheduler
                .flush_with_backoff(move || drain_step(scheduled, true));
        }
        true
    }

    /// Returns a point-in-time snapshot of the engine's counters.
    #[must_use]
    pub fn metrics(&self) -> EngineMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Idempotently cancels any pending drain timer.
    ///
    /// The durable queue itself needs no explicit close: `sled` persists
    /// writes as they happen, so dropping the engine (and its store
    /// handle) is sufficient. Exposed as a named method, rather than left
    /// implicit in `Drop`, because canceling a timer is an action a
    /// caller may want to take (and observe) before dropping the engine.
    pub fn shutdown(&self) {
        self.inner.scheduler.cancel();
    }

    /// Number of entries currently in the durable queue, or `0` if
    /// persistence is disabled.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.inner.queue.as_ref().map_or(0, QueueAdapter::size)
    }
}

/// One scheduled drain step: pop the next eligible envelope and attempt to
/// send it.
///
/// Boxed because it mutually recurses with [`send_internal`] across an
/// unbounded number of steps (retried head-drain failures, successive
/// opportunistic drains) — Rust cannot size a future with unbounded
/// recursion depth without heap indirection.
fn drain_step<T, C>(engine: Rc<Inner<T, C>>, is_flushing_head: bool) -> BoxFuture<'static, ()>
where
    T: Transport + 'static,
    C: EnvelopeCodec<Envelope = T::Envelope> + 'static,
{
    Box::pin(async move {
        let Some(queue) = &engine.queue else {
            return;
        };

        let can_pop = if is_flushing_head {
            engine.flushed_cnt.get() < engine.size_to_flush.get()
        } else {
            true
        };
        if !can_pop {
            return;
        }

        let offset = if is_flushing_head {
            0
        } else {
            engine
                .size_to_flush
                .get()
                .saturating_sub(engine.flushed_cnt.get())
        };

        let Some(envelope) = queue.pop(offset) else {
            if is_flushing_head {
                engine.size_to_flush.set(0);
                engine.flushed_cnt.set(0);
            }
            return;
        };

        if is_flushing_head {
            engine.flushed_cnt.set(engine.flushed_cnt.get() + 1);
        }

        if (send_internal(Rc::clone(&engine), envelope, is_flushing_head, true).await).is_ok() {
            engine.metrics.inc_drained();
        }

        if is_flushing_head && engine.flushed_cnt.get() >= engine.size_to_flush.get() {
            engine.size_to_flush.set(0);
            engine.flushed_cnt.set(0);
        }
    })
}

/// The shared core of `send`, parameterized over whether this call is
/// itself a step of a head drain and whether the envelope came from the
/// queue (vs. a fresh caller) for metrics purposes only.
fn send_internal<T, C>(
    engine: Rc<Inner<T, C>>,
    envelope: T::Envelope,
    is_flushing_head: bool,
    is_drain: bool,
) -> BoxFuture<'static, Result<SendOutcome, TransportError>>
where
    T: Transport + 'static,
    C: EnvelopeCodec<Envelope = T::Envelope> + 'static,
{
    Box::pin(async move {
        if engine.config.full_offline && !is_flushing_head {
            if let Some(queue) = &engine.queue {
                queue.insert(&envelope, false);
                engine.metrics.inc_enqueued();
            }
            return Ok(SendOutcome::Queued);
        }

        match engine.transport.send(&envelope).await {
            Ok(response) => {
                let retry_after_delay_ms = response
                    .retry_after()
                    .and_then(parse_retry_after)
                    .map(clamp_millis);

                // A Retry-After header always arms the next drain at the
                // delay it names, even on a >=400 response — that is the
                // header's entire purpose. Only an absent header defers to
                // the plain server-error early return.
                if retry_after_delay_ms.is_none() && response.is_server_error() {
                    tracing::debug!(
                        status = response.status_code,
                        "server error response, queue not advanced"
                    );
                    return Ok(SendOutcome::Delivered(response));
                }

                let delay_ms = retry_after_delay_ms.unwrap_or(MIN_DELAY_MS);

                engine.scheduler.record_success();
                if !is_drain {
                    engine.metrics.inc_delivered();
                }

                let scheduled = Rc::clone(&engine);
                engine
                    .scheduler
                    .flush_in(delay_ms, drain_step(scheduled, is_flushing_head));

                Ok(SendOutcome::Delivered(response))
            }
            Err(err) => {
                let retry_delay_ms = engine.scheduler.record_failure();
                engine.metrics.inc_backoff_escalations();

                let never_queue = envelope.item_kinds().is_never_queued();
                let allow_queue = !never_queue
                    && engine
                        .should_store
                        .as_ref()
                        .map_or(true, |filter| filter(&envelope, &err, retry_delay_ms));

                if !allow_queue {
                    tracing::debug!(never_queue, "envelope refused queueing, re-raising error");
                    engine.metrics.inc_refused();
                    return Err(err);
                }

                if let Some(queue) = &engine.queue {
                    if is_flushing_head {
                        queue.insert(&envelope, true);
                        engine
                            .flushed_cnt
                            .set(engine.flushed_cnt.get().saturating_sub(1));
                        let scheduled = Rc::clone(&engine);
                        engine
                            .scheduler
                            .flush_with_backoff(move || drain_step(scheduled, true));
                    } else {
                        queue.insert(&envelope, false);
                        let scheduled = Rc::clone(&engine);
                        engine
                            .scheduler
                            .flush_with_backoff(move || drain_step(scheduled, false));
                    }
                    engine.metrics.inc_enqueued();
                }

                Ok(SendOutcome::Queued)
            }
        }
    })
}

fn clamp_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
