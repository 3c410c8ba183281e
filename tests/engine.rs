// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end scenarios for [`offline_transport::OfflineTransportEngine`]:
//! basic retry, backoff ceiling, `Retry-After` honored, full-offline drain,
//! replay exclusion, and the queue size cap.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;

use offline_transport::{
    Envelope, EnvelopeCodec, ItemKind, OfflineTransportConfig, OfflineTransportEngine,
    SendOutcome, Transport, TransportError, TransportResponse,
};
use offline_transport_store::DurableQueue;

/// Installs a `tracing` subscriber for the duration of the test process.
/// Safe to call from every test: `try_init` is a no-op once a subscriber is
/// already set.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().try_init();
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TestEnvelope {
    id: u32,
    kinds: ItemKind,
}

impl Envelope for TestEnvelope {
    fn item_kinds(&self) -> ItemKind {
        self.kinds
    }
}

struct IdentityCodec;

impl EnvelopeCodec for IdentityCodec {
    type Envelope = TestEnvelope;

    fn serialize(
        &self,
        envelope: &Self::Envelope,
    ) -> Result<Vec<u8>, offline_transport_core::CodecError> {
        Ok(envelope.id.to_be_bytes().to_vec())
    }

    fn parse(
        &self,
        bytes: &[u8],
    ) -> Result<Self::Envelope, offline_transport_core::CodecError> {
        let id = u32::from_be_bytes(bytes.try_into().map_err(|_| {
            offline_transport_core::CodecError::Parse("wrong length".into())
        })?);
        Ok(TestEnvelope {
            id,
            kinds: ItemKind::OTHER,
        })
    }
}

/// A scriptable transport: `attempts` are consumed last-to-first (via
/// `Vec::pop`) per `send()` call, so list them in reverse chronological
/// order; each attempt is either `Ok` or `Err`. Every sent envelope id is
/// recorded in `seen` for assertions; `seen` is reference-counted so a test
/// can keep its own handle after the transport is moved into the engine.
#[derive(Default)]
struct ScriptedTransport {
    attempts: RefCell<Vec<Result<TransportResponse, &'static str>>>,
    seen: Rc<RefCell<Vec<u32>>>,
}

impl ScriptedTransport {
    fn ok() -> TransportResponse {
        TransportResponse {
            status_code: Some(200),
            headers: HashMap::new(),
        }
    }

    fn server_error_with_retry_after(seconds: &str) -> TransportResponse {
        let mut headers = HashMap::new();
        headers.insert("retry-after".to_string(), seconds.to_string());
        TransportResponse {
            status_code: Some(500),
            headers,
        }
    }
}

#[async_trait(?Send)]
impl Transport for ScriptedTransport {
    type Envelope = TestEnvelope;

    async fn send(
        &self,
        envelope: &Self::Envelope,
    ) -> Result<TransportResponse, TransportError> {
        self.seen.borrow_mut().push(envelope.id);
        match self.attempts.borrow_mut().pop() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(TransportError::new(message)),
            None => Ok(Self::ok()),
        }
    }

    async fn flush(&self, _timeout: Option<Duration>) -> bool {
        true
    }
}

fn engine_with(
    transport: ScriptedTransport,
    config: OfflineTransportConfig,
) -> OfflineTransportEngine<ScriptedTransport, IdentityCodec> {
    let store = DurableQueue::open_temporary().unwrap();
    OfflineTransportEngine::new(transport, IdentityCodec, Some(store), config, None)
}

#[tokio::test(flavor = "current_thread")]
async fn basic_retry_queues_on_failure_and_drains_on_success() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            // First attempt fails, the retried drain (armed at the start
            // backoff delay) succeeds.
            let transport = ScriptedTransport {
                attempts: RefCell::new(vec![Ok(ScriptedTransport::ok()), Err("network down")]),
                seen: Rc::new(RefCell::new(Vec::new())),
            };
            let engine = engine_with(transport, OfflineTransportConfig::default());

            let outcome = engine
                .send(TestEnvelope {
                    id: 1,
                    kinds: ItemKind::OTHER,
                })
                .await
                .unwrap();
            assert!(matches!(outcome, SendOutcome::Queued));
            assert_eq!(engine.queued_len(), 1);

            tokio::time::sleep(Duration::from_millis(offline_transport::START_DELAY_MS + 50))
                .await;

            assert_eq!(engine.queued_len(), 0);
            let snapshot = engine.metrics();
            assert_eq!(snapshot.enqueued, 1);
            assert_eq!(snapshot.drained, 1);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn backoff_ceiling_is_never_exceeded() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let scheduler = offline_transport_retry::RetryScheduler::new();
            let mut delay = 0;
            for _ in 0..32 {
                delay = scheduler.record_failure();
            }
            assert_eq!(delay, offline_transport::MAX_DELAY_MS);
        })
        .await;
}

/// A response carrying `Retry-After` alongside a `>= 400` status code must
/// still arm the next drain at the header's delay, not be treated as a
/// plain server error with no scheduling at all.
#[tokio::test(flavor = "current_thread")]
async fn retry_after_is_honored_even_on_a_server_error_response() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            // Pre-load the store with one envelope so we have something
            // whose drain timing we can observe; the explicit `send` below
            // is a separate, fresh envelope.
            let store = DurableQueue::open_temporary().unwrap();
            store.insert(&99u32.to_be_bytes(), 30, false).unwrap();

            // Reverse chronological order (see `ScriptedTransport` doc):
            // call #1 is the explicit `send` below (500 + Retry-After: 1s),
            // call #2 is the opportunistic drain of the pre-loaded entry.
            let transport = ScriptedTransport {
                attempts: RefCell::new(vec![
                    Ok(ScriptedTransport::ok()),
                    Ok(ScriptedTransport::server_error_with_retry_after("1")),
                ]),
                seen: Rc::new(RefCell::new(Vec::new())),
            };
            let engine = OfflineTransportEngine::new(
                transport,
                IdentityCodec,
                Some(store),
                OfflineTransportConfig::default(),
                None,
            );

            let outcome = engine
                .send(TestEnvelope {
                    id: 1,
                    kinds: ItemKind::OTHER,
                })
                .await
                .unwrap();
            match outcome {
                SendOutcome::Delivered(response) => assert_eq!(response.status_code, Some(500)),
                SendOutcome::Queued => panic!("a resolved response must never be queued"),
            }
            // A resolved 500 response is not a transport failure, so the
            // explicit send itself is never queued...
            assert_eq!(engine.queued_len(), 1);

            // ...but the pre-loaded entry must still be drained, at the
            // Retry-After delay (1s) the 500 response carried, instead of
            // being silently dropped by the `is_server_error` early return.
            tokio::time::sleep(Duration::from_millis(1_050)).await;
            assert_eq!(engine.queued_len(), 0);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn full_offline_mode_only_delivers_via_flush() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let transport = ScriptedTransport::default();
            let seen = Rc::clone(&transport.seen);
            let config = OfflineTransportConfig {
                full_offline: true,
                ..OfflineTransportConfig::default()
            };
            let engine = engine_with(transport, config);

            for id in 0..3 {
                let outcome = engine
                    .send(TestEnvelope {
                        id,
                        kinds: ItemKind::OTHER,
                    })
                    .await
                    .unwrap();
                assert!(matches!(outcome, SendOutcome::Queued));
            }
            assert_eq!(engine.queued_len(), 3);

            assert!(engine.flush(1_000).await);
            tokio::time::sleep(Duration::from_millis(offline_transport::MIN_DELAY_MS * 10)).await;
            assert_eq!(engine.queued_len(), 0);
            // Law L1: a head drain delivers envelopes in the order they
            // were enqueued.
            assert_eq!(*seen.borrow(), vec![0, 1, 2]);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn second_flush_during_head_drain_is_a_no_op() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let transport = ScriptedTransport::default();
            let seen = Rc::clone(&transport.seen);
            let config = OfflineTransportConfig {
                full_offline: true,
                ..OfflineTransportConfig::default()
            };
            let engine = engine_with(transport, config);

            for id in 0..3 {
                engine
                    .send(TestEnvelope {
                        id,
                        kinds: ItemKind::OTHER,
                    })
                    .await
                    .unwrap();
            }
            assert_eq!(engine.queued_len(), 3);

            assert!(engine.flush(1_000).await);
            // Law L2: calling flush() again while a head drain is already
            // in progress is a no-op returning false, not a restart.
            assert!(!engine.flush(1_000).await);

            tokio::time::sleep(Duration::from_millis(offline_transport::MIN_DELAY_MS * 10)).await;
            assert_eq!(engine.queued_len(), 0);
            assert_eq!(*seen.borrow(), vec![0, 1, 2]);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn full_offline_negative_timeout_purges_without_delivering() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let transport = ScriptedTransport::default();
            let config = OfflineTransportConfig {
                full_offline: true,
                ..OfflineTransportConfig::default()
            };
            let engine = engine_with(transport, config);

            engine
                .send(TestEnvelope {
                    id: 42,
                    kinds: ItemKind::OTHER,
                })
                .await
                .unwrap();
            assert_eq!(engine.queued_len(), 1);

            assert!(engine.flush(-1).await);
            assert_eq!(engine.queued_len(), 0);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn replay_events_are_never_queued_and_the_error_is_re_raised() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let transport = ScriptedTransport {
                attempts: RefCell::new(vec![Err("replay upload failed")]),
                seen: Rc::new(RefCell::new(Vec::new())),
            };
            let engine = engine_with(transport, OfflineTransportConfig::default());

            let result = engine
                .send(TestEnvelope {
                    id: 9,
                    kinds: ItemKind::REPLAY_RECORDING,
                })
                .await;
            assert!(result.is_err());
            assert_eq!(engine.queued_len(), 0);
            assert_eq!(engine.metrics().refused, 1);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn should_store_filter_can_refuse_queueing() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let store = DurableQueue::open_temporary().unwrap();
            let transport = ScriptedTransport {
                attempts: RefCell::new(vec![Err("boom")]),
                seen: Rc::new(RefCell::new(Vec::new())),
            };
            let engine = OfflineTransportEngine::new(
                transport,
                IdentityCodec,
                Some(store),
                OfflineTransportConfig::default(),
                Some(Box::new(|_envelope: &TestEnvelope, _err, _delay| false)),
            );

            let result = engine
                .send(TestEnvelope {
                    id: 3,
                    kinds: ItemKind::OTHER,
                })
                .await;
            assert!(result.is_err());
            assert_eq!(engine.queued_len(), 0);
        })
        .await;
}

#[tokio::test(flavor = "current_thread")]
async fn queue_size_cap_drops_new_entries_once_full() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let transport = ScriptedTransport {
                attempts: RefCell::new(vec![Err("a"), Err("b"), Err("c")]),
                seen: Rc::new(RefCell::new(Vec::new())),
            };
            let config = OfflineTransportConfig {
                max_queue_size: 2,
                ..OfflineTransportConfig::default()
            };
            let engine = engine_with(transport, config);

            for id in 0..3 {
                let _ = engine
                    .send(TestEnvelope {
                        id,
                        kinds: ItemKind::OTHER,
                    })
                    .await;
            }
            assert_eq!(engine.queued_len(), 2);
            engine.shutdown();
        })
        .await;
}

/// The store path is resolved from `OfflineTransportConfig` and backed by a
/// real `sled` database on disk (via a `tempfile` temp directory, not the
/// in-process `DurableQueue::open_temporary` helper), so an envelope queued
/// by one engine instance must still be there when a second instance opens
/// the same path.
#[tokio::test(flavor = "current_thread")]
async fn queued_envelopes_survive_an_engine_restart_on_disk() {
    init_tracing();
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let dir = tempfile::tempdir().unwrap();
            let config = OfflineTransportConfig {
                store_path: Some(dir.path().to_path_buf()),
                ..OfflineTransportConfig::default()
            };

            {
                let transport = ScriptedTransport {
                    attempts: RefCell::new(vec![Err("network down")]),
                    seen: Rc::new(RefCell::new(Vec::new())),
                };
                let engine =
                    OfflineTransportEngine::open(transport, IdentityCodec, config.clone(), None)
                        .unwrap();
                engine
                    .send(TestEnvelope {
                        id: 5,
                        kinds: ItemKind::OTHER,
                    })
                    .await
                    .unwrap();
                assert_eq!(engine.queued_len(), 1);
                engine.shutdown();
                // Give the aborted drain timer task a chance to actually
                // drop (and release its `sled` handle) before we reopen the
                // same path below.
                tokio::time::sleep(Duration::from_millis(10)).await;
            }

            let transport = ScriptedTransport::default();
            let engine =
                OfflineTransportEngine::open(transport, IdentityCodec, config, None).unwrap();
            assert_eq!(engine.queued_len(), 1);
        })
        .await;
}

#[allow(dead_code)]
fn assert_send_sync_not_required() {
    // The engine is intentionally !Send/!Sync; this exists only so a
    // future accidental bound addition is caught by a doc example rather
    // than silently compiling away the single-threaded design. See
    // `RetryScheduler` for the same note.
    let _ = Rc::new(Cell::new(0));
}
