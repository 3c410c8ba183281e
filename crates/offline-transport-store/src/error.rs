// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors raised by the durable FIFO queue.

/// Errors surfaced by the durable store.
///
/// Wraps an I/O or storage failure from the underlying `sled` database;
/// the Queue Adapter (`offline-transport-queue`) swallows these at its
/// boundary as best-effort data loss, so callers above the adapter never
/// see this type.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A `sled` operation failed.
    #[error("queue storage error: {0}")]
    Sled(#[from] sled::Error),
}
