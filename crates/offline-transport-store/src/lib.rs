// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The durable FIFO queue.
//!
//! A bounded, key-ordered persistent container of opaque envelope bytes,
//! backed by a `sled` tree. Keys are signed 64-bit integers encoded so that
//! `sled`'s byte-lexicographic ordering matches numeric ordering (see
//! [`key`]), which is what lets a head insert use a key strictly below
//! every key currently present even across repeated head-drain failures.
//!
//! Every public operation here is a single logical step against one tree
//! from one single-threaded caller (the engine's `LocalSet`), so `sled`'s
//! lack of a range-capable transactional API is not a correctness gap:
//! nothing ever interleaves two of these calls against the same tree.

/// Errors raised by the durable FIFO queue.
pub mod error;
mod key;

use error::StoreError;

/// A durable, bounded, key-ordered FIFO queue of byte values.
#[derive(Debug, Clone)]
pub struct DurableQueue {
    tree: sled::Tree,
}

impl DurableQueue {
    /// Opens (creating if absent) the named tree inside `db`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the tree cannot be opened.
    pub fn open(db: &sled::Db, tree_name: &str) -> Result<Self, StoreError> {
        let tree = db.open_tree(tree_name)?;
        Ok(Self { tree })
    }

    /// Opens a queue backed by a fresh temporary database, discarded when
    /// the returned value is dropped. Intended for tests and for callers
    /// that opt out of persistence.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the temporary database cannot be created.
    pub fn open_temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::open(&db, "queue")
    }

    /// Inserts `value` into the queue, at the head when `to_start` is set,
    /// otherwise at the tail.
    ///
    /// Returns `Ok(false)` without writing anything if the queue already
    /// holds `max_size` or more entries — the insert is silently dropped,
    /// matching best-effort telemetry semantics.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a storage failure.
    pub fn insert(&self, value: &[u8], max_size: u32, to_start: bool) -> Result<bool, StoreError> {
        let len = self.tree.len() as u64;
        if len >= u64::from(max_size) {
            tracing::debug!(len, max_size, "queue at capacity, dropping insert");
            return Ok(false);
        }

        let next_key = if to_start {
            self.min_key()?.map_or(0, |min| min - 1)
        } else {
            self.max_key()?.map_or(0, |max| max + 1)
        };

        let _ = self.tree.insert(key::encode(next_key), value)?;
        tracing::trace!(key = next_key, to_start, "queue insert");
        Ok(true)
    }

    /// Pops the value at ascending-key position `offset`, deleting it.
    ///
    /// Returns `Ok(None)` if the queue has fewer than `offset + 1` entries.
    /// Entries before `offset` are left untouched: the delete applies only
    /// to the key read at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a storage failure.
    pub fn pop(&self, offset: usize) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(entry) = self.tree.iter().nth(offset) else {
            return Ok(None);
        };
        let (raw_key, value) = entry?;
        let _ = self.tree.remove(&raw_key)?;
        tracing::trace!(key = key::decode(&raw_key), offset, "queue pop");
        Ok(Some(value.to_vec()))
    }

    /// Returns the number of entries currently stored.
    #[must_use]
    pub fn size(&self) -> usize {
        self.tree.len()
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a storage failure.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.tree.clear()?;
        tracing::debug!("queue cleared");
        Ok(())
    }

    fn min_key(&self) -> Result<Option<i64>, StoreError> {
        match self.tree.iter().next() {
            Some(entry) => Ok(Some(key::decode(&entry?.0))),
            None => Ok(None),
        }
    }

    fn max_key(&self) -> Result<Option<i64>, StoreError> {
        match self.tree.iter().next_back() {
            Some(entry) => Ok(Some(key::decode(&entry?.0))),
            None => Ok(None),
        }
    }
}
