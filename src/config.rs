// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Engine configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for an [`crate::OfflineTransportEngine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineTransportConfig {
    /// Directory the persistent database lives in. `None` disables
    /// persistence: every failed send is dropped rather than queued.
    pub store_path: Option<PathBuf>,
    /// Identifier of the persistent database file, nested under
    /// `store_path`. Only meaningful when `store_path` is set.
    pub db_name: String,
    /// Identifier of the sled tree backing the durable queue.
    pub store_name: String,
    /// Hard cap on stored entries: inserts attempted past this count are
    /// silently dropped.
    pub max_queue_size: u32,
    /// Arm one non-head drain at construction, to opportunistically drain
    /// entries left over from a prior process.
    pub flush_at_startup: bool,
    /// When set, `send` only enqueues; delivery happens solely via
    /// `flush`.
    pub full_offline: bool,
}

impl Default for OfflineTransportConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            db_name: "sentry-offline".to_string(),
            store_name: "queue".to_string(),
            max_queue_size: 30,
            flush_at_startup: false,
            full_offline: false,
        }
    }
}

impl OfflineTransportConfig {
    /// The full on-disk path to the database file, if persistence is
    /// enabled.
    #[must_use]
    pub fn db_path(&self) -> Option<PathBuf> {
        self.store_path.as_ref().map(|dir| dir.join(&self.db_name))
    }

    /// Deserializes a config from a JSON node, for embedding this engine
    /// as one stage of a larger pipeline whose config tree is assembled
    /// from loosely-typed JSON values. Missing fields fall back to
    /// [`Default::default`] via `#[serde(default)]`.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if `value` doesn't match the shape
    /// of [`OfflineTransportConfig`].
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
