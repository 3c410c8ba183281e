// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Sortable big-endian encoding for signed 64-bit queue keys.
//!
//! `sled` orders keys by raw byte comparison. Two's-complement `i64` does
//! not compare correctly that way (negative numbers have their high bit
//! set, so they would sort *after* positive ones). Flipping the sign bit
//! before encoding big-endian restores numeric ordering across the full
//! `i64` range, which is what lets a head-insertion key go negative without
//! breaking ascending-key enumeration order.

/// Encodes `key` into its sortable byte representation.
pub fn encode(key: i64) -> [u8; 8] {
    ((key as u64) ^ (1u64 << 63)).to_be_bytes()
}

/// Decodes a sortable byte representation back into a key.
///
/// # Panics
///
/// Panics if `bytes` is not exactly 8 bytes long; this only ever happens if
/// the underlying tree has been corrupted or written to by something other
/// than this module.
pub fn decode(bytes: &[u8]) -> i64 {
    let array: [u8; 8] = bytes.try_into().expect("queue key is always 8 bytes");
    (u64::from_be_bytes(array) ^ (1u64 << 63)) as i64
}
