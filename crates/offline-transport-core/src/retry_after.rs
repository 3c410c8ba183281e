// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Parsing for the `Retry-After` response header (RFC 9110 §10.2.3).

use std::time::{Duration, SystemTime};

/// Parses a `Retry-After` header value into a delay.
///
/// Accepts either the delta-seconds form (`"120"`) or an HTTP-date
/// (`"Wed, 21 Oct 2015 07:28:00 GMT"`). Returns `None` if the value matches
/// neither form, or if an HTTP-date is already in the past.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let trimmed = header_value.trim();

    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let target = httpdate::parse_http_date(trimmed).ok()?;
    target.duration_since(SystemTime::now()).ok()
}
