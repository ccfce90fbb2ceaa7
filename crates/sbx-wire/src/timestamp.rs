// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RFC3339Nano UTC timestamp formatting for the wire boundary (spec section 6).
//!
//! Internally every component works in epoch-ms against [`sbx_core::Clock`];
//! conversion to RFC3339 happens only here, right before a DTO is serialized.

use chrono::{DateTime, Utc};

pub fn to_rfc3339_nano(epoch_ms: u64) -> String {
    let dt: DateTime<Utc> = DateTime::from_timestamp_millis(epoch_ms as i64).unwrap_or_else(|| {
        DateTime::from_timestamp(0, 0).expect("epoch zero is always a valid timestamp")
    });
    dt.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}
