// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tagged envelope carrying both guest-facing endpoints over the one
//! listener and framing (spec section 4.4): bootstrap fetch and runner
//! report share a port, so the `type` tag is what tells them apart —
//! the same convention [`crate::operator::Request`] uses for the
//! operator socket.

use crate::bootstrap::{BootstrapRequest, BootstrapResponse};
use crate::report::{RunnerReportRequest, RunnerReportResponse};
use crate::ErrorEnvelope;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum GuestRequest {
    Bootstrap(BootstrapRequest),
    Report(RunnerReportRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum GuestResponse {
    Bootstrap(BootstrapResponse),
    Report(RunnerReportResponse),
    Error(ErrorEnvelope),
}
