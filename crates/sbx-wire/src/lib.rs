// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sbx-wire: the DTOs that cross a process boundary, and the framing
//! used to carry them.
//!
//! Spec section 1 puts "raw HTTP transport, request parsing, JSON
//! encoding, method/routing" out of scope — only endpoint *semantics*
//! are specified. This crate gives those semantics a concrete shape so
//! `sbx-cli` has something to call and `sbx-daemon`'s guest-facing
//! handlers have something to decode, without pretending to be a full
//! HTTP stack: framing is 4-byte big-endian length prefix + JSON, the
//! same wire format `oj-wire` uses for its operator socket (see
//! DESIGN.md for why we generalized it to the guest-facing listener too
//! instead of inventing a second transport).

mod bootstrap;
mod framing;
mod guest;
mod operator;
mod report;
mod timestamp;

pub use bootstrap::{
    ArtifactWire, BootstrapRequest, BootstrapResponse, GitWire, JobWire, PolicyWire,
};
pub use framing::{decode, encode, read_message, write_message, ProtocolError};
pub use guest::{GuestRequest, GuestResponse};
pub use operator::{
    ErrorEnvelope, EventSummary, ExposureSummary, JobSummary, Request, Response, SandboxSummary,
    StatusSummary, WorkspaceSummary,
};
pub use report::{ArtifactReportEntry, RunnerReportRequest, RunnerReportResponse};
pub use timestamp::to_rfc3339_nano;
