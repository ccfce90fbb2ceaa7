// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sbx-storage: the single persistent store every component mutates through.
//!
//! Spec section 5 scopes the relational store's SQL out of this design
//! and asks only for specific atomicity guarantees (sandbox state CAS,
//! job status updates, workspace attach/detach, bootstrap-token
//! consume, artifact-token unique insert, monotonic event ids). A
//! single [`parking_lot::Mutex`]-guarded [`MaterializedState`] gives
//! all of those for free — this is intentionally not a WAL/event-replay
//! store (see DESIGN.md for why that part of the teacher was dropped).

mod error;
mod state;

pub mod artifacts;
pub mod events;
pub mod exposures;
pub mod jobs;
pub mod sandboxes;
pub mod tokens;
pub mod workspaces;

pub use error::StoreError;
pub use state::{MaterializedState, Store};
