// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sbx-profile: YAML profile loading (spec section 3).
//!
//! A [`Profile`](sbx_core::Profile) is pure data owned by `sbx-core`;
//! this crate only owns turning a YAML document into one, preserving
//! its original text for the host-mount scan, and caching the result
//! by name for the lifetime of the process (spec section 9's "Open
//! question": profile reloads on SIGHUP are not specified, so we treat
//! profiles as immutable once loaded — see DESIGN.md).

mod loader;
mod store;

pub use loader::{load_dir, load_str, ProfileLoadError};
pub use store::ProfileStore;
