// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sbx_core::{Sandbox, SandboxState, Vmid};

#[test]
fn new_store_has_no_sandboxes() {
    let store = Store::new();
    assert!(store.snapshot_sandboxes().is_empty());
}

#[test]
fn clone_shares_underlying_state() {
    let store = Store::new();
    let clone = store.clone();
    store.insert_sandbox(Sandbox::builder().vmid(Vmid(9000)).build()).unwrap();
    assert_eq!(clone.snapshot_sandboxes().len(), 1);
}

#[test]
fn snapshot_includes_destroyed_sandboxes() {
    let store = Store::new();
    store
        .insert_sandbox(Sandbox::builder().vmid(Vmid(9000)).state(SandboxState::Destroyed).build())
        .unwrap();
    assert_eq!(store.snapshot_sandboxes().len(), 1);
    assert!(store.get_sandbox(Vmid(9000)).is_none());
}
