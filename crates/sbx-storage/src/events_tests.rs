// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sbx_core::{EventKind, Vmid};

#[test]
fn appended_events_get_monotonic_ids() {
    let store = Store::new();
    let a = store.append_event(EventKind::ArtifactGc, "swept 3", None, None, serde_json::Value::Null, 1);
    let b = store.append_event(EventKind::ArtifactGc, "swept 1", None, None, serde_json::Value::Null, 2);
    assert_eq!(a.id, 1);
    assert_eq!(b.id, 2);
    assert_eq!(store.last_event_id(), 2);
}

#[test]
fn list_events_respects_since_id_and_limit() {
    let store = Store::new();
    for i in 0..5 {
        store.append_event(EventKind::ArtifactGc, format!("sweep {i}"), None, None, serde_json::Value::Null, i);
    }
    let page = store.list_events(2, 2);
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, 3);
    assert_eq!(page[1].id, 4);
}

#[test]
fn list_events_empty_when_store_is_fresh() {
    let store = Store::new();
    assert!(store.list_events(0, 100).is_empty());
    assert_eq!(store.last_event_id(), 0);
}

#[test]
fn transition_sandbox_event_and_standalone_event_share_the_same_sequence() {
    use sbx_core::{FakeClock, Sandbox, SandboxState};
    let store = Store::new();
    store.insert_sandbox(Sandbox::builder().vmid(Vmid(9000)).build()).unwrap();
    let clock = FakeClock::new();
    store.transition_sandbox(Vmid(9000), SandboxState::Provisioning, &clock).unwrap();
    let standalone =
        store.append_event(EventKind::ArtifactGc, "swept 0", None, None, serde_json::Value::Null, 1);
    assert_eq!(standalone.id, 2);
}
