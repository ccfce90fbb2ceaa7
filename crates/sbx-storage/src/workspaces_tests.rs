// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sbx_core::{Vmid, Workspace};

#[test]
fn create_then_resolve_by_id_and_name() {
    let store = Store::new();
    let workspace = Workspace::builder().name("ws-alice").build();
    let id = workspace.id.clone();
    store.create_workspace(workspace).unwrap();

    assert_eq!(store.get_workspace_by_id(&id).unwrap().name, "ws-alice");
    assert_eq!(store.get_workspace_by_name("ws-alice").unwrap().id, id);
    assert_eq!(store.resolve_workspace(id.as_str()).unwrap().id, id);
    assert_eq!(store.resolve_workspace("ws-alice").unwrap().id, id);
}

#[test]
fn create_rejects_duplicate_name() {
    let store = Store::new();
    store.create_workspace(Workspace::builder().name("ws-alice").build()).unwrap();
    let err = store.create_workspace(Workspace::builder().name("ws-alice").build()).unwrap_err();
    assert_eq!(err, StoreError::WorkspaceNameConflict("ws-alice".to_string()));
}

#[test]
fn attach_then_detach_round_trips() {
    let store = Store::new();
    let workspace = Workspace::builder().name("ws-alice").build();
    let id = workspace.id.clone();
    store.create_workspace(workspace).unwrap();

    let attached = store.attach_workspace_to_sandbox(&id, Vmid(9000), 10).unwrap();
    assert_eq!(attached.attached_vmid, Some(Vmid(9000)));

    let detached = store.detach_workspace(&id, 20).unwrap();
    assert_eq!(detached.attached_vmid, None);
}

#[test]
fn attach_rejects_already_attached_workspace() {
    let store = Store::new();
    let workspace = Workspace::builder().name("ws-alice").build();
    let id = workspace.id.clone();
    store.create_workspace(workspace).unwrap();
    store.attach_workspace_to_sandbox(&id, Vmid(9000), 1).unwrap();

    let err = store.attach_workspace_to_sandbox(&id, Vmid(9001), 2).unwrap_err();
    assert_eq!(err, StoreError::WorkspaceAttached);
}

#[test]
fn attach_rejects_vmid_already_holding_different_workspace() {
    let store = Store::new();
    let first = Workspace::builder().name("ws-first").build();
    let first_id = first.id.clone();
    store.create_workspace(first).unwrap();
    store.attach_workspace_to_sandbox(&first_id, Vmid(9000), 1).unwrap();

    let second = Workspace::builder().name("ws-second").build();
    let second_id = second.id.clone();
    store.create_workspace(second).unwrap();
    let err = store.attach_workspace_to_sandbox(&second_id, Vmid(9000), 2).unwrap_err();
    assert_eq!(err, StoreError::WorkspaceVmInUse);
}

#[test]
fn detach_workspace_from_vmid_finds_attached_workspace() {
    let store = Store::new();
    let workspace = Workspace::builder().name("ws-alice").build();
    let id = workspace.id.clone();
    store.create_workspace(workspace).unwrap();
    store.attach_workspace_to_sandbox(&id, Vmid(9000), 1).unwrap();

    let detached = store.detach_workspace_from_vmid(Vmid(9000), 30).unwrap();
    assert_eq!(detached.id, id);
    assert_eq!(detached.attached_vmid, None);
}

#[test]
fn detach_workspace_from_vmid_with_no_match_returns_none() {
    let store = Store::new();
    assert!(store.detach_workspace_from_vmid(Vmid(9000), 1).is_none());
}

#[test]
fn attach_and_detach_update_the_sandbox_pointer_in_the_same_call() {
    let store = Store::new();
    let workspace = Workspace::builder().name("ws-alice").build();
    let id = workspace.id.clone();
    store.create_workspace(workspace).unwrap();
    store.insert_sandbox(sbx_core::Sandbox::builder().vmid(Vmid(9000)).build()).unwrap();

    store.attach_workspace_to_sandbox(&id, Vmid(9000), 1).unwrap();
    assert_eq!(store.get_sandbox(Vmid(9000)).unwrap().workspace_id, Some(id.clone()));

    store.detach_workspace(&id, 2).unwrap();
    assert_eq!(store.get_sandbox(Vmid(9000)).unwrap().workspace_id, None);
}
