// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent per-tenant volume lifecycle, independent of any one
//! sandbox's lifetime (spec section 4.3).
//!
//! Operates only on the store and the backend — never the sandbox
//! manager — so the two managers can't form a cycle; `WorkspaceManager`
//! is a field of `SandboxManager`, never the reverse.

use crate::event_recorder::EventRecorder;
use sbx_adapters::Backend;
use sbx_core::{Clock, EventKind, OrchestratorError, Vmid, Workspace, WorkspaceId};
use sbx_storage::{Store, StoreError};
use std::sync::Arc;

pub struct WorkspaceManager<C: Clock> {
    store: Store,
    backend: Arc<dyn Backend>,
    events: EventRecorder<C>,
    clock: C,
}

impl<C: Clock> WorkspaceManager<C> {
    pub fn new(store: Store, backend: Arc<dyn Backend>, events: EventRecorder<C>, clock: C) -> Self {
        Self { store, backend, events, clock }
    }

    pub async fn create(
        &self,
        name: impl Into<String>,
        storage: impl Into<String>,
        size_gb: u32,
    ) -> Result<Workspace, OrchestratorError> {
        let name = name.into();
        let storage = storage.into();
        let now = self.clock.epoch_ms();
        let workspace = Workspace::new(name, storage.clone(), "", size_gb, now);
        let volid = self
            .backend
            .create_volume(&storage, workspace.id.as_str(), size_gb)
            .await
            .map_err(|e| OrchestratorError::Backend(e.to_string()))?;

        let mut workspace = workspace;
        workspace.volid = volid.clone();

        match self.store.create_workspace(workspace.clone()) {
            Ok(()) => Ok(workspace),
            Err(err) => {
                // Roll back the backend volume so we don't leak it.
                let _ = self.backend.delete_volume(&volid).await;
                Err(map_store_err(err))
            }
        }
    }

    pub fn resolve(&self, id_or_name: &str) -> Result<Workspace, OrchestratorError> {
        self.store
            .resolve_workspace(id_or_name)
            .ok_or_else(|| OrchestratorError::WorkspaceNotFound(id_or_name.to_string()))
    }

    pub async fn attach(&self, id_or_name: &str, vmid: Vmid) -> Result<Workspace, OrchestratorError> {
        let workspace = self.resolve(id_or_name)?;
        let now = self.clock.epoch_ms();

        self.backend
            .attach_volume(vmid, &workspace.volid, "scsi1")
            .await
            .map_err(|e| OrchestratorError::Backend(e.to_string()))?;

        match self.store.attach_workspace_to_sandbox(&workspace.id, vmid, now) {
            Ok(updated) => {
                self.events.record(
                    EventKind::WorkspaceLease,
                    format!("attached {} to vmid {vmid}", workspace.id),
                    Some(vmid),
                    None,
                    serde_json::Value::Null,
                );
                Ok(updated)
            }
            Err(err) => {
                // Keep the backend consistent with the store's refusal.
                let _ = self.backend.detach_volume(vmid, "scsi1").await;
                Err(map_store_err(err))
            }
        }
    }

    pub async fn detach(&self, id_or_name: &str) -> Result<(), OrchestratorError> {
        let workspace = self.resolve(id_or_name)?;
        let Some(vmid) = workspace.attached_vmid else {
            return Ok(());
        };
        self.backend
            .detach_volume(vmid, "scsi1")
            .await
            .or_else(|e| if e.is_vm_not_found() { Ok(()) } else { Err(e) })
            .map_err(|e| OrchestratorError::Backend(e.to_string()))?;

        let now = self.clock.epoch_ms();
        self.store.detach_workspace(&workspace.id, now).map_err(map_store_err)?;
        self.events.record(
            EventKind::WorkspaceLease,
            format!("detached {} from vmid {vmid}", workspace.id),
            Some(vmid),
            None,
            serde_json::Value::Null,
        );
        Ok(())
    }

    /// Detach whichever workspace (if any) is attached to `vmid`.
    pub async fn detach_from_vm(&self, vmid: Vmid) -> Result<(), OrchestratorError> {
        let Some(workspace) = self.store.list_workspaces().into_iter().find(|w| w.attached_vmid == Some(vmid))
        else {
            return Ok(());
        };
        self.detach(workspace.id.as_str()).await
    }
}

fn map_store_err(err: StoreError) -> OrchestratorError {
    match err {
        StoreError::WorkspaceNotFound(id) => OrchestratorError::WorkspaceNotFound(id),
        StoreError::WorkspaceAttached => OrchestratorError::WorkspaceAttached,
        StoreError::WorkspaceVmInUse => OrchestratorError::WorkspaceVmInUse,
        StoreError::WorkspaceNameConflict(name) => OrchestratorError::UniqueConstraint(name),
        other => OrchestratorError::Backend(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redactor::Redactor;
    use sbx_adapters::FakeBackend;
    use sbx_core::FakeClock;

    fn manager() -> (WorkspaceManager<FakeClock>, Store, Arc<FakeBackend>) {
        let store = Store::new();
        let backend = Arc::new(FakeBackend::new());
        let clock = FakeClock::new();
        let events = EventRecorder::new(store.clone(), Redactor::new(), clock.clone());
        (WorkspaceManager::new(store.clone(), backend.clone(), events, clock), store, backend)
    }

    #[tokio::test]
    async fn create_persists_workspace_with_backend_volid() {
        let (mgr, store, _backend) = manager();
        let ws = mgr.create("ws-alice", "local-zfs", 10).await.unwrap();
        assert!(ws.volid.starts_with("local-zfs:"));
        assert_eq!(store.get_workspace_by_name("ws-alice").unwrap().id, ws.id);
    }

    #[tokio::test]
    async fn attach_sets_both_pointers() {
        let (mgr, store, _backend) = manager();
        let ws = mgr.create("ws-alice", "local-zfs", 10).await.unwrap();
        store.insert_sandbox(sbx_core::Sandbox::builder().vmid(Vmid(9000)).build()).unwrap();

        mgr.attach(ws.id.as_str(), Vmid(9000)).await.unwrap();

        let sandbox = store.get_sandbox(Vmid(9000)).unwrap();
        assert_eq!(sandbox.workspace_id, Some(ws.id.clone()));
        let workspace = store.get_workspace_by_id(&ws.id).unwrap();
        assert_eq!(workspace.attached_vmid, Some(Vmid(9000)));
    }

    #[tokio::test]
    async fn attach_already_attached_elsewhere_fails_and_leaves_backend_consistent() {
        let (mgr, store, _backend) = manager();
        let ws = mgr.create("ws-alice", "local-zfs", 10).await.unwrap();
        store.insert_sandbox(sbx_core::Sandbox::builder().vmid(Vmid(9000)).build()).unwrap();
        store.insert_sandbox(sbx_core::Sandbox::builder().vmid(Vmid(9001)).build()).unwrap();
        mgr.attach(ws.id.as_str(), Vmid(9000)).await.unwrap();

        let err = mgr.attach(ws.id.as_str(), Vmid(9001)).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::WorkspaceAttached));
    }

    #[tokio::test]
    async fn detach_clears_both_pointers() {
        let (mgr, store, _backend) = manager();
        let ws = mgr.create("ws-alice", "local-zfs", 10).await.unwrap();
        store.insert_sandbox(sbx_core::Sandbox::builder().vmid(Vmid(9000)).build()).unwrap();
        mgr.attach(ws.id.as_str(), Vmid(9000)).await.unwrap();

        mgr.detach(ws.id.as_str()).await.unwrap();

        assert_eq!(store.get_sandbox(Vmid(9000)).unwrap().workspace_id, None);
        assert_eq!(store.get_workspace_by_id(&ws.id).unwrap().attached_vmid, None);
    }

    #[tokio::test]
    async fn detach_when_not_attached_is_a_no_op() {
        let (mgr, _store, _backend) = manager();
        let ws = mgr.create("ws-alice", "local-zfs", 10).await.unwrap();
        mgr.detach(ws.id.as_str()).await.unwrap();
    }

    #[tokio::test]
    async fn detach_from_vm_with_no_attachment_is_a_no_op() {
        let (mgr, _store, _backend) = manager();
        mgr.detach_from_vm(Vmid(9000)).await.unwrap();
    }
}
