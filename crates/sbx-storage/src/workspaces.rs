// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace table operations.

use crate::error::StoreError;
use crate::state::Store;
use sbx_core::{Vmid, Workspace, WorkspaceId};

impl Store {
    pub fn create_workspace(&self, workspace: Workspace) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.workspace_names.contains_key(&workspace.name) {
            return Err(StoreError::WorkspaceNameConflict(workspace.name));
        }
        state.workspace_names.insert(workspace.name.clone(), workspace.id.clone());
        state.workspaces.insert(workspace.id.clone(), workspace);
        Ok(())
    }

    pub fn get_workspace_by_id(&self, id: &WorkspaceId) -> Option<Workspace> {
        self.state.lock().workspaces.get(id).cloned()
    }

    pub fn get_workspace_by_name(&self, name: &str) -> Option<Workspace> {
        let state = self.state.lock();
        let id = state.workspace_names.get(name)?;
        state.workspaces.get(id).cloned()
    }

    /// Resolve a workspace reference that may be an id or a name, id first.
    pub fn resolve_workspace(&self, reference: &str) -> Option<Workspace> {
        let state = self.state.lock();
        if let Some(ws) = state.workspaces.get(&WorkspaceId::from_string(reference)) {
            return Some(ws.clone());
        }
        let id = state.workspace_names.get(reference)?;
        state.workspaces.get(id).cloned()
    }

    pub fn list_workspaces(&self) -> Vec<Workspace> {
        self.state.lock().workspaces.values().cloned().collect()
    }

    /// Atomically attach: both the workspace's `attached_vmid` and the
    /// sandbox's `workspace_id` are mutated under one lock acquisition, so
    /// no reader (reconciler, `SandboxShow`, `WorkspaceList`, a concurrent
    /// attach/detach) can observe the two pointers out of sync.
    pub fn attach_workspace_to_sandbox(
        &self,
        id: &WorkspaceId,
        vmid: Vmid,
        now_ms: u64,
    ) -> Result<Workspace, StoreError> {
        let mut state = self.state.lock();
        let already_attached_elsewhere =
            state.workspaces.values().any(|w| w.id != *id && w.attached_vmid == Some(vmid));
        if already_attached_elsewhere {
            return Err(StoreError::WorkspaceVmInUse);
        }
        let workspace = state.workspaces.get_mut(id).ok_or_else(|| StoreError::WorkspaceNotFound(id.to_string()))?;
        if workspace.is_attached() {
            return Err(StoreError::WorkspaceAttached);
        }
        workspace.attached_vmid = Some(vmid);
        workspace.updated_at_ms = now_ms;
        let workspace = workspace.clone();
        if let Some(sandbox) = state.sandboxes.get_mut(&vmid) {
            sandbox.workspace_id = Some(id.clone());
        }
        Ok(workspace)
    }

    /// Atomically detach, mirroring `attach_workspace_to_sandbox`: clears
    /// the workspace's `attached_vmid` and the sandbox's `workspace_id`
    /// under one lock acquisition.
    pub fn detach_workspace(&self, id: &WorkspaceId, now_ms: u64) -> Result<Workspace, StoreError> {
        let mut state = self.state.lock();
        let workspace = state.workspaces.get_mut(id).ok_or_else(|| StoreError::WorkspaceNotFound(id.to_string()))?;
        let vmid = workspace.attached_vmid;
        workspace.attached_vmid = None;
        workspace.updated_at_ms = now_ms;
        let workspace = workspace.clone();
        if let Some(vmid) = vmid {
            if let Some(sandbox) = state.sandboxes.get_mut(&vmid) {
                sandbox.workspace_id = None;
            }
        }
        Ok(workspace)
    }

    /// Detach whichever workspace (if any) is attached to `vmid`. Used when
    /// a sandbox is destroyed so its workspace doesn't stay marked in-use.
    pub fn detach_workspace_from_vmid(&self, vmid: Vmid, now_ms: u64) -> Option<Workspace> {
        let mut state = self.state.lock();
        let id = state
            .workspaces
            .values()
            .find(|w| w.attached_vmid == Some(vmid))
            .map(|w| w.id.clone())?;
        let workspace = state.workspaces.get_mut(&id)?;
        workspace.attached_vmid = None;
        workspace.updated_at_ms = now_ms;
        Some(workspace.clone())
    }
}

#[cfg(test)]
#[path = "workspaces_tests.rs"]
mod tests;
