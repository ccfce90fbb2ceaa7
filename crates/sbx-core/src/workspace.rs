// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace identifier — a persistent attached volume that survives
//! sandbox destruction. Distinct from a sandbox: a workspace's lifetime
//! is independent of any one sandbox attaching to it.

use crate::vmid::Vmid;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a workspace instance.
    pub struct WorkspaceId("wks-");
}

/// A persistent volume, backed by a hypervisor-level volume id on a given storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    pub storage: String,
    pub volid: String,
    pub size_gb: u32,
    pub attached_vmid: Option<Vmid>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Workspace {
    pub fn new(
        name: impl Into<String>,
        storage: impl Into<String>,
        volid: impl Into<String>,
        size_gb: u32,
        now_ms: u64,
    ) -> Self {
        Self {
            id: WorkspaceId::new(),
            name: name.into(),
            storage: storage.into(),
            volid: volid.into(),
            size_gb,
            attached_vmid: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached_vmid.is_some()
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct WorkspaceBuilder => Workspace {
        into {
            name: String = "ws-1",
            storage: String = "local-zfs",
            volid: String = "local-zfs:vm-9000-ws",
        }
        set {
            id: WorkspaceId = WorkspaceId::new(),
            size_gb: u32 = 10,
            attached_vmid: Option<Vmid> = None,
            created_at_ms: u64 = 0,
            updated_at_ms: u64 = 0,
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
