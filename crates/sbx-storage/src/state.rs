// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized in-memory tables and the lock that makes them atomic.

use parking_lot::Mutex;
use sbx_core::{
    Artifact, ArtifactId, ArtifactToken, BootstrapToken, Event, Exposure, Job, Sandbox, Vmid,
    Workspace, WorkspaceId,
};
use std::collections::HashMap;
use std::sync::Arc;

/// The logical tables from spec section 6, held in memory.
#[derive(Default)]
pub struct MaterializedState {
    pub(crate) sandboxes: HashMap<Vmid, Sandbox>,
    pub(crate) jobs: HashMap<String, Job>,
    pub(crate) workspaces: HashMap<WorkspaceId, Workspace>,
    pub(crate) workspace_names: HashMap<String, WorkspaceId>,
    pub(crate) bootstrap_tokens: HashMap<(String, Vmid), BootstrapToken>,
    pub(crate) artifact_tokens: HashMap<String, ArtifactToken>,
    pub(crate) artifacts: HashMap<ArtifactId, Artifact>,
    pub(crate) events: Vec<Event>,
    pub(crate) next_event_id: u64,
    pub(crate) exposures: HashMap<String, Exposure>,
}

/// The store every component mutates persistent state through.
///
/// Cloning a `Store` shares the same underlying state (it is an `Arc`
/// handle), matching the teacher's `Arc<Mutex<MaterializedState>>`
/// shared between the executor and the runtime's background tasks.
#[derive(Clone, Default)]
pub struct Store {
    pub(crate) state: Arc<Mutex<MaterializedState>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot every sandbox, for the reconciler/lease-GC scan loops.
    pub fn snapshot_sandboxes(&self) -> Vec<Sandbox> {
        self.state.lock().sandboxes.values().cloned().collect()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
