// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact table operations. Pure bookkeeping — the actual file removal
//! for GC happens in `sbx-daemon`, which owns the artifact root path.

use crate::error::StoreError;
use crate::state::Store;
use sbx_core::{Artifact, ArtifactId, JobId, Vmid};

impl Store {
    pub fn insert_artifact(&self, artifact: Artifact) {
        let mut state = self.state.lock();
        state.artifacts.insert(artifact.id.clone(), artifact);
    }

    pub fn get_artifact(&self, id: &ArtifactId) -> Option<Artifact> {
        self.state.lock().artifacts.get(id).cloned()
    }

    pub fn list_artifacts_for_job(&self, job_id: &JobId) -> Vec<Artifact> {
        self.state.lock().artifacts.values().filter(|a| &a.job_id == job_id).cloned().collect()
    }

    pub fn list_artifacts(&self) -> Vec<Artifact> {
        self.state.lock().artifacts.values().cloned().collect()
    }

    pub fn delete_artifact(&self, id: &ArtifactId) -> Result<Artifact, StoreError> {
        let mut state = self.state.lock();
        state.artifacts.remove(id).ok_or_else(|| StoreError::ArtifactNotFound(id.to_string()))
    }

    /// Sandbox vmid an artifact belongs to, if still recorded.
    pub fn artifact_sandbox_vmid(&self, id: &ArtifactId) -> Option<Vmid> {
        self.state.lock().artifacts.get(id).and_then(|a| a.vmid)
    }
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
