// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job table operations.

use crate::error::StoreError;
use crate::state::Store;
use sbx_core::{Job, JobId, JobStatus, Vmid};

impl Store {
    pub fn insert_job(&self, job: Job) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.jobs.insert(job.id.as_str().to_string(), job);
        Ok(())
    }

    pub fn get_job(&self, id: &JobId) -> Option<Job> {
        self.state.lock().jobs.get(id.as_str()).cloned()
    }

    pub fn list_jobs(&self) -> Vec<Job> {
        self.state.lock().jobs.values().cloned().collect()
    }

    /// Jobs bound to a sandbox that have not yet reached a terminal status.
    pub fn list_non_terminal_jobs_for(&self, vmid: Vmid) -> Vec<Job> {
        self.state
            .lock()
            .jobs
            .values()
            .filter(|j| j.sandbox_vmid == Some(vmid) && !j.status.is_terminal())
            .cloned()
            .collect()
    }

    /// The non-terminal job currently bound to `vmid`, if any. At most one
    /// can exist per the sandbox-binding invariant.
    pub fn job_for_sandbox(&self, vmid: Vmid) -> Option<Job> {
        self.list_non_terminal_jobs_for(vmid).into_iter().next()
    }

    /// Bind a queued job to a sandbox. Fails if the sandbox already has a
    /// different non-terminal job bound to it — at most one in-flight job
    /// per sandbox, per spec.
    pub fn bind_job_sandbox(&self, id: &JobId, vmid: Vmid, now_ms: u64) -> Result<Job, StoreError> {
        let mut state = self.state.lock();
        let conflict = state
            .jobs
            .values()
            .any(|j| j.id != *id && j.sandbox_vmid == Some(vmid) && !j.status.is_terminal());
        if conflict {
            return Err(StoreError::SandboxAlreadyBound(vmid));
        }
        let job = state.jobs.get_mut(id.as_str()).ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;
        job.sandbox_vmid = Some(vmid);
        job.updated_at_ms = now_ms;
        Ok(job.clone())
    }

    /// Persist ttl_minutes/keepalive once the provisioning pipeline has
    /// resolved them against profile defaults (spec section 4.2 step 4).
    pub fn set_job_defaults(
        &self,
        id: &JobId,
        ttl_minutes: u32,
        keepalive: bool,
        now_ms: u64,
    ) -> Result<Job, StoreError> {
        let mut state = self.state.lock();
        let job = state.jobs.get_mut(id.as_str()).ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;
        job.ttl_minutes = ttl_minutes;
        job.keepalive = Some(keepalive);
        job.updated_at_ms = now_ms;
        Ok(job.clone())
    }

    pub fn update_job_status(&self, id: &JobId, status: JobStatus, now_ms: u64) -> Result<Job, StoreError> {
        let mut state = self.state.lock();
        let job = state.jobs.get_mut(id.as_str()).ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;
        job.status = status;
        job.updated_at_ms = now_ms;
        Ok(job.clone())
    }

    /// Atomically set a terminal status and its result payload. Rejects if
    /// the job is already finalized — a runner report can only finalize a
    /// job once, per spec's report-is-idempotent-after-first-terminal rule.
    pub fn update_job_result(
        &self,
        id: &JobId,
        status: JobStatus,
        result: serde_json::Value,
        now_ms: u64,
    ) -> Result<Job, StoreError> {
        let mut state = self.state.lock();
        let job = state.jobs.get_mut(id.as_str()).ok_or_else(|| StoreError::JobNotFound(id.to_string()))?;
        if job.status.is_terminal() {
            return Err(StoreError::JobAlreadyFinalized);
        }
        job.status = status;
        job.result = Some(result);
        job.updated_at_ms = now_ms;
        Ok(job.clone())
    }
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
