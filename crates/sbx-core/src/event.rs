// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The append-only event log entry type.
//!
//! Events are never modified once recorded. `id` is assigned by the
//! store (monotonically increasing) at append time, not by the caller.

use crate::job::JobId;
use crate::vmid::Vmid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SandboxState,
    SandboxLease,
    SandboxStartCompleted,
    SandboxStartFailed,
    SandboxStopCompleted,
    SandboxStopFailed,
    SandboxDestroyCompleted,
    SandboxDestroyFailed,
    SandboxRevertStarted,
    SandboxRevertCompleted,
    SandboxRevertFailed,
    SandboxIdleStop,
    SandboxIpPending,
    JobRunning,
    JobReport,
    JobFailed,
    ExposureCreate,
    ExposureDelete,
    ArtifactGc,
    WorkspaceLease,
    BootstrapFetch,
}

crate::simple_display! {
    EventKind {
        SandboxState => "sandbox.state",
        SandboxLease => "sandbox.lease",
        SandboxStartCompleted => "sandbox.start.completed",
        SandboxStartFailed => "sandbox.start.failed",
        SandboxStopCompleted => "sandbox.stop.completed",
        SandboxStopFailed => "sandbox.stop.failed",
        SandboxDestroyCompleted => "sandbox.destroy.completed",
        SandboxDestroyFailed => "sandbox.destroy.failed",
        SandboxRevertStarted => "sandbox.revert.started",
        SandboxRevertCompleted => "sandbox.revert.completed",
        SandboxRevertFailed => "sandbox.revert.failed",
        SandboxIdleStop => "sandbox.idle_stop",
        SandboxIpPending => "sandbox.ip_pending",
        JobRunning => "job.running",
        JobReport => "job.report",
        JobFailed => "job.failed",
        ExposureCreate => "exposure.create",
        ExposureDelete => "exposure.delete",
        ArtifactGc => "artifact.gc",
        WorkspaceLease => "workspace.lease",
        BootstrapFetch => "bootstrap.fetch",
    }
}

/// An append-only log entry. `id` is 0 until the store assigns one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub ts_ms: u64,
    pub kind: EventKind,
    pub vmid: Option<Vmid>,
    pub job_id: Option<JobId>,
    pub message: String,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(kind: EventKind, message: impl Into<String>, now_ms: u64) -> Self {
        Self {
            id: 0,
            ts_ms: now_ms,
            kind,
            vmid: None,
            job_id: None,
            message: message.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_vmid(mut self, vmid: Vmid) -> Self {
        self.vmid = Some(vmid);
        self
    }

    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_has_unassigned_id() {
        let e = Event::new(EventKind::SandboxState, "REQUESTED -> PROVISIONING", 1000);
        assert_eq!(e.id, 0);
        assert_eq!(e.kind.to_string(), "sandbox.state");
    }

    #[test]
    fn builders_attach_vmid_and_job_id() {
        let e = Event::new(EventKind::JobReport, "m", 1)
            .with_vmid(Vmid(1))
            .with_job_id(JobId::from_string("job-x"));
        assert_eq!(e.vmid, Some(Vmid(1)));
        assert_eq!(e.job_id.as_ref().unwrap().as_str(), "job-x");
    }
}
