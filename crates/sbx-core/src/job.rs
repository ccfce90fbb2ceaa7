// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier, status, and the request record.

use crate::vmid::Vmid;
use crate::workspace::WorkspaceId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a job instance.
    pub struct JobId("job-");
}

/// Terminal/non-terminal status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Timeout,
}

crate::simple_display! {
    JobStatus {
        Queued => "QUEUED",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Timeout => "TIMEOUT",
    }
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Timeout)
    }

    /// Parse a guest-reported status string (spec section 6's runner report
    /// shape). `QUEUED` is deliberately not accepted here — only a status a
    /// guest can legitimately report.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(JobStatus::Running),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            "TIMEOUT" => Some(JobStatus::Timeout),
            _ => None,
        }
    }
}

/// Guest policy widening: `dangerous` loosens the default inner-sandbox policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    #[default]
    Normal,
    Dangerous,
}

crate::simple_display! {
    JobMode {
        Normal => "normal",
        Dangerous => "dangerous",
    }
}

/// A request to run a task in a sandbox cloned from a profile's template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub repo_url: String,
    pub git_ref: Option<String>,
    pub profile: String,
    pub task: String,
    pub mode: JobMode,
    /// 0 means "inherit profile default" until orchestration resolves it.
    pub ttl_minutes: u32,
    pub keepalive: Option<bool>,
    pub workspace_id: Option<WorkspaceId>,
    pub session_id: Option<String>,
    pub status: JobStatus,
    pub sandbox_vmid: Option<Vmid>,
    /// Serialized `{status, message, artifacts, result, reported_at}` payload,
    /// set once the job leaves QUEUED/RUNNING for a terminal status.
    pub result: Option<serde_json::Value>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Job {
    pub fn new(
        repo_url: impl Into<String>,
        profile: impl Into<String>,
        task: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            id: JobId::new(),
            repo_url: repo_url.into(),
            git_ref: None,
            profile: profile.into(),
            task: task.into(),
            mode: JobMode::Normal,
            ttl_minutes: 0,
            keepalive: None,
            workspace_id: None,
            session_id: None,
            status: JobStatus::Queued,
            sandbox_vmid: None,
            result: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct JobBuilder => Job {
        into {
            repo_url: String = "https://example.com/r.git",
            profile: String = "default",
            task: String = "do the thing",
        }
        set {
            id: JobId = JobId::new(),
            git_ref: Option<String> = None,
            mode: JobMode = JobMode::Normal,
            ttl_minutes: u32 = 0,
            keepalive: Option<bool> = None,
            workspace_id: Option<WorkspaceId> = None,
            session_id: Option<String> = None,
            status: JobStatus = JobStatus::Queued,
            sandbox_vmid: Option<Vmid> = None,
            result: Option<serde_json::Value> = None,
            created_at_ms: u64 = 0,
            updated_at_ms: u64 = 0,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
