// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-facing request/response DTOs, carried over the framing in
//! [`crate::framing`] on the daemon's operator socket.
//!
//! This is the ambient CLI surface SPEC_FULL.md section C calls for —
//! not itself part of spec.md's core, but the thin front end needed to
//! exercise it, in the same `#[serde(tag = "type")]` shape `oj-wire`
//! uses for its own `Request`/`Response`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Version handshake.
    Hello { version: String },
    /// Daemon uptime + counts of sandboxes by state + active job count.
    Status,

    JobCreate {
        repo_url: String,
        profile: String,
        task: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        git_ref: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ttl_minutes: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keepalive: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workspace: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    JobShow { id: String },
    JobList,

    SandboxList,
    SandboxShow { vmid: u32 },
    SandboxStart { vmid: u32 },
    SandboxStop { vmid: u32 },
    SandboxRevert { vmid: u32, #[serde(default)] force: bool, #[serde(default)] restart: Option<bool> },
    SandboxDestroy { vmid: u32 },

    WorkspaceCreate { name: String, storage: String, size_gb: u32 },
    WorkspaceAttach { workspace: String, vmid: u32 },
    WorkspaceDetach { workspace: String },
    WorkspaceList,

    ExposurePublish { name: String, vmid: u32, port: u16 },
    ExposureUnpublish { name: String, port: u16 },
    ExposureList,

    EventsTail { since_id: u64, limit: usize },

    /// Drain background loops and close listeners; never destroys a sandbox.
    Shutdown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Present only for 4xx; must be empty for 5xx (spec section 7).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SandboxSummary {
    pub vmid: u32,
    pub name: String,
    pub profile: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    pub keepalive: bool,
    pub lease_expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSummary {
    pub id: String,
    pub repo_url: String,
    pub profile: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_vmid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkspaceSummary {
    pub id: String,
    pub name: String,
    pub storage: String,
    pub size_gb: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attached_vmid: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExposureSummary {
    pub name: String,
    pub vmid: u32,
    pub port: u16,
    pub url: String,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventSummary {
    pub id: u64,
    pub ts: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub message: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSummary {
    pub version: String,
    pub uptime_seconds: u64,
    pub sandboxes_by_state: HashMap<String, u64>,
    pub active_jobs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Hello { version: String },
    Status(StatusSummary),
    Job(JobSummary),
    Jobs(Vec<JobSummary>),
    Sandbox(SandboxSummary),
    Sandboxes(Vec<SandboxSummary>),
    Workspace(WorkspaceSummary),
    Workspaces(Vec<WorkspaceSummary>),
    Exposure(ExposureSummary),
    Exposures(Vec<ExposureSummary>),
    Events(Vec<EventSummary>),
    Ok,
    Error(ErrorEnvelope),
}
