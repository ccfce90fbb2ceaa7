// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error taxonomy from spec section 7, as one enum.
//!
//! Every variant here is surfaced distinctly rather than collapsed into
//! a string, so handler code can match on it to pick an HTTP status /
//! CLI exit code without string-sniffing a message.

use crate::job::JobId;
use crate::sandbox::SandboxState;
use crate::vmid::Vmid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    // --- NotFound ---
    #[error("sandbox {0} not found")]
    SandboxNotFound(Vmid),
    #[error("job {0} not found")]
    JobNotFound(JobId),
    #[error("workspace {0} not found")]
    WorkspaceNotFound(String),
    #[error("snapshot missing")]
    SnapshotMissing,
    #[error("serve rule not found")]
    ServeRuleNotFound,
    #[error("no job bound to sandbox {0}")]
    SandboxHasNoJob(Vmid),

    // --- InvalidTransition ---
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: SandboxState, to: SandboxState },

    // --- InUse ---
    #[error("sandbox in use by job {job_id}")]
    SandboxInUse { job_id: JobId },
    #[error("workspace already attached")]
    WorkspaceAttached,
    #[error("vmid already holds a workspace")]
    WorkspaceVmInUse,
    #[error("lease not renewable")]
    LeaseNotRenewable,

    // --- Conflict ---
    #[error("job already finalized")]
    JobAlreadyFinalized,
    #[error("job/sandbox mismatch")]
    JobSandboxMismatch,
    #[error("exposure name already in use")]
    ExposureNameConflict,
    #[error("unique constraint violated: {0}")]
    UniqueConstraint(String),

    // --- Validation ---
    #[error("port out of range: {0}")]
    InvalidPort(u32),
    #[error("ttl must be positive")]
    InvalidTtl,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("profile invalid: {0}")]
    ProfileInvalid(#[from] crate::profile::ProfileError),
    #[error("unknown profile: {0}")]
    UnknownProfile(String),
    #[error("invalid template vmid")]
    InvalidTemplate,
    #[error("invalid job status: {0}")]
    InvalidJobStatus(String),

    // --- Forbidden ---
    #[error("remote address outside the agent subnet")]
    OutsideAgentSubnet,
    #[error("bootstrap token invalid, expired, or already consumed")]
    InvalidBootstrapToken,
    #[error("rate limit exceeded")]
    RateLimited,

    // --- Backend passthrough ---
    #[error("backend error: {0}")]
    Backend(String),
    #[error("vm not found")]
    VmNotFound,

    // --- Timeout ---
    #[error("operation timed out")]
    Timeout,
}

impl OrchestratorError {
    /// Whether this error is safe to surface with `details` populated
    /// (4xx class); 5xx-class errors must carry an empty `details`.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OrchestratorError::SandboxNotFound(_)
                | OrchestratorError::JobNotFound(_)
                | OrchestratorError::WorkspaceNotFound(_)
                | OrchestratorError::SnapshotMissing
                | OrchestratorError::ServeRuleNotFound
                | OrchestratorError::SandboxHasNoJob(_)
                | OrchestratorError::InvalidTransition { .. }
                | OrchestratorError::SandboxInUse { .. }
                | OrchestratorError::WorkspaceAttached
                | OrchestratorError::WorkspaceVmInUse
                | OrchestratorError::LeaseNotRenewable
                | OrchestratorError::JobAlreadyFinalized
                | OrchestratorError::JobSandboxMismatch
                | OrchestratorError::ExposureNameConflict
                | OrchestratorError::UniqueConstraint(_)
                | OrchestratorError::InvalidPort(_)
                | OrchestratorError::InvalidTtl
                | OrchestratorError::InvalidJobStatus(_)
                | OrchestratorError::MissingField(_)
                | OrchestratorError::ProfileInvalid(_)
                | OrchestratorError::UnknownProfile(_)
                | OrchestratorError::InvalidTemplate
                | OrchestratorError::OutsideAgentSubnet
                | OrchestratorError::InvalidBootstrapToken
                | OrchestratorError::RateLimited
        )
    }
}
