// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use sbx_core::{SandboxState, Vmid};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("sandbox {0} not found")]
    SandboxNotFound(Vmid),
    #[error("vmid {0} already exists")]
    VmidAlreadyExists(Vmid),
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: SandboxState, to: SandboxState },
    #[error("job {0} not found")]
    JobNotFound(String),
    #[error("job already finalized")]
    JobAlreadyFinalized,
    #[error("another non-terminal job is already bound to vmid {0}")]
    SandboxAlreadyBound(Vmid),
    #[error("workspace {0} not found")]
    WorkspaceNotFound(String),
    #[error("workspace name already in use: {0}")]
    WorkspaceNameConflict(String),
    #[error("workspace already attached")]
    WorkspaceAttached,
    #[error("vmid already holds a workspace")]
    WorkspaceVmInUse,
    #[error("lease not renewable")]
    LeaseNotRenewable,
    #[error("unique constraint violated: {0}")]
    UniqueConstraint(String),
    #[error("exposure name already in use: {0}")]
    ExposureNameConflict(String),
    #[error("exposure {0} not found")]
    ExposureNotFound(String),
    #[error("artifact {0} not found")]
    ArtifactNotFound(String),
}
