// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The abstract hypervisor backend contract.
//!
//! One production implementation shells out to the hypervisor's CLI
//! (see [`crate::shell_backend::ShellBackend`]); tests use
//! [`crate::fake_backend::FakeBackend`]. Neither the sandbox manager
//! nor the job orchestrator know which one they're talking to.

use async_trait::async_trait;
use sbx_core::{Vmid, VmConfig};
use thiserror::Error;

/// Live status of a VM as reported by the hypervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VmStatus {
    Running,
    Stopped,
    #[default]
    Unknown,
}

/// CPU/resource snapshot for the idle stopper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VmStats {
    pub cpu_usage: f64,
}

#[derive(Debug, Error, Clone)]
pub enum BackendError {
    /// Distinguished so callers can treat it as success on best-effort paths
    /// (Stop/Destroy/Detach all tolerate a VM that's already gone).
    #[error("vm {0} not found")]
    VmNotFound(Vmid),
    #[error("guest ip not found for vm {0}")]
    GuestIpNotFound(Vmid),
    #[error("snapshot missing: {0}")]
    SnapshotMissing(String),
    #[error("template {0} invalid")]
    InvalidTemplate(Vmid),
    #[error("operation timed out")]
    Timeout,
    #[error("backend error: {0}")]
    Other(String),
}

impl BackendError {
    pub fn is_vm_not_found(&self) -> bool {
        matches!(self, BackendError::VmNotFound(_))
    }
}

/// The hypervisor driver contract from spec section 6.
///
/// `ErrVMNotFound` (here [`BackendError::VmNotFound`]) is treated as
/// success by `Stop`/`Destroy`/`DetachVolume` callers — the trait
/// itself still reports it; the sandbox manager performs the
/// downgrade-to-success.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn validate_template(&self, vmid: Vmid) -> Result<(), BackendError>;
    async fn clone_vm(&self, template_vmid: Vmid, new_vmid: Vmid, name: &str) -> Result<(), BackendError>;
    async fn configure(&self, vmid: Vmid, cfg: &VmConfig) -> Result<(), BackendError>;
    async fn start(&self, vmid: Vmid) -> Result<(), BackendError>;
    async fn stop(&self, vmid: Vmid) -> Result<(), BackendError>;
    async fn destroy(&self, vmid: Vmid) -> Result<(), BackendError>;
    async fn status(&self, vmid: Vmid) -> Result<VmStatus, BackendError>;
    async fn guest_ip(&self, vmid: Vmid) -> Result<String, BackendError>;
    async fn current_stats(&self, vmid: Vmid) -> Result<VmStats, BackendError>;
    async fn snapshot_rollback(&self, vmid: Vmid, name: &str) -> Result<(), BackendError>;
    async fn create_volume(&self, storage: &str, id: &str, size_gb: u32) -> Result<String, BackendError>;
    async fn delete_volume(&self, volid: &str) -> Result<(), BackendError>;
    async fn attach_volume(&self, vmid: Vmid, volid: &str, slot: &str) -> Result<(), BackendError>;
    async fn detach_volume(&self, vmid: Vmid, slot: &str) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vm_not_found_is_recognized() {
        assert!(BackendError::VmNotFound(Vmid(9000)).is_vm_not_found());
        assert!(!BackendError::Timeout.is_vm_not_found());
    }
}
