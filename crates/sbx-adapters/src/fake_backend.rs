// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`Backend`] used by sbx-daemon's own test suite and by
//! anything downstream that wants to exercise orchestration without a
//! real hypervisor.

use crate::backend::{Backend, BackendError, VmStats, VmStatus};
use async_trait::async_trait;
use parking_lot::Mutex;
use sbx_core::{Vmid, VmConfig};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct FakeVm {
    status: VmStatus,
    ip: Option<String>,
    cpu_usage: f64,
    snapshots: HashSet<String>,
    configured: bool,
}

#[derive(Default)]
struct FakeBackendState {
    valid_templates: HashSet<Vmid>,
    vms: HashMap<Vmid, FakeVm>,
    volumes: HashSet<String>,
    attachments: HashMap<(Vmid, String), String>,
    /// (op_name, call description) for assertions.
    calls: Vec<String>,
    /// One-shot forced errors consumed in FIFO order per op.
    forced_errors: HashMap<&'static str, VecDeque<BackendError>>,
}

/// A fully in-process stand-in for a hypervisor, with injectable failures.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeBackendState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_template(&self, vmid: Vmid) {
        self.state.lock().valid_templates.insert(vmid);
    }

    pub fn set_status(&self, vmid: Vmid, status: VmStatus) {
        self.state.lock().vms.entry(vmid).or_default().status = status;
    }

    pub fn set_ip(&self, vmid: Vmid, ip: impl Into<String>) {
        self.state.lock().vms.entry(vmid).or_default().ip = Some(ip.into());
    }

    pub fn set_cpu_usage(&self, vmid: Vmid, cpu_usage: f64) {
        self.state.lock().vms.entry(vmid).or_default().cpu_usage = cpu_usage;
    }

    pub fn add_snapshot(&self, vmid: Vmid, name: impl Into<String>) {
        self.state.lock().vms.entry(vmid).or_default().snapshots.insert(name.into());
    }

    /// Queue an error to be returned once by the next call to `op`.
    pub fn queue_error(&self, op: &'static str, err: BackendError) {
        self.state.lock().forced_errors.entry(op).or_default().push_back(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    fn take_forced(&self, state: &mut FakeBackendState, op: &'static str) -> Option<BackendError> {
        state.forced_errors.get_mut(op).and_then(|q| q.pop_front())
    }

    fn record(&self, state: &mut FakeBackendState, call: impl Into<String>) {
        state.calls.push(call.into());
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn validate_template(&self, vmid: Vmid) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("validate_template({vmid})"));
        if let Some(err) = self.take_forced(&mut state, "validate_template") {
            return Err(err);
        }
        if state.valid_templates.contains(&vmid) {
            Ok(())
        } else {
            Err(BackendError::InvalidTemplate(vmid))
        }
    }

    async fn clone_vm(&self, _template_vmid: Vmid, new_vmid: Vmid, _name: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("clone_vm({new_vmid})"));
        if let Some(err) = self.take_forced(&mut state, "clone_vm") {
            return Err(err);
        }
        state.vms.entry(new_vmid).or_default();
        Ok(())
    }

    async fn configure(&self, vmid: Vmid, _cfg: &VmConfig) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("configure({vmid})"));
        if let Some(err) = self.take_forced(&mut state, "configure") {
            return Err(err);
        }
        state.vms.entry(vmid).or_default().configured = true;
        Ok(())
    }

    async fn start(&self, vmid: Vmid) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("start({vmid})"));
        if let Some(err) = self.take_forced(&mut state, "start") {
            return Err(err);
        }
        if !state.vms.contains_key(&vmid) {
            return Err(BackendError::VmNotFound(vmid));
        }
        state.vms.get_mut(&vmid).unwrap().status = VmStatus::Running;
        Ok(())
    }

    async fn stop(&self, vmid: Vmid) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("stop({vmid})"));
        if let Some(err) = self.take_forced(&mut state, "stop") {
            return Err(err);
        }
        match state.vms.get_mut(&vmid) {
            Some(vm) => {
                vm.status = VmStatus::Stopped;
                Ok(())
            }
            None => Err(BackendError::VmNotFound(vmid)),
        }
    }

    async fn destroy(&self, vmid: Vmid) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("destroy({vmid})"));
        if let Some(err) = self.take_forced(&mut state, "destroy") {
            return Err(err);
        }
        if state.vms.remove(&vmid).is_none() {
            return Err(BackendError::VmNotFound(vmid));
        }
        Ok(())
    }

    async fn status(&self, vmid: Vmid) -> Result<VmStatus, BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("status({vmid})"));
        if let Some(err) = self.take_forced(&mut state, "status") {
            return Err(err);
        }
        Ok(state.vms.get(&vmid).map(|vm| vm.status).unwrap_or(VmStatus::Unknown))
    }

    async fn guest_ip(&self, vmid: Vmid) -> Result<String, BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("guest_ip({vmid})"));
        if let Some(err) = self.take_forced(&mut state, "guest_ip") {
            return Err(err);
        }
        state
            .vms
            .get(&vmid)
            .and_then(|vm| vm.ip.clone())
            .ok_or(BackendError::GuestIpNotFound(vmid))
    }

    async fn current_stats(&self, vmid: Vmid) -> Result<VmStats, BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("current_stats({vmid})"));
        if let Some(err) = self.take_forced(&mut state, "current_stats") {
            return Err(err);
        }
        Ok(VmStats { cpu_usage: state.vms.get(&vmid).map(|vm| vm.cpu_usage).unwrap_or(0.0) })
    }

    async fn snapshot_rollback(&self, vmid: Vmid, name: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("snapshot_rollback({vmid},{name})"));
        if let Some(err) = self.take_forced(&mut state, "snapshot_rollback") {
            return Err(err);
        }
        let has_snapshot = state.vms.get(&vmid).is_some_and(|vm| vm.snapshots.contains(name));
        if !has_snapshot {
            return Err(BackendError::SnapshotMissing(name.to_string()));
        }
        Ok(())
    }

    async fn create_volume(&self, storage: &str, id: &str, _size_gb: u32) -> Result<String, BackendError> {
        let mut state = self.state.lock();
        let volid = format!("{storage}:{id}");
        self.record(&mut state, format!("create_volume({volid})"));
        if let Some(err) = self.take_forced(&mut state, "create_volume") {
            return Err(err);
        }
        state.volumes.insert(volid.clone());
        Ok(volid)
    }

    async fn delete_volume(&self, volid: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("delete_volume({volid})"));
        if let Some(err) = self.take_forced(&mut state, "delete_volume") {
            return Err(err);
        }
        state.volumes.remove(volid);
        Ok(())
    }

    async fn attach_volume(&self, vmid: Vmid, volid: &str, slot: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("attach_volume({vmid},{volid},{slot})"));
        if let Some(err) = self.take_forced(&mut state, "attach_volume") {
            return Err(err);
        }
        state.attachments.insert((vmid, slot.to_string()), volid.to_string());
        Ok(())
    }

    async fn detach_volume(&self, vmid: Vmid, slot: &str) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        self.record(&mut state, format!("detach_volume({vmid},{slot})"));
        if let Some(err) = self.take_forced(&mut state, "detach_volume") {
            return Err(err);
        }
        if state.attachments.remove(&(vmid, slot.to_string())).is_none() {
            return Err(BackendError::VmNotFound(vmid));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_on_unknown_vm_is_vm_not_found() {
        let backend = FakeBackend::new();
        let err = backend.start(Vmid(9000)).await.unwrap_err();
        assert!(err.is_vm_not_found());
    }

    #[tokio::test]
    async fn clone_then_start_reports_running() {
        let backend = FakeBackend::new();
        backend.clone_vm(Vmid(9000), Vmid(9001), "sandbox-9001").await.unwrap();
        backend.start(Vmid(9001)).await.unwrap();
        assert_eq!(backend.status(Vmid(9001)).await.unwrap(), VmStatus::Running);
    }

    #[tokio::test]
    async fn queued_error_is_consumed_once() {
        let backend = FakeBackend::new();
        backend.allow_template(Vmid(9000));
        backend.queue_error("validate_template", BackendError::Timeout);

        assert!(matches!(
            backend.validate_template(Vmid(9000)).await,
            Err(BackendError::Timeout)
        ));
        assert!(backend.validate_template(Vmid(9000)).await.is_ok());
    }

    #[tokio::test]
    async fn snapshot_rollback_requires_named_snapshot() {
        let backend = FakeBackend::new();
        backend.clone_vm(Vmid(9000), Vmid(9001), "x").await.unwrap();
        let err = backend.snapshot_rollback(Vmid(9001), "clean").await.unwrap_err();
        assert!(matches!(err, BackendError::SnapshotMissing(_)));

        backend.add_snapshot(Vmid(9001), "clean");
        assert!(backend.snapshot_rollback(Vmid(9001), "clean").await.is_ok());
    }

    #[tokio::test]
    async fn attach_then_detach_round_trips() {
        let backend = FakeBackend::new();
        let volid = backend.create_volume("local-zfs", "ws-1", 10).await.unwrap();
        backend.attach_volume(Vmid(9000), &volid, "scsi1").await.unwrap();
        backend.detach_volume(Vmid(9000), "scsi1").await.unwrap();
        let err = backend.detach_volume(Vmid(9000), "scsi1").await.unwrap_err();
        assert!(err.is_vm_not_found());
    }

    #[tokio::test]
    async fn destroy_unknown_vm_is_vm_not_found() {
        let backend = FakeBackend::new();
        let err = backend.destroy(Vmid(9000)).await.unwrap_err();
        assert!(err.is_vm_not_found());
    }
}
