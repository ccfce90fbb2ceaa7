// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single authority over sandbox state transitions and the
//! Start/Stop/Revert/Destroy lifecycle (spec section 4.1), plus the
//! Lease GC and Reconciler background loops it drives.

use crate::event_recorder::EventRecorder;
use crate::metrics::{Metrics, NoopMetrics, Outcome};
use crate::workspace_manager::WorkspaceManager;
use sbx_adapters::{Backend, BackendError, VmStatus};
use sbx_core::{Clock, EventKind, OrchestratorError, Sandbox, SandboxState, Vmid};
use sbx_storage::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const RECONCILER_IP_TIMEOUT: Duration = Duration::from_secs(2);

/// `force=false` (default) blocks a revert on a sandbox with an in-flight
/// job. `restart=None` means "restart iff the sandbox was running before
/// the revert", matching the VM's prior power state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevertOptions {
    pub force: bool,
    pub restart: Option<bool>,
}

pub struct SandboxManager<C: Clock, M: Metrics = NoopMetrics> {
    store: Store,
    backend: Arc<dyn Backend>,
    events: EventRecorder<C>,
    clock: C,
    metrics: M,
    pub workspaces: WorkspaceManager<C>,
}

fn map_store_err(err: StoreError) -> OrchestratorError {
    match err {
        StoreError::SandboxNotFound(vmid) => OrchestratorError::SandboxNotFound(vmid),
        StoreError::InvalidTransition { from, to } => OrchestratorError::InvalidTransition { from, to },
        StoreError::LeaseNotRenewable => OrchestratorError::LeaseNotRenewable,
        other => OrchestratorError::Backend(other.to_string()),
    }
}

/// `VmNotFound` is treated as success by Stop/Destroy/Detach callers.
fn tolerate_vm_not_found(result: Result<(), BackendError>) -> Result<(), OrchestratorError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_vm_not_found() => Ok(()),
        Err(e) => Err(OrchestratorError::Backend(e.to_string())),
    }
}

impl<C: Clock, M: Metrics> SandboxManager<C, M> {
    pub fn new(
        store: Store,
        backend: Arc<dyn Backend>,
        events: EventRecorder<C>,
        clock: C,
        metrics: M,
        workspaces: WorkspaceManager<C>,
    ) -> Self {
        Self { store, backend, events, clock, metrics, workspaces }
    }

    fn now(&self) -> u64 {
        self.clock.epoch_ms()
    }

    /// Load a sandbox; `SandboxNotFound` if it's absent or DESTROYED.
    pub fn load(&self, vmid: Vmid) -> Result<Sandbox, OrchestratorError> {
        self.store.get_sandbox(vmid).ok_or(OrchestratorError::SandboxNotFound(vmid))
    }

    pub fn transition(&self, vmid: Vmid, to: SandboxState) -> Result<Sandbox, OrchestratorError> {
        let before = self.store.get_sandbox(vmid).map(|s| s.state);
        let sandbox = self.store.transition_sandbox(vmid, to, &self.clock).map_err(map_store_err)?;
        if let Some(from) = before {
            self.metrics.record_transition(from, to);
            if to == SandboxState::Running {
                self.metrics.observe_provision_duration(Duration::from_millis(
                    sandbox.updated_at_ms.saturating_sub(sandbox.created_at_ms),
                ));
            }
        }
        Ok(sandbox)
    }

    pub fn renew_lease(&self, vmid: Vmid, ttl: Duration) -> Result<Sandbox, OrchestratorError> {
        let expires_at = self.now() + ttl.as_millis() as u64;
        self.store.renew_lease(vmid, expires_at).map_err(map_store_err)?;
        self.load(vmid)
    }

    pub async fn start(&self, vmid: Vmid) -> Result<Sandbox, OrchestratorError> {
        let started = std::time::Instant::now();
        let result = self.start_inner(vmid).await;
        let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Failure };
        self.metrics.record_start(started.elapsed(), outcome);
        result
    }

    async fn start_inner(&self, vmid: Vmid) -> Result<Sandbox, OrchestratorError> {
        let sandbox = self.load(vmid)?;
        if matches!(sandbox.state, SandboxState::Running | SandboxState::Ready) {
            return Ok(sandbox);
        }
        if sandbox.state != SandboxState::Stopped {
            return Err(OrchestratorError::InvalidTransition { from: sandbox.state, to: SandboxState::Booting });
        }
        self.backend.start(vmid).await.map_err(|e| OrchestratorError::Backend(e.to_string()))?;
        self.ensure_sandbox_running(vmid).await
    }

    pub async fn stop(&self, vmid: Vmid) -> Result<Sandbox, OrchestratorError> {
        let started = std::time::Instant::now();
        let result = self.stop_inner(vmid).await;
        let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Failure };
        self.metrics.record_stop(started.elapsed(), outcome);
        result
    }

    async fn stop_inner(&self, vmid: Vmid) -> Result<Sandbox, OrchestratorError> {
        let sandbox = self.load(vmid)?;
        if !matches!(sandbox.state, SandboxState::Ready | SandboxState::Running) {
            return Err(OrchestratorError::InvalidTransition { from: sandbox.state, to: SandboxState::Stopped });
        }
        tolerate_vm_not_found(self.backend.stop(vmid).await)?;
        self.transition(vmid, SandboxState::Stopped)
    }

    /// Drive a sandbox one step at a time from its current state up to
    /// RUNNING, re-reading between steps so a concurrent actor's
    /// transition is observed rather than raced against.
    pub async fn ensure_sandbox_running(&self, vmid: Vmid) -> Result<Sandbox, OrchestratorError> {
        loop {
            let sandbox = self.load(vmid)?;
            if sandbox.state == SandboxState::Running {
                return Ok(sandbox);
            }
            // STOPPED skips straight to BOOTING — it can't re-enter
            // PROVISIONING (that column is REQUESTED-only in the transition table).
            let next = match sandbox.state {
                SandboxState::Requested => SandboxState::Provisioning,
                SandboxState::Provisioning | SandboxState::Stopped => SandboxState::Booting,
                SandboxState::Booting => SandboxState::Ready,
                SandboxState::Ready => SandboxState::Running,
                other => {
                    return Err(OrchestratorError::InvalidTransition { from: other, to: SandboxState::Running })
                }
            };
            match self.transition(vmid, next) {
                Ok(_) => continue,
                Err(OrchestratorError::InvalidTransition { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn revert(&self, vmid: Vmid, opts: RevertOptions) -> Result<Sandbox, OrchestratorError> {
        let started = std::time::Instant::now();
        self.events.record(EventKind::SandboxRevertStarted, "revert started", Some(vmid), None, serde_json::Value::Null);
        let result = self.revert_inner(vmid, opts).await;
        let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Failure };
        self.metrics.record_revert(started.elapsed(), outcome);
        match &result {
            Ok(_) => {
                self.events.record(EventKind::SandboxRevertCompleted, "revert completed", Some(vmid), None, serde_json::Value::Null);
            }
            Err(e) => {
                self.events.record(
                    EventKind::SandboxRevertFailed,
                    format!("revert failed: {e}"),
                    Some(vmid),
                    None,
                    serde_json::Value::Null,
                );
            }
        }
        result
    }

    async fn revert_inner(&self, vmid: Vmid, opts: RevertOptions) -> Result<Sandbox, OrchestratorError> {
        if !opts.force {
            let in_use = self.store.list_non_terminal_jobs_for(vmid).into_iter().find(|j| {
                matches!(j.status, sbx_core::JobStatus::Queued | sbx_core::JobStatus::Running)
            });
            if let Some(job) = in_use {
                return Err(OrchestratorError::SandboxInUse { job_id: job.id });
            }
        }

        let status = self.backend.status(vmid).await.map_err(|e| OrchestratorError::Backend(e.to_string()))?;
        let was_running = status == VmStatus::Running
            || (status == VmStatus::Unknown && self.load(vmid)?.state == SandboxState::Running);

        if was_running {
            tolerate_vm_not_found(self.backend.stop(vmid).await)?;
        }

        self.backend.snapshot_rollback(vmid, "clean").await.map_err(|e| match e {
            BackendError::SnapshotMissing(_) => OrchestratorError::SnapshotMissing,
            other => OrchestratorError::Backend(other.to_string()),
        })?;

        // Force, not the checked `transition`: Revert exists precisely to
        // recover sandboxes stuck in BOOTING/PROVISIONING, and those have no
        // arm to STOPPED in the transition table.
        let sandbox = self
            .store
            .force_stop(vmid, self.now())
            .ok_or(OrchestratorError::SandboxNotFound(vmid))?;

        let should_restart = opts.restart.unwrap_or(was_running);
        if should_restart {
            self.start(vmid).await
        } else {
            Ok(sandbox)
        }
    }

    pub async fn destroy(&self, vmid: Vmid) -> Result<Sandbox, OrchestratorError> {
        let started = std::time::Instant::now();
        let result = self.destroy_inner(vmid).await;
        let outcome = if result.is_ok() { Outcome::Success } else { Outcome::Failure };
        self.metrics.record_destroy(started.elapsed(), outcome);
        match &result {
            Ok(_) => self.events.record(
                EventKind::SandboxDestroyCompleted,
                "destroy completed",
                Some(vmid),
                None,
                serde_json::Value::Null,
            ),
            Err(e) => self.events.record(
                EventKind::SandboxDestroyFailed,
                format!("destroy failed: {e}"),
                Some(vmid),
                None,
                serde_json::Value::Null,
            ),
        };
        result
    }

    async fn destroy_inner(&self, vmid: Vmid) -> Result<Sandbox, OrchestratorError> {
        // Best-effort: an already-stopped or already-gone VM is fine.
        let _ = self.backend.stop(vmid).await;
        self.workspaces.detach_from_vm(vmid).await?;
        tolerate_vm_not_found(self.backend.destroy(vmid).await)?;
        self.transition(vmid, SandboxState::Destroyed)
    }

    /// Bypasses the transition table entirely; used by recovery paths
    /// where the sandbox's recorded state can no longer be trusted.
    pub async fn force_destroy(&self, vmid: Vmid) -> Result<(), OrchestratorError> {
        let _ = self.backend.stop(vmid).await;
        let _ = self.workspaces.detach_from_vm(vmid).await;
        let _ = self.backend.destroy(vmid).await;
        self.store.force_destroy(vmid, self.now());
        Ok(())
    }

    /// Destroys every sandbox in TIMEOUT; returns how many were pruned.
    pub async fn prune_orphans(&self) -> usize {
        let mut pruned = 0;
        for sandbox in self.store.list_sandboxes() {
            if sandbox.state != SandboxState::Timeout {
                continue;
            }
            if let Err(err) = tolerate_vm_not_found(self.backend.destroy(sandbox.vmid).await) {
                warn!(vmid = %sandbox.vmid, %err, "prune_orphans: backend destroy failed");
                continue;
            }
            if self.transition(sandbox.vmid, SandboxState::Destroyed).is_ok() {
                pruned += 1;
            }
        }
        pruned
    }

    /// One tick of the lease GC loop (spec section 4.1): expire every
    /// sandbox whose lease has passed. Best-effort-continue on any
    /// individual failure so one bad sandbox never blocks the sweep.
    pub async fn run_lease_gc_once(&self) {
        let now = self.now();
        for sandbox in self.store.list_sandboxes() {
            if !sandbox.has_lease() || sandbox.lease_expires_at_ms >= now {
                continue;
            }
            debug!(vmid = %sandbox.vmid, "lease expired");
            if !sandbox.state.is_terminal() {
                let _ = self.transition(sandbox.vmid, SandboxState::Timeout);
            }
            let _ = tolerate_vm_not_found(self.backend.stop(sandbox.vmid).await);
            let _ = self.workspaces.detach_from_vm(sandbox.vmid).await;
            let _ = tolerate_vm_not_found(self.backend.destroy(sandbox.vmid).await);
            let _ = self.transition(sandbox.vmid, SandboxState::Destroyed);
        }
    }

    /// One tick of the reconciler loop (spec section 4.1). Never advances
    /// a sandbox past READY on its own — RUNNING only comes from the
    /// provisioner or the report path (testable property 8).
    pub async fn run_reconciler_once(&self) {
        for sandbox in self.store.list_sandboxes() {
            let status = match self.backend.status(sandbox.vmid).await {
                Ok(s) => s,
                Err(e) if e.is_vm_not_found() => {
                    if !matches!(sandbox.state, SandboxState::Destroyed | SandboxState::Requested) {
                        let _ = self.transition(sandbox.vmid, SandboxState::Destroyed);
                    }
                    continue;
                }
                Err(err) => {
                    warn!(vmid = %sandbox.vmid, %err, "reconciler: backend status failed");
                    continue;
                }
            };

            if status == VmStatus::Stopped && sandbox.state == SandboxState::Running {
                let _ = self.transition(sandbox.vmid, SandboxState::Failed);
                continue;
            }

            if status == VmStatus::Running {
                let next = match sandbox.state {
                    SandboxState::Requested => Some(SandboxState::Provisioning),
                    SandboxState::Provisioning => Some(SandboxState::Booting),
                    SandboxState::Booting => Some(SandboxState::Ready),
                    _ => None,
                };
                if let Some(next) = next {
                    let _ = self.transition(sandbox.vmid, next);
                }

                if sandbox.ip.is_none() {
                    match tokio::time::timeout(RECONCILER_IP_TIMEOUT, self.backend.guest_ip(sandbox.vmid)).await {
                        Ok(Ok(ip)) if !ip.is_empty() => {
                            self.store.update_sandbox_ip(sandbox.vmid, ip, self.now());
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
