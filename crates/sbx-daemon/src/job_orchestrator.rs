// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job provisioning pipeline and guest status reports (spec section 4.2).
//!
//! `JobOrchestrator` is the only component that drives a sandbox from
//! REQUESTED through to RUNNING on a job's behalf; everything else
//! (idle stopper, lease GC, reconciler) only ever moves a sandbox
//! *backwards* out of RUNNING.

use crate::config::DaemonConfig;
use crate::event_recorder::EventRecorder;
use crate::metrics::{Metrics, NoopMetrics};
use crate::redactor::Redactor;
use crate::sandbox_manager::SandboxManager;
use crate::snippet::{CloudInitSnippet, SnippetMap, SnippetWriter};
use crate::tokens::{random_hex_token, RandomSource};
use sbx_adapters::Backend;
use sbx_core::{
    hash_token, BootstrapToken, Clock, EventKind, Job, JobId, JobStatus, OrchestratorError, Profile,
    SandboxState, Sandbox, Vmid, VmConfig,
};
use sbx_profile::ProfileStore;
use sbx_storage::{Store, StoreError};
use sbx_wire::{to_rfc3339_nano, RunnerReportRequest, RunnerReportResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

fn map_store_err(err: StoreError) -> OrchestratorError {
    match err {
        StoreError::JobNotFound(id) => OrchestratorError::JobNotFound(JobId::from_string(id)),
        StoreError::JobAlreadyFinalized => OrchestratorError::JobAlreadyFinalized,
        StoreError::SandboxAlreadyBound(vmid) => OrchestratorError::SandboxInUse {
            job_id: JobId::from_string(format!("vmid-{vmid}")),
        },
        other => OrchestratorError::Backend(other.to_string()),
    }
}

pub struct JobOrchestrator<C: Clock, M: Metrics = NoopMetrics> {
    store: Store,
    backend: Arc<dyn Backend>,
    profiles: ProfileStore,
    sandboxes: Arc<SandboxManager<C, M>>,
    events: EventRecorder<C>,
    clock: C,
    config: Arc<DaemonConfig>,
    redactor: Redactor,
    snippets: Arc<SnippetMap>,
    snippet_writer: Arc<dyn SnippetWriter>,
    random: Arc<dyn RandomSource>,
}

impl<C: Clock, M: Metrics> Clone for JobOrchestrator<C, M> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            backend: self.backend.clone(),
            profiles: self.profiles.clone(),
            sandboxes: self.sandboxes.clone(),
            events: self.events.clone(),
            clock: self.clock.clone(),
            config: self.config.clone(),
            redactor: self.redactor.clone(),
            snippets: self.snippets.clone(),
            snippet_writer: self.snippet_writer.clone(),
            random: self.random.clone(),
        }
    }
}

impl<C: Clock, M: Metrics> JobOrchestrator<C, M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        backend: Arc<dyn Backend>,
        profiles: ProfileStore,
        sandboxes: Arc<SandboxManager<C, M>>,
        events: EventRecorder<C>,
        clock: C,
        config: Arc<DaemonConfig>,
        redactor: Redactor,
        snippets: Arc<SnippetMap>,
        snippet_writer: Arc<dyn SnippetWriter>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            store,
            backend,
            profiles,
            sandboxes,
            events,
            clock,
            config,
            redactor,
            snippets,
            snippet_writer,
            random,
        }
    }

    fn now(&self) -> u64 {
        self.clock.epoch_ms()
    }

    /// Fire-and-forget entry point: spawns a worker bounded by the
    /// configured provision timeout.
    pub fn start(&self, job_id: JobId) {
        let this = self.clone();
        tokio::spawn(async move {
            let budget = this.config.provision_timeout();
            if tokio::time::timeout(budget, this.run(job_id.clone())).await.is_err() {
                warn!(%job_id, "job provisioning timed out");
                this.fail_job(&job_id, OrchestratorError::Timeout).await;
            }
        });
    }

    /// Synchronous variant of [`Self::start`] for tests and direct callers.
    pub async fn run(&self, job_id: JobId) {
        match self.provision(&job_id).await {
            Ok(()) | Err(OrchestratorError::JobNotFound(_)) => {}
            Err(err) => self.fail_job(&job_id, err).await,
        }
    }

    /// Run the same provisioning pipeline for a sandbox with no job
    /// attached — used by operator-initiated sandbox creation.
    pub async fn provision_sandbox(&self, vmid: Vmid) -> Result<(), OrchestratorError> {
        let sandbox = self.sandboxes.load(vmid)?;
        let profile = self
            .profiles
            .get(&sandbox.profile)
            .ok_or_else(|| OrchestratorError::UnknownProfile(sandbox.profile.clone()))?
            .clone();
        self.backend.validate_template(Vmid(profile.template_vmid)).await.map_err(backend_err)?;
        self.provision_vm(vmid, &profile, None).await
    }

    async fn provision(&self, job_id: &JobId) -> Result<(), OrchestratorError> {
        let job = self.store.get_job(job_id).ok_or_else(|| OrchestratorError::JobNotFound(job_id.clone()))?;
        if job.status != JobStatus::Queued {
            return Ok(());
        }

        let profile = self
            .profiles
            .get(&job.profile)
            .ok_or_else(|| OrchestratorError::UnknownProfile(job.profile.clone()))?
            .clone();
        self.backend.validate_template(Vmid(profile.template_vmid)).await.map_err(backend_err)?;

        let ttl_minutes =
            if job.ttl_minutes > 0 { job.ttl_minutes } else { profile.behavior.ttl_minutes_default };
        let keepalive = job.keepalive.unwrap_or(profile.behavior.keepalive_default);
        let now = self.now();
        self.store.set_job_defaults(job_id, ttl_minutes, keepalive, now).map_err(map_store_err)?;

        let vmid = match job.sandbox_vmid {
            Some(vmid) => vmid,
            None => self.allocate_sandbox(&profile, keepalive, ttl_minutes)?,
        };
        self.store.bind_job_sandbox(job_id, vmid, now).map_err(map_store_err)?;

        self.provision_vm(vmid, &profile, job.workspace_id.map(|id| id.as_str().to_string())).await?;

        self.store.update_job_status(job_id, JobStatus::Running, self.now()).map_err(map_store_err)?;
        self.events.record(
            EventKind::JobRunning,
            format!("job {job_id} running on vmid {vmid}"),
            Some(vmid),
            Some(job_id.clone()),
            serde_json::Value::Null,
        );
        Ok(())
    }

    /// Allocate a fresh vmid, retrying on a uniqueness race, and seed its
    /// sandbox row with the resolved keepalive/lease.
    fn allocate_sandbox(
        &self,
        profile: &Profile,
        keepalive: bool,
        ttl_minutes: u32,
    ) -> Result<Vmid, OrchestratorError> {
        let now = self.now();
        let mut candidate = self.store.next_free_vmid(1);
        loop {
            let sandbox = Sandbox::new(candidate, profile.name.clone(), now);
            match self.store.insert_sandbox(sandbox) {
                Ok(()) => break,
                Err(StoreError::VmidAlreadyExists(_)) => {
                    candidate = self.store.next_free_vmid(candidate.get() + 1);
                }
                Err(other) => return Err(map_store_err(other)),
            }
        }
        self.store.set_sandbox_keepalive(candidate, keepalive);
        if ttl_minutes > 0 {
            self.store.set_sandbox_lease(candidate, now + ttl_minutes as u64 * 60_000);
        }
        Ok(candidate)
    }

    /// Steps shared by job-driven and operator-driven provisioning: drive
    /// a REQUESTED sandbox through PROVISIONING/BOOTING up to RUNNING.
    async fn provision_vm(
        &self,
        vmid: Vmid,
        profile: &Profile,
        workspace_id: Option<String>,
    ) -> Result<(), OrchestratorError> {
        self.sandboxes.transition(vmid, SandboxState::Provisioning)?;

        self.backend
            .clone_vm(Vmid(profile.template_vmid), vmid, &Sandbox::default_name(vmid))
            .await
            .map_err(backend_err)?;

        let plaintext =
            random_hex_token(self.random.as_ref()).map_err(|e| OrchestratorError::Backend(e.to_string()))?;
        let expires_at = self.now() + self.config.bootstrap_token_ttl().as_millis() as u64;
        self.store.insert_bootstrap_token(BootstrapToken::new(hash_token(&plaintext), vmid, expires_at));
        self.redactor.add_sensitive_value(plaintext.clone());

        let snippet = CloudInitSnippet {
            hostname: Sandbox::default_name(vmid),
            ssh_public_key: self.config.guest_ssh_public_key.clone(),
            bootstrap_token: plaintext,
            controller_url: self.config.controller_url(),
        };
        let path = self.snippet_writer.write(vmid, &snippet).map_err(|e| OrchestratorError::Backend(e.to_string()))?;
        self.snippets.remember(vmid, path);

        let mut cfg = VmConfig::from_profile(profile);
        cfg.cloud_init = self.snippets.get(vmid);
        if let Err(err) = self.backend.configure(vmid, &cfg).await {
            self.cleanup_snippet(vmid);
            return Err(backend_err(err));
        }

        if let Some(workspace_id) = workspace_id.as_deref() {
            if let Err(err) = self.sandboxes.workspaces.attach(workspace_id, vmid).await {
                self.cleanup_snippet(vmid);
                return Err(err);
            }
        }

        self.sandboxes.transition(vmid, SandboxState::Booting)?;
        self.backend.start(vmid).await.map_err(backend_err)?;

        match tokio::time::timeout(self.config.guest_ip_timeout(), self.backend.guest_ip(vmid)).await {
            Ok(Ok(ip)) if !ip.is_empty() => {
                self.store.update_sandbox_ip(vmid, ip, self.now());
            }
            Ok(Err(e)) if e.is_vm_not_found() => {}
            _ => {
                self.events.record(
                    EventKind::SandboxIpPending,
                    "guest ip not yet available",
                    Some(vmid),
                    None,
                    serde_json::Value::Null,
                );
            }
        }

        self.sandboxes.ensure_sandbox_running(vmid).await?;
        Ok(())
    }

    fn cleanup_snippet(&self, vmid: Vmid) {
        if self.snippets.forget(vmid).is_some() {
            let _ = self.snippet_writer.remove(vmid);
        }
    }

    /// Record a job as failed, persist the redacted cause, and (unless
    /// the job is keepalive) tear down its sandbox under a bounded
    /// cleanup budget distinct from the provisioning timeout.
    async fn fail_job(&self, job_id: &JobId, err: OrchestratorError) {
        let Some(job) = self.store.get_job(job_id) else { return };
        let message = self.redactor.redact(&err.to_string());
        let now = self.now();
        self.events.record(
            EventKind::JobFailed,
            message.clone(),
            job.sandbox_vmid,
            Some(job.id.clone()),
            serde_json::Value::Null,
        );
        let result = serde_json::json!({
            "status": "FAILED",
            "message": message,
            "artifacts": [],
            "result": serde_json::Value::Null,
            "reported_at": to_rfc3339_nano(now),
        });
        if self.store.update_job_result(&job.id, JobStatus::Failed, result, now).is_err() {
            // Already finalized by a concurrent runner report; nothing left to do.
            return;
        }
        if job.keepalive != Some(false) {
            return;
        }
        let Some(vmid) = job.sandbox_vmid else { return };
        let cleanup = async {
            let _ = self.sandboxes.destroy(vmid).await;
            self.cleanup_snippet(vmid);
        };
        let _ = tokio::time::timeout(self.config.failure_cleanup_timeout(), cleanup).await;
    }

    /// Accept a guest's status report (spec section 4.4's runner report).
    pub async fn handle_report(&self, report: RunnerReportRequest) -> Result<RunnerReportResponse, OrchestratorError> {
        let vmid = Vmid::new(report.vmid).ok_or(OrchestratorError::MissingField("vmid"))?;
        let status =
            JobStatus::from_wire(&report.status).ok_or_else(|| OrchestratorError::InvalidJobStatus(report.status.clone()))?;
        let job_id = JobId::from_string(report.job_id.clone());

        let job = self.store.get_job(&job_id).ok_or_else(|| OrchestratorError::JobNotFound(job_id.clone()))?;
        if job.sandbox_vmid != Some(vmid) {
            return Err(OrchestratorError::JobSandboxMismatch);
        }
        if job.status.is_terminal() {
            return Err(OrchestratorError::JobAlreadyFinalized);
        }

        let now = self.now();
        let message = report.message.as_deref().map(|m| self.redactor.redact(m));
        let result_payload = serde_json::json!({
            "status": report.status,
            "message": message,
            "artifacts": report.artifacts,
            "result": report.result,
            "reported_at": to_rfc3339_nano(now),
        });
        let updated = self.store.update_job_result(&job_id, status, result_payload, now).map_err(map_store_err)?;
        self.events.record(
            EventKind::JobReport,
            format!("job {job_id} reported {status}"),
            Some(vmid),
            Some(job_id.clone()),
            serde_json::Value::Null,
        );

        self.sandboxes.ensure_sandbox_running(vmid).await?;
        if status.is_terminal() {
            let sandbox_state = match status {
                JobStatus::Completed => SandboxState::Completed,
                JobStatus::Failed => SandboxState::Failed,
                JobStatus::Timeout => SandboxState::Timeout,
                JobStatus::Queued | JobStatus::Running => unreachable!("status.is_terminal() checked above"),
            };
            self.sandboxes.transition(vmid, sandbox_state)?;
        }

        if updated.keepalive == Some(false) {
            let cleanup = async {
                let _ = self.sandboxes.destroy(vmid).await;
                self.cleanup_snippet(vmid);
            };
            let _ = tokio::time::timeout(self.config.failure_cleanup_timeout(), cleanup).await;
        }

        Ok(RunnerReportResponse {
            job_status: updated.status.to_string(),
            sandbox_status: self.store.get_sandbox_any(vmid).map(|s| s.state.to_string()),
        })
    }
}

fn backend_err(err: sbx_adapters::BackendError) -> OrchestratorError {
    OrchestratorError::Backend(err.to_string())
}
