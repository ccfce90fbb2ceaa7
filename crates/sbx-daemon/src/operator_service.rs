// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Translates the operator socket's [`Request`]/[`Response`] wire shapes
//! (spec section C) into calls against the sandbox/job/workspace/
//! exposure managers, and maps [`OrchestratorError`] to [`ErrorEnvelope`]
//! per spec section 7: `details` is populated only for 4xx-class errors.

use crate::exposure_publisher::ExposurePublisher;
use crate::job_orchestrator::JobOrchestrator;
use crate::metrics::{Metrics, NoopMetrics};
use crate::sandbox_manager::{RevertOptions, SandboxManager};
use sbx_core::{Clock, Exposure, Job, JobId, JobMode, OrchestratorError, Sandbox, Vmid, Workspace};
use sbx_storage::Store;
use sbx_wire::{
    to_rfc3339_nano, ErrorEnvelope, EventSummary, ExposureSummary, JobSummary, Request, Response,
    SandboxSummary, StatusSummary, WorkspaceSummary,
};
use std::collections::HashMap;
use std::sync::Arc;

pub const PROTOCOL_VERSION: &str = "1";

pub struct OperatorService<C: Clock, M: Metrics = NoopMetrics> {
    store: Store,
    sandboxes: Arc<SandboxManager<C, M>>,
    jobs: JobOrchestrator<C, M>,
    exposures: Arc<ExposurePublisher<C>>,
    clock: C,
    started_at_ms: u64,
}

impl<C: Clock, M: Metrics> OperatorService<C, M> {
    pub fn new(
        store: Store,
        sandboxes: Arc<SandboxManager<C, M>>,
        jobs: JobOrchestrator<C, M>,
        exposures: Arc<ExposurePublisher<C>>,
        clock: C,
    ) -> Self {
        let started_at_ms = clock.epoch_ms();
        Self { store, sandboxes, jobs, exposures, clock, started_at_ms }
    }

    fn now(&self) -> u64 {
        self.clock.epoch_ms()
    }

    pub async fn handle(&self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => Response::Error(to_error_envelope(&err)),
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Response, OrchestratorError> {
        match request {
            Request::Hello { .. } => Ok(Response::Hello { version: PROTOCOL_VERSION.to_string() }),
            Request::Status => Ok(Response::Status(self.status())),

            Request::JobCreate {
                repo_url,
                profile,
                task,
                git_ref,
                mode,
                ttl_minutes,
                keepalive,
                workspace,
                session_id,
            } => self.job_create(repo_url, profile, task, git_ref, mode, ttl_minutes, keepalive, workspace, session_id),
            Request::JobShow { id } => {
                let job = self
                    .store
                    .get_job(&JobId::from_string(id.clone()))
                    .ok_or_else(|| OrchestratorError::JobNotFound(JobId::from_string(id)))?;
                Ok(Response::Job(to_job_summary(&job)))
            }
            Request::JobList => {
                Ok(Response::Jobs(self.store.list_jobs().iter().map(to_job_summary).collect()))
            }

            Request::SandboxList => {
                Ok(Response::Sandboxes(self.store.list_sandboxes().iter().map(to_sandbox_summary).collect()))
            }
            Request::SandboxShow { vmid } => {
                let vmid = parse_vmid(vmid)?;
                let sandbox = self.sandboxes.load(vmid)?;
                Ok(Response::Sandbox(to_sandbox_summary(&sandbox)))
            }
            Request::SandboxStart { vmid } => {
                let vmid = parse_vmid(vmid)?;
                let sandbox = self.sandboxes.start(vmid).await?;
                Ok(Response::Sandbox(to_sandbox_summary(&sandbox)))
            }
            Request::SandboxStop { vmid } => {
                let vmid = parse_vmid(vmid)?;
                let sandbox = self.sandboxes.stop(vmid).await?;
                Ok(Response::Sandbox(to_sandbox_summary(&sandbox)))
            }
            Request::SandboxRevert { vmid, force, restart } => {
                let vmid = parse_vmid(vmid)?;
                let sandbox = self.sandboxes.revert(vmid, RevertOptions { force, restart }).await?;
                Ok(Response::Sandbox(to_sandbox_summary(&sandbox)))
            }
            Request::SandboxDestroy { vmid } => {
                let vmid = parse_vmid(vmid)?;
                let sandbox = self.sandboxes.destroy(vmid).await?;
                Ok(Response::Sandbox(to_sandbox_summary(&sandbox)))
            }

            Request::WorkspaceCreate { name, storage, size_gb } => {
                let workspace = self.sandboxes.workspaces.create(name, storage, size_gb).await?;
                Ok(Response::Workspace(to_workspace_summary(&workspace)))
            }
            Request::WorkspaceAttach { workspace, vmid } => {
                let vmid = parse_vmid(vmid)?;
                let workspace = self.sandboxes.workspaces.attach(&workspace, vmid).await?;
                Ok(Response::Workspace(to_workspace_summary(&workspace)))
            }
            Request::WorkspaceDetach { workspace } => {
                self.sandboxes.workspaces.detach(&workspace).await?;
                let workspace = self.sandboxes.workspaces.resolve(&workspace)?;
                Ok(Response::Workspace(to_workspace_summary(&workspace)))
            }
            Request::WorkspaceList => {
                Ok(Response::Workspaces(self.store.list_workspaces().iter().map(to_workspace_summary).collect()))
            }

            Request::ExposurePublish { name, vmid, port } => {
                let vmid = parse_vmid(vmid)?;
                let sandbox = self.sandboxes.load(vmid)?;
                let ip = sandbox.ip.ok_or(OrchestratorError::MissingField("ip"))?;
                let exposure = self.exposures.publish(&name, vmid, &ip, port, false).await?;
                Ok(Response::Exposure(to_exposure_summary(&exposure)))
            }
            Request::ExposureUnpublish { name, port } => {
                self.exposures.unpublish(&name, port).await?;
                Ok(Response::Ok)
            }
            Request::ExposureList => {
                Ok(Response::Exposures(self.store.list_exposures().iter().map(to_exposure_summary).collect()))
            }

            Request::EventsTail { since_id, limit } => {
                let events = self.store.list_events(since_id, limit);
                Ok(Response::Events(events.iter().map(to_event_summary).collect()))
            }

            Request::Shutdown => Ok(Response::Ok),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn job_create(
        &self,
        repo_url: String,
        profile: String,
        task: String,
        git_ref: Option<String>,
        mode: Option<String>,
        ttl_minutes: Option<u32>,
        keepalive: Option<bool>,
        workspace: Option<String>,
        session_id: Option<String>,
    ) -> Result<Response, OrchestratorError> {
        let workspace_id = match workspace {
            Some(reference) => Some(self.sandboxes.workspaces.resolve(&reference)?.id),
            None => None,
        };

        let now = self.now();
        let mut job = Job::new(repo_url, profile, task, now);
        job.git_ref = git_ref;
        job.mode = match mode.as_deref() {
            Some("dangerous") => JobMode::Dangerous,
            _ => JobMode::Normal,
        };
        job.ttl_minutes = ttl_minutes.unwrap_or(0);
        job.keepalive = keepalive;
        job.workspace_id = workspace_id;
        job.session_id = session_id;

        self.store.insert_job(job.clone()).map_err(|e| OrchestratorError::Backend(e.to_string()))?;
        self.jobs.start(job.id.clone());
        Ok(Response::Job(to_job_summary(&job)))
    }

    fn status(&self) -> StatusSummary {
        let mut sandboxes_by_state: HashMap<String, u64> = HashMap::new();
        for sandbox in self.store.list_sandboxes() {
            *sandboxes_by_state.entry(sandbox.state.to_string()).or_insert(0) += 1;
        }
        let active_jobs =
            self.store.list_jobs().iter().filter(|j| !j.status.is_terminal()).count() as u64;
        StatusSummary {
            version: PROTOCOL_VERSION.to_string(),
            uptime_seconds: self.now().saturating_sub(self.started_at_ms) / 1000,
            sandboxes_by_state,
            active_jobs,
        }
    }
}

fn parse_vmid(raw: u32) -> Result<Vmid, OrchestratorError> {
    Vmid::new(raw).ok_or(OrchestratorError::MissingField("vmid"))
}

fn to_job_summary(job: &Job) -> JobSummary {
    JobSummary {
        id: job.id.as_str().to_string(),
        repo_url: job.repo_url.clone(),
        profile: job.profile.clone(),
        status: job.status.to_string(),
        sandbox_vmid: job.sandbox_vmid.map(|v| v.get()),
        result: job.result.clone(),
        created_at: to_rfc3339_nano(job.created_at_ms),
        updated_at: to_rfc3339_nano(job.updated_at_ms),
    }
}

fn to_sandbox_summary(sandbox: &Sandbox) -> SandboxSummary {
    SandboxSummary {
        vmid: sandbox.vmid.get(),
        name: sandbox.name.clone(),
        profile: sandbox.profile.clone(),
        state: sandbox.state.to_string(),
        ip: sandbox.ip.clone(),
        workspace_id: sandbox.workspace_id.as_ref().map(|id| id.as_str().to_string()),
        keepalive: sandbox.keepalive,
        lease_expires_at: sandbox.has_lease().then(|| to_rfc3339_nano(sandbox.lease_expires_at_ms)),
        created_at: to_rfc3339_nano(sandbox.created_at_ms),
        updated_at: to_rfc3339_nano(sandbox.updated_at_ms),
    }
}

fn to_workspace_summary(workspace: &Workspace) -> WorkspaceSummary {
    WorkspaceSummary {
        id: workspace.id.as_str().to_string(),
        name: workspace.name.clone(),
        storage: workspace.storage.clone(),
        size_gb: workspace.size_gb,
        attached_vmid: workspace.attached_vmid.map(|v| v.get()),
    }
}

fn to_exposure_summary(exposure: &Exposure) -> ExposureSummary {
    ExposureSummary {
        name: exposure.name.clone(),
        vmid: exposure.vmid.get(),
        port: exposure.port,
        url: exposure.url.clone(),
        state: exposure.state.to_string(),
    }
}

fn to_event_summary(event: &sbx_core::Event) -> EventSummary {
    EventSummary {
        id: event.id,
        ts: to_rfc3339_nano(event.ts_ms),
        kind: event.kind.to_string(),
        vmid: event.vmid.map(|v| v.get()),
        job_id: event.job_id.as_ref().map(|id| id.as_str().to_string()),
        message: event.message.clone(),
        payload: event.payload.clone(),
    }
}

/// `details` is populated only for 4xx-class errors (spec section 7);
/// 5xx-class errors surface a generic message with no extra detail.
fn to_error_envelope(err: &OrchestratorError) -> ErrorEnvelope {
    let code = error_code(err);
    if err.is_client_error() {
        ErrorEnvelope { error: err.to_string(), code: Some(code.to_string()), message: None, details: Some(err.to_string()) }
    } else {
        ErrorEnvelope { error: "internal error".to_string(), code: Some(code.to_string()), message: None, details: None }
    }
}

fn error_code(err: &OrchestratorError) -> &'static str {
    use OrchestratorError::*;
    match err {
        SandboxNotFound(_) => "sandbox_not_found",
        JobNotFound(_) => "job_not_found",
        WorkspaceNotFound(_) => "workspace_not_found",
        SnapshotMissing => "snapshot_missing",
        ServeRuleNotFound => "serve_rule_not_found",
        SandboxHasNoJob(_) => "sandbox_has_no_job",
        InvalidTransition { .. } => "invalid_transition",
        SandboxInUse { .. } => "sandbox_in_use",
        WorkspaceAttached => "workspace_attached",
        WorkspaceVmInUse => "workspace_vm_in_use",
        LeaseNotRenewable => "lease_not_renewable",
        JobAlreadyFinalized => "job_already_finalized",
        JobSandboxMismatch => "job_sandbox_mismatch",
        ExposureNameConflict => "exposure_name_conflict",
        UniqueConstraint(_) => "unique_constraint",
        InvalidPort(_) => "invalid_port",
        InvalidTtl => "invalid_ttl",
        MissingField(_) => "missing_field",
        ProfileInvalid(_) => "profile_invalid",
        UnknownProfile(_) => "unknown_profile",
        InvalidTemplate => "invalid_template",
        InvalidJobStatus(_) => "invalid_job_status",
        OutsideAgentSubnet => "outside_agent_subnet",
        InvalidBootstrapToken => "invalid_bootstrap_token",
        RateLimited => "rate_limited",
        Backend(_) => "backend_error",
        VmNotFound => "vm_not_found",
        Timeout => "timeout",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_recorder::EventRecorder;
    use crate::redactor::Redactor;
    use crate::snippet::fake::FakeSnippetWriter;
    use crate::snippet::SnippetMap;
    use crate::tokens::fake::FakeRandomSource;
    use crate::workspace_manager::WorkspaceManager;
    use sbx_adapters::FakeBackend;
    use sbx_core::{FakeClock, Profile};
    use sbx_profile::ProfileStore;

    fn service() -> (OperatorService<FakeClock>, Store, FakeClock) {
        let store = Store::new();
        let backend = Arc::new(FakeBackend::new());
        let clock = FakeClock::new();
        let redactor = Redactor::new();
        let events = EventRecorder::new(store.clone(), redactor.clone(), clock.clone());
        let workspaces = WorkspaceManager::new(store.clone(), backend.clone(), events.clone(), clock.clone());
        let sandboxes =
            Arc::new(SandboxManager::new(store.clone(), backend.clone(), events.clone(), clock.clone(), NoopMetrics, workspaces));
        let profile = Profile {
            name: "test".into(),
            template_vmid: 9000,
            resources: Default::default(),
            network: Default::default(),
            storage: Default::default(),
            behavior: Default::default(),
            artifacts: Default::default(),
            raw_yaml: String::new(),
        };
        let profiles = ProfileStore::from_profiles(vec![profile]);
        let config = Arc::new(crate::config::DaemonConfig::default());
        let jobs = JobOrchestrator::new(
            store.clone(),
            backend.clone(),
            profiles,
            sandboxes.clone(),
            events,
            clock.clone(),
            config,
            redactor,
            Arc::new(SnippetMap::new()),
            Arc::new(FakeSnippetWriter::new()),
            Arc::new(FakeRandomSource::new()),
        );
        let exposures = Arc::new(ExposurePublisher::new(
            store.clone(),
            Arc::new(sbx_adapters::FakeTailnetTool::new()),
            EventRecorder::new(store.clone(), Redactor::new(), clock.clone()),
            clock.clone(),
            Arc::new(crate::config::DaemonConfig::default()),
        ));
        (OperatorService::new(store.clone(), sandboxes, jobs, exposures, clock.clone()), store, clock)
    }

    #[tokio::test]
    async fn hello_echoes_protocol_version() {
        let (svc, _store, _clock) = service();
        let resp = svc.handle(Request::Hello { version: "1".into() }).await;
        assert_eq!(resp, Response::Hello { version: PROTOCOL_VERSION.to_string() });
    }

    #[tokio::test]
    async fn status_reports_sandbox_counts() {
        let (svc, store, clock) = service();
        store.insert_sandbox(Sandbox::new(Vmid(1), "test", clock.epoch_ms())).unwrap();
        let Response::Status(status) = svc.handle(Request::Status).await else { panic!("expected Status") };
        assert_eq!(status.sandboxes_by_state.get("REQUESTED"), Some(&1));
    }

    #[tokio::test]
    async fn job_create_queues_a_job_and_returns_its_summary() {
        let (svc, store, _clock) = service();
        let resp = svc
            .handle(Request::JobCreate {
                repo_url: "https://example.com/r.git".into(),
                profile: "test".into(),
                task: "do it".into(),
                git_ref: None,
                mode: None,
                ttl_minutes: None,
                keepalive: Some(false),
                workspace: None,
                session_id: None,
            })
            .await;
        let Response::Job(summary) = resp else { panic!("expected Job") };
        assert_eq!(summary.status, "QUEUED");
        assert!(store.get_job(&JobId::from_string(summary.id)).is_some());
    }

    #[tokio::test]
    async fn sandbox_show_missing_vmid_is_a_client_error_with_details() {
        let (svc, _store, _clock) = service();
        let resp = svc.handle(Request::SandboxShow { vmid: 404 }).await;
        let Response::Error(envelope) = resp else { panic!("expected Error") };
        assert_eq!(envelope.code.as_deref(), Some("sandbox_not_found"));
        assert!(envelope.details.is_some());
    }

    #[tokio::test]
    async fn backend_error_has_no_details() {
        let err = OrchestratorError::Backend("boom".into());
        let envelope = to_error_envelope(&err);
        assert!(envelope.details.is_none());
        assert_eq!(envelope.error, "internal error");
    }
}
