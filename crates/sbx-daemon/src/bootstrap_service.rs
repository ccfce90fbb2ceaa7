// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The guest-facing bootstrap/report listener's request handling (spec
//! section 4.4 / wire shapes in section 6).
//!
//! Both endpoints share the same perimeter: reject traffic from outside
//! the agent subnet, then rate-limit by source IP, before touching any
//! domain state. [`JobOrchestrator`] owns the report's job-state
//! transitions; this module only owns bootstrap fetch and the perimeter
//! both endpoints share.

use crate::agent_subnet;
use crate::config::DaemonConfig;
use crate::event_recorder::EventRecorder;
use crate::job_orchestrator::JobOrchestrator;
use crate::metrics::{Metrics, NoopMetrics};
use crate::rate_limiter::IpRateLimiter;
use crate::redactor::Redactor;
use crate::secrets::SecretsStore;
use crate::tokens::{random_hex_token, RandomSource};
use sbx_core::{hash_token, Clock, EventKind, OrchestratorError, Vmid};
use sbx_profile::ProfileStore;
use sbx_storage::Store;
use sbx_wire::{
    ArtifactWire, BootstrapRequest, BootstrapResponse, GitWire, JobWire, PolicyWire,
    RunnerReportRequest, RunnerReportResponse,
};
use std::net::IpAddr;
use std::sync::Arc;

const ARTIFACT_TOKEN_ALLOC_ATTEMPTS: usize = 5;

pub struct BootstrapService<C: Clock, M: Metrics = NoopMetrics> {
    store: Store,
    profiles: ProfileStore,
    secrets: Arc<dyn SecretsStore>,
    jobs: JobOrchestrator<C, M>,
    events: EventRecorder<C>,
    clock: C,
    config: Arc<DaemonConfig>,
    redactor: Redactor,
    rate_limiter: IpRateLimiter<C>,
    random: Arc<dyn RandomSource>,
}

impl<C: Clock, M: Metrics> BootstrapService<C, M> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        profiles: ProfileStore,
        secrets: Arc<dyn SecretsStore>,
        jobs: JobOrchestrator<C, M>,
        events: EventRecorder<C>,
        clock: C,
        config: Arc<DaemonConfig>,
        redactor: Redactor,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        let rate_limiter =
            IpRateLimiter::new(config.rate_limit_qps, config.rate_limit_burst, clock.clone());
        Self { store, profiles, secrets, jobs, events, clock, config, redactor, rate_limiter, random }
    }

    fn now(&self) -> u64 {
        self.clock.epoch_ms()
    }

    fn admit(&self, source: IpAddr) -> Result<(), OrchestratorError> {
        if !agent_subnet::contains(&self.config.agent_subnet_cidr, source) {
            return Err(OrchestratorError::OutsideAgentSubnet);
        }
        if !self.rate_limiter.allow(source) {
            return Err(OrchestratorError::RateLimited);
        }
        Ok(())
    }

    /// Handle a guest's bootstrap fetch: validate its token, compose the
    /// full bundle, and only then consume the token — a failure composing
    /// the response leaves the token valid for a retry.
    pub async fn handle_bootstrap(
        &self,
        source: IpAddr,
        request: BootstrapRequest,
    ) -> Result<BootstrapResponse, OrchestratorError> {
        self.admit(source)?;

        let vmid = Vmid::new(request.vmid).ok_or(OrchestratorError::MissingField("vmid"))?;
        let token_hash = hash_token(&request.token);
        let now = self.now();
        if !self.store.validate_bootstrap_token(&token_hash, vmid, now) {
            return Err(OrchestratorError::InvalidBootstrapToken);
        }

        let job = self.store.job_for_sandbox(vmid).ok_or(OrchestratorError::SandboxHasNoJob(vmid))?;
        let profile = self
            .profiles
            .get(&job.profile)
            .ok_or_else(|| OrchestratorError::UnknownProfile(job.profile.clone()))?
            .clone();
        let bundle = self
            .secrets
            .load(&profile.name)
            .map_err(|e| OrchestratorError::Backend(e.to_string()))?;

        for value in bundle.env.values() {
            self.redactor.add_sensitive_value(value.clone());
        }
        if let Some(token) = bundle.git.token.as_deref() {
            self.redactor.add_sensitive_value(token.to_string());
        }
        if let Some(key) = bundle.git.ssh_private_key.as_deref() {
            self.redactor.add_sensitive_value(key.to_string());
        }

        let artifact = self.issue_artifact_wire(&job.id, vmid, &bundle)?;

        let job_wire = JobWire {
            id: job.id.as_str().to_string(),
            repo_url: job.repo_url.clone(),
            git_ref: job.git_ref.clone(),
            task: job.task.clone(),
            mode: job.mode.to_string(),
            profile: job.profile.clone(),
            keepalive: job.keepalive.unwrap_or(profile.behavior.keepalive_default),
            ttl_minutes: if job.ttl_minutes > 0 { Some(job.ttl_minutes) } else { None },
        };
        let git = bundle.git_if_present().map(|g| GitWire {
            token: g.token.clone(),
            username: g.username.clone(),
            ssh_private_key: g.ssh_private_key.clone(),
            ssh_public_key: g.ssh_public_key.clone(),
            known_hosts: g.known_hosts.clone(),
        });
        let policy = PolicyWire {
            mode: job.mode.to_string(),
            inner_sandbox: Some(profile.behavior.inner_sandbox.to_string()),
            inner_sandbox_args: profile.behavior.inner_sandbox_args.clone(),
        };

        self.store
            .consume_bootstrap_token(&token_hash, vmid, self.now())
            .map_err(|_| OrchestratorError::InvalidBootstrapToken)?;

        self.events.record(
            EventKind::BootstrapFetch,
            format!("sandbox {vmid} fetched bootstrap bundle for job {}", job.id),
            Some(vmid),
            Some(job.id.clone()),
            serde_json::Value::Null,
        );

        Ok(BootstrapResponse {
            job: job_wire,
            git,
            env: if bundle.env.is_empty() { None } else { Some(bundle.env.clone()) },
            claude_settings_json: bundle.claude_settings_json.clone(),
            artifact,
            policy: Some(policy),
        })
    }

    fn issue_artifact_wire(
        &self,
        job_id: &sbx_core::JobId,
        vmid: Vmid,
        bundle: &crate::secrets::SecretsBundle,
    ) -> Result<Option<ArtifactWire>, OrchestratorError> {
        if let Some(static_token) = bundle.artifact.static_token.as_deref() {
            let endpoint = bundle
                .artifact
                .endpoint
                .clone()
                .unwrap_or_else(|| format!("{}/artifacts", self.config.controller_url()));
            return Ok(Some(ArtifactWire { endpoint, token: static_token.to_string() }));
        }

        let expires_at = self.now() + self.config.bootstrap_token_ttl().as_millis() as u64;
        for _ in 0..ARTIFACT_TOKEN_ALLOC_ATTEMPTS {
            let plaintext =
                random_hex_token(self.random.as_ref()).map_err(|e| OrchestratorError::Backend(e.to_string()))?;
            let token = sbx_core::ArtifactToken {
                token_hash: hash_token(&plaintext),
                job_id: job_id.clone(),
                vmid,
                expires_at_ms: expires_at,
            };
            if self.store.insert_artifact_token(token).is_ok() {
                self.redactor.add_sensitive_value(plaintext.clone());
                let endpoint = bundle
                    .artifact
                    .endpoint
                    .clone()
                    .unwrap_or_else(|| format!("{}/artifacts", self.config.controller_url()));
                return Ok(Some(ArtifactWire { endpoint, token: plaintext }));
            }
        }
        Err(OrchestratorError::Backend("failed to allocate a unique artifact token".into()))
    }

    /// Handle a guest's status report: perimeter checks, then hand off to
    /// the job orchestrator for the actual state transition.
    pub async fn handle_report(
        &self,
        source: IpAddr,
        report: RunnerReportRequest,
    ) -> Result<RunnerReportResponse, OrchestratorError> {
        self.admit(source)?;
        self.jobs.handle_report(report).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox_manager::SandboxManager;
    use crate::snippet::fake::FakeSnippetWriter;
    use crate::snippet::SnippetMap;
    use crate::tokens::fake::FakeRandomSource;
    use crate::workspace_manager::WorkspaceManager;
    use sbx_adapters::FakeBackend;
    use sbx_core::{BootstrapToken, FakeClock, Job, Profile, Sandbox};

    fn service() -> (BootstrapService<FakeClock>, Store, FakeClock, Arc<FakeRandomSource>) {
        service_with_secrets(Arc::new(crate::secrets::fake::FakeSecretsStore::new()))
    }

    fn service_with_secrets(
        secrets: Arc<dyn SecretsStore>,
    ) -> (BootstrapService<FakeClock>, Store, FakeClock, Arc<FakeRandomSource>) {
        let store = Store::new();
        let backend = Arc::new(FakeBackend::new());
        let clock = FakeClock::new();
        let redactor = Redactor::new();
        let events = EventRecorder::new(store.clone(), redactor.clone(), clock.clone());
        let workspaces = WorkspaceManager::new(store.clone(), backend.clone(), events.clone(), clock.clone());
        let sandboxes = Arc::new(SandboxManager::new(
            store.clone(),
            backend.clone(),
            events.clone(),
            clock.clone(),
            NoopMetrics,
            workspaces,
        ));
        let profile = Profile {
            name: "yolo".into(),
            template_vmid: 9000,
            resources: Default::default(),
            network: Default::default(),
            storage: Default::default(),
            behavior: Default::default(),
            artifacts: Default::default(),
            raw_yaml: String::new(),
        };
        let profiles = ProfileStore::from_profiles(vec![profile]);
        let config = Arc::new(DaemonConfig::default());
        let snippets = Arc::new(SnippetMap::new());
        let writer = Arc::new(FakeSnippetWriter::new());
        let random = Arc::new(FakeRandomSource::new());
        let jobs = JobOrchestrator::new(
            store.clone(),
            backend.clone(),
            profiles.clone(),
            sandboxes,
            events.clone(),
            clock.clone(),
            config.clone(),
            redactor.clone(),
            snippets,
            writer,
            random.clone(),
        );
        let svc = BootstrapService::new(
            store.clone(),
            profiles,
            secrets,
            jobs,
            events,
            clock.clone(),
            config,
            redactor,
            random.clone(),
        );
        (svc, store, clock, random)
    }

    fn loopback() -> IpAddr {
        "10.77.0.1".parse().unwrap()
    }

    #[tokio::test]
    async fn bootstrap_rejects_traffic_outside_agent_subnet() {
        let (svc, _store, _clock, _random) = service();
        let outsider: IpAddr = "203.0.113.9".parse().unwrap();
        let err = svc
            .handle_bootstrap(outsider, BootstrapRequest { token: "x".into(), vmid: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::OutsideAgentSubnet));
    }

    #[tokio::test]
    async fn bootstrap_rejects_unknown_token() {
        let (svc, store, _clock, _random) = service();
        let sandbox = Sandbox::new(Vmid(1), "yolo", 1000);
        store.insert_sandbox(sandbox).unwrap();

        let err = svc
            .handle_bootstrap(loopback(), BootstrapRequest { token: "nope".into(), vmid: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidBootstrapToken));
    }

    #[tokio::test]
    async fn bootstrap_succeeds_and_consumes_token_once() {
        let (svc, store, clock, _random) = service();
        let sandbox = Sandbox::new(Vmid(1), "yolo", clock.epoch_ms());
        store.insert_sandbox(sandbox).unwrap();
        let job = Job::builder().profile("yolo").sandbox_vmid(Some(Vmid(1))).build();
        let job_id = job.id.clone();
        store.insert_job(job).unwrap();
        store.insert_bootstrap_token(BootstrapToken::new(
            hash_token("plain-token"),
            Vmid(1),
            clock.epoch_ms() + 60_000,
        ));

        let resp = svc
            .handle_bootstrap(loopback(), BootstrapRequest { token: "plain-token".into(), vmid: 1 })
            .await
            .unwrap();
        assert_eq!(resp.job.id, job_id.as_str());
        assert!(resp.artifact.is_some());

        let err = svc
            .handle_bootstrap(loopback(), BootstrapRequest { token: "plain-token".into(), vmid: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidBootstrapToken));
    }

    /// S4: the random source fails during artifact token issuance. The
    /// first fetch surfaces a backend-class error and the bootstrap token
    /// stays valid (it's consumed only after the artifact token is
    /// issued); restoring the random source lets a retry succeed, and a
    /// third fetch on the now-consumed token is rejected.
    #[tokio::test]
    async fn bootstrap_retries_after_artifact_token_random_source_failure() {
        let (svc, store, clock, random) = service();
        let sandbox = Sandbox::new(Vmid(1), "yolo", clock.epoch_ms());
        store.insert_sandbox(sandbox).unwrap();
        let job = Job::builder().profile("yolo").sandbox_vmid(Some(Vmid(1))).build();
        store.insert_job(job).unwrap();
        store.insert_bootstrap_token(BootstrapToken::new(
            hash_token("plain-token"),
            Vmid(1),
            clock.epoch_ms() + 60_000,
        ));

        random.fail_next(1);
        let err = svc
            .handle_bootstrap(loopback(), BootstrapRequest { token: "plain-token".into(), vmid: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Backend(_)));
        assert!(!err.is_client_error());

        let resp = svc
            .handle_bootstrap(loopback(), BootstrapRequest { token: "plain-token".into(), vmid: 1 })
            .await
            .unwrap();
        assert!(resp.artifact.is_some());

        let err = svc
            .handle_bootstrap(loopback(), BootstrapRequest { token: "plain-token".into(), vmid: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidBootstrapToken));
    }

    #[tokio::test]
    async fn bootstrap_with_no_bound_job_fails() {
        let (svc, store, clock, _random) = service();
        let sandbox = Sandbox::new(Vmid(1), "yolo", clock.epoch_ms());
        store.insert_sandbox(sandbox).unwrap();
        store.insert_bootstrap_token(BootstrapToken::new(
            hash_token("plain-token"),
            Vmid(1),
            clock.epoch_ms() + 60_000,
        ));

        let err = svc
            .handle_bootstrap(loopback(), BootstrapRequest { token: "plain-token".into(), vmid: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::SandboxHasNoJob(_)));
    }

    #[tokio::test]
    async fn bootstrap_uses_preconfigured_static_artifact_token_without_issuing_one() {
        let store = Store::new();
        let backend = Arc::new(FakeBackend::new());
        let clock = FakeClock::new();
        let redactor = Redactor::new();
        let events = EventRecorder::new(store.clone(), redactor.clone(), clock.clone());
        let workspaces = WorkspaceManager::new(store.clone(), backend.clone(), events.clone(), clock.clone());
        let sandboxes = Arc::new(SandboxManager::new(
            store.clone(),
            backend.clone(),
            events.clone(),
            clock.clone(),
            NoopMetrics,
            workspaces,
        ));
        let profile = Profile {
            name: "yolo".into(),
            template_vmid: 9000,
            resources: Default::default(),
            network: Default::default(),
            storage: Default::default(),
            behavior: Default::default(),
            artifacts: Default::default(),
            raw_yaml: String::new(),
        };
        let profiles = ProfileStore::from_profiles(vec![profile]);
        let config = Arc::new(DaemonConfig::default());
        let mut bundle = crate::secrets::SecretsBundle::default();
        bundle.artifact.static_token = Some("static-artifact-token".into());
        bundle.artifact.endpoint = Some("https://artifacts.example.com".into());
        let secrets: Arc<dyn SecretsStore> =
            Arc::new(crate::secrets::fake::FakeSecretsStore::new().with_default(bundle));
        let snippets = Arc::new(SnippetMap::new());
        let writer = Arc::new(FakeSnippetWriter::new());
        let random = Arc::new(FakeRandomSource::new());
        let jobs = JobOrchestrator::new(
            store.clone(),
            backend.clone(),
            profiles.clone(),
            sandboxes,
            events.clone(),
            clock.clone(),
            config.clone(),
            redactor.clone(),
            snippets,
            writer,
            random.clone(),
        );
        let svc = BootstrapService::new(
            store.clone(),
            profiles,
            secrets,
            jobs,
            events,
            clock.clone(),
            config,
            redactor,
            random,
        );

        let sandbox = Sandbox::new(Vmid(1), "yolo", clock.epoch_ms());
        store.insert_sandbox(sandbox).unwrap();
        let job = Job::builder().profile("yolo").sandbox_vmid(Some(Vmid(1))).build();
        store.insert_job(job).unwrap();
        store.insert_bootstrap_token(BootstrapToken::new(
            hash_token("plain-token"),
            Vmid(1),
            clock.epoch_ms() + 60_000,
        ));

        let resp = svc
            .handle_bootstrap(loopback(), BootstrapRequest { token: "plain-token".into(), vmid: 1 })
            .await
            .unwrap();
        let artifact = resp.artifact.unwrap();
        assert_eq!(artifact.token, "static-artifact-token");
        assert_eq!(artifact.endpoint, "https://artifacts.example.com");
    }

    #[tokio::test]
    async fn report_rejects_traffic_outside_agent_subnet() {
        let (svc, _store, _clock, _random) = service();
        let outsider: IpAddr = "203.0.113.9".parse().unwrap();
        let err = svc
            .handle_report(
                outsider,
                RunnerReportRequest {
                    job_id: "job-x".into(),
                    vmid: 1,
                    status: "RUNNING".into(),
                    message: None,
                    artifacts: vec![],
                    result: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::OutsideAgentSubnet));
    }
}
