// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention garbage collection for uploaded artifacts (spec section 4.6).
//!
//! File removal (as opposed to table bookkeeping, which lives in
//! `sbx-storage`) is this crate's concern because it's the one that
//! owns the artifact root path.

use crate::event_recorder::EventRecorder;
use sbx_core::{Clock, EventKind, SandboxState};
use sbx_profile::ProfileStore;
use sbx_storage::Store;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct ArtifactGc<C: Clock> {
    store: Store,
    profiles: ProfileStore,
    events: EventRecorder<C>,
    clock: C,
    artifact_root: PathBuf,
}

impl<C: Clock> ArtifactGc<C> {
    pub fn new(store: Store, profiles: ProfileStore, events: EventRecorder<C>, clock: C, artifact_root: PathBuf) -> Self {
        Self { store, profiles, events, clock, artifact_root }
    }

    fn now(&self) -> u64 {
        self.clock.epoch_ms()
    }

    /// One GC sweep: remove every artifact whose owning job is terminal,
    /// whose owning sandbox is DESTROYED or absent, and whose age exceeds
    /// the owning profile's resolved retention window.
    pub fn run_once(&self) {
        for artifact in self.store.list_artifacts() {
            let Some(job) = self.store.get_job(&artifact.job_id) else { continue };
            if !job.status.is_terminal() {
                continue;
            }
            let sandbox_gone = match artifact.vmid.or(job.sandbox_vmid) {
                Some(vmid) => match self.store.get_sandbox_any(vmid) {
                    Some(sandbox) => sandbox.state == SandboxState::Destroyed,
                    None => true,
                },
                None => true,
            };
            if !sandbox_gone {
                continue;
            }

            let Some(profile) = self.profiles.get(&job.profile) else { continue };
            let Some(retention_minutes) = profile.artifacts.retention_minutes() else { continue };
            if retention_minutes == 0 {
                continue;
            }

            let age_ms = self.now().saturating_sub(job.updated_at_ms.max(artifact.created_at_ms));
            if age_ms <= retention_minutes * 60_000 {
                continue;
            }

            let Some(full_path) = safe_join(&self.artifact_root, &artifact.path) else {
                warn!(artifact_id = %artifact.id, path = %artifact.path, "artifact_gc: unsafe path, skipping");
                continue;
            };

            if let Err(err) = std::fs::remove_file(&full_path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(artifact_id = %artifact.id, %err, "artifact_gc: failed to remove file");
                    continue;
                }
            }

            if self.store.delete_artifact(&artifact.id).is_err() {
                continue;
            }

            self.events.record(
                EventKind::ArtifactGc,
                format!("removed artifact {} for job {}", artifact.id, artifact.job_id),
                artifact.vmid,
                Some(artifact.job_id.clone()),
                serde_json::json!({ "path": artifact.path, "age_ms": age_ms }),
            );

            if let Some(parent) = full_path.parent() {
                let _ = std::fs::remove_dir(parent);
            }
        }
    }
}

/// Join `relative` under `root`, refusing anything that escapes it
/// (`..` components or an absolute path).
fn safe_join(root: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    if rel.is_absolute() || rel.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
        return None;
    }
    Some(root.join(rel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redactor::Redactor;
    use sbx_core::{Artifact, FakeClock, Job, JobStatus, Profile, Sandbox};
    use std::fs;
    use tempfile::tempdir;

    fn gc(root: PathBuf, retention_minutes: u32) -> (ArtifactGc<FakeClock>, Store, FakeClock) {
        let store = Store::new();
        let clock = FakeClock::new();
        let events = EventRecorder::new(store.clone(), Redactor::new(), clock.clone());
        let mut profile = Profile {
            name: "test".into(),
            template_vmid: 9000,
            resources: Default::default(),
            network: Default::default(),
            storage: Default::default(),
            behavior: Default::default(),
            artifacts: Default::default(),
            raw_yaml: String::new(),
        };
        profile.artifacts.retention_minutes = Some(retention_minutes);
        let profiles = ProfileStore::from_profiles(vec![profile]);
        (ArtifactGc::new(store.clone(), profiles, events, clock.clone(), root), store, clock)
    }

    #[tokio::test]
    async fn removes_expired_artifact_for_destroyed_sandbox() {
        let dir = tempdir().unwrap();
        let (gc, store, clock) = gc(dir.path().to_path_buf(), 10);
        clock.advance(std::time::Duration::from_secs(3600));

        let job = Job::builder().profile("test").status(JobStatus::Completed).sandbox_vmid(Some(sbx_core::Vmid(1))).build();
        store.insert_job(job.clone()).unwrap();
        store.insert_sandbox(Sandbox::builder().vmid(sbx_core::Vmid(1)).state(SandboxState::Destroyed).build()).unwrap();

        fs::write(dir.path().join("out.tar.gz"), b"data").unwrap();
        let artifact = Artifact::builder().job_id(job.id.clone()).vmid(sbx_core::Vmid(1)).path("out.tar.gz").build();
        store.insert_artifact(artifact.clone());

        gc.run_once();

        assert!(store.get_artifact(&artifact.id).is_none());
        assert!(!dir.path().join("out.tar.gz").exists());
    }

    #[tokio::test]
    async fn skips_artifact_whose_job_is_not_terminal() {
        let dir = tempdir().unwrap();
        let (gc, store, clock) = gc(dir.path().to_path_buf(), 10);
        clock.advance(std::time::Duration::from_secs(3600));

        let job = Job::builder().profile("test").status(JobStatus::Running).build();
        store.insert_job(job.clone()).unwrap();
        fs::write(dir.path().join("out.tar.gz"), b"data").unwrap();
        let artifact = Artifact::builder().job_id(job.id.clone()).path("out.tar.gz").build();
        store.insert_artifact(artifact.clone());

        gc.run_once();

        assert!(store.get_artifact(&artifact.id).is_some());
    }

    #[tokio::test]
    async fn skips_artifact_within_retention_window() {
        let dir = tempdir().unwrap();
        let (gc, store, _clock) = gc(dir.path().to_path_buf(), 120);

        let job = Job::builder().profile("test").status(JobStatus::Completed).build();
        store.insert_job(job.clone()).unwrap();
        fs::write(dir.path().join("out.tar.gz"), b"data").unwrap();
        let artifact = Artifact::builder().job_id(job.id.clone()).path("out.tar.gz").build();
        store.insert_artifact(artifact.clone());

        gc.run_once();

        assert!(store.get_artifact(&artifact.id).is_some());
    }

    #[test]
    fn safe_join_rejects_parent_dir_escape() {
        assert!(safe_join(Path::new("/srv/artifacts"), "../../etc/passwd").is_none());
        assert!(safe_join(Path::new("/srv/artifacts"), "/etc/passwd").is_none());
        assert!(safe_join(Path::new("/srv/artifacts"), "job-1/out.tar.gz").is_some());
    }
}
