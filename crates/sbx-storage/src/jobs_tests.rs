// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sbx_core::{Job, JobStatus, Vmid};

#[test]
fn insert_then_get_round_trips() {
    let store = Store::new();
    let job = Job::builder().build();
    let id = job.id.clone();
    store.insert_job(job).unwrap();
    assert_eq!(store.get_job(&id).unwrap().status, JobStatus::Queued);
}

#[test]
fn get_missing_job_is_none() {
    let store = Store::new();
    assert!(store.get_job(&sbx_core::JobId::from_string("job-nope")).is_none());
}

#[test]
fn bind_job_sandbox_sets_vmid() {
    let store = Store::new();
    let job = Job::builder().build();
    let id = job.id.clone();
    store.insert_job(job).unwrap();
    let bound = store.bind_job_sandbox(&id, Vmid(9000), 10).unwrap();
    assert_eq!(bound.sandbox_vmid, Some(Vmid(9000)));
}

#[test]
fn bind_job_sandbox_rejects_second_nonterminal_job_on_same_vmid() {
    let store = Store::new();
    let first = Job::builder().build();
    let first_id = first.id.clone();
    store.insert_job(first).unwrap();
    store.bind_job_sandbox(&first_id, Vmid(9000), 1).unwrap();

    let second = Job::builder().build();
    let second_id = second.id.clone();
    store.insert_job(second).unwrap();
    let err = store.bind_job_sandbox(&second_id, Vmid(9000), 2).unwrap_err();
    assert_eq!(err, StoreError::SandboxAlreadyBound(Vmid(9000)));
}

#[test]
fn bind_job_sandbox_allows_rebind_once_first_job_terminal() {
    let store = Store::new();
    let first = Job::builder().status(JobStatus::Completed).build();
    let first_id = first.id.clone();
    store.insert_job(first).unwrap();
    store.bind_job_sandbox(&first_id, Vmid(9000), 1).unwrap();

    let second = Job::builder().build();
    let second_id = second.id.clone();
    store.insert_job(second).unwrap();
    assert!(store.bind_job_sandbox(&second_id, Vmid(9000), 2).is_ok());
}

#[test]
fn update_job_result_sets_status_and_payload() {
    let store = Store::new();
    let job = Job::builder().status(JobStatus::Running).build();
    let id = job.id.clone();
    store.insert_job(job).unwrap();

    let payload = serde_json::json!({"ok": true});
    let updated = store.update_job_result(&id, JobStatus::Completed, payload.clone(), 99).unwrap();
    assert_eq!(updated.status, JobStatus::Completed);
    assert_eq!(updated.result, Some(payload));
}

#[test]
fn update_job_result_rejects_already_finalized() {
    let store = Store::new();
    let job = Job::builder().status(JobStatus::Failed).build();
    let id = job.id.clone();
    store.insert_job(job).unwrap();

    let err = store
        .update_job_result(&id, JobStatus::Completed, serde_json::Value::Null, 1)
        .unwrap_err();
    assert_eq!(err, StoreError::JobAlreadyFinalized);
}

#[test]
fn set_job_defaults_resolves_ttl_and_keepalive() {
    let store = Store::new();
    let job = Job::builder().build();
    let id = job.id.clone();
    store.insert_job(job).unwrap();

    let updated = store.set_job_defaults(&id, 90, true, 10).unwrap();
    assert_eq!(updated.ttl_minutes, 90);
    assert_eq!(updated.keepalive, Some(true));
}

#[test]
fn list_non_terminal_jobs_for_filters_by_vmid_and_status() {
    let store = Store::new();
    let running = Job::builder().status(JobStatus::Running).sandbox_vmid(Some(Vmid(9000))).build();
    let done = Job::builder().status(JobStatus::Completed).sandbox_vmid(Some(Vmid(9000))).build();
    let other_vm = Job::builder().status(JobStatus::Running).sandbox_vmid(Some(Vmid(9001))).build();
    store.insert_job(running).unwrap();
    store.insert_job(done).unwrap();
    store.insert_job(other_vm).unwrap();

    let active = store.list_non_terminal_jobs_for(Vmid(9000));
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].status, JobStatus::Running);
}
