// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sbx_core::ArtifactBuilder;

#[test]
fn insert_then_get_round_trips() {
    let store = Store::new();
    let artifact = ArtifactBuilder::default().build();
    let id = artifact.id.clone();
    store.insert_artifact(artifact);
    assert_eq!(store.get_artifact(&id).unwrap().id, id);
}

#[test]
fn list_artifacts_for_job_filters_by_job_id() {
    let store = Store::new();
    let job_id = JobId::new();
    store.insert_artifact(ArtifactBuilder::default().job_id(job_id.clone()).build());
    store.insert_artifact(ArtifactBuilder::default().job_id(JobId::new()).build());
    assert_eq!(store.list_artifacts_for_job(&job_id).len(), 1);
}

#[test]
fn delete_missing_artifact_errors() {
    let store = Store::new();
    let err = store.delete_artifact(&ArtifactId::new()).unwrap_err();
    assert!(matches!(err, StoreError::ArtifactNotFound(_)));
}

#[test]
fn delete_removes_from_table() {
    let store = Store::new();
    let artifact = ArtifactBuilder::default().build();
    let id = artifact.id.clone();
    store.insert_artifact(artifact);
    store.delete_artifact(&id).unwrap();
    assert!(store.get_artifact(&id).is_none());
}
