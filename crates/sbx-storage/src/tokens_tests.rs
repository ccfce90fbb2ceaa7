// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sbx_core::{ArtifactToken, BootstrapToken, JobId, Vmid};

#[test]
fn consume_bootstrap_token_succeeds_once() {
    let store = Store::new();
    store.insert_bootstrap_token(BootstrapToken::new("hash-1", Vmid(9000), 1_000));

    let token = store.consume_bootstrap_token("hash-1", Vmid(9000), 100).unwrap();
    assert_eq!(token.consumed_at_ms, Some(100));
}

#[test]
fn consume_bootstrap_token_rejects_second_consume() {
    let store = Store::new();
    store.insert_bootstrap_token(BootstrapToken::new("hash-1", Vmid(9000), 1_000));
    store.consume_bootstrap_token("hash-1", Vmid(9000), 100).unwrap();

    assert!(store.consume_bootstrap_token("hash-1", Vmid(9000), 200).is_err());
}

#[test]
fn consume_bootstrap_token_rejects_expired() {
    let store = Store::new();
    store.insert_bootstrap_token(BootstrapToken::new("hash-1", Vmid(9000), 100));
    assert!(store.consume_bootstrap_token("hash-1", Vmid(9000), 500).is_err());
}

#[test]
fn consume_bootstrap_token_rejects_wrong_vmid() {
    let store = Store::new();
    store.insert_bootstrap_token(BootstrapToken::new("hash-1", Vmid(9000), 1_000));
    assert!(store.consume_bootstrap_token("hash-1", Vmid(9001), 100).is_err());
}

#[test]
fn validate_bootstrap_token_does_not_consume() {
    let store = Store::new();
    store.insert_bootstrap_token(BootstrapToken::new("hash-1", Vmid(9000), 1_000));

    assert!(store.validate_bootstrap_token("hash-1", Vmid(9000), 100));
    assert!(store.validate_bootstrap_token("hash-1", Vmid(9000), 100));
    store.consume_bootstrap_token("hash-1", Vmid(9000), 200).unwrap();
}

#[test]
fn validate_bootstrap_token_rejects_expired_or_wrong_vmid() {
    let store = Store::new();
    store.insert_bootstrap_token(BootstrapToken::new("hash-1", Vmid(9000), 1_000));

    assert!(!store.validate_bootstrap_token("hash-1", Vmid(9000), 1_000));
    assert!(!store.validate_bootstrap_token("hash-1", Vmid(9001), 100));
    assert!(!store.validate_bootstrap_token("missing", Vmid(9000), 100));
}

#[test]
fn insert_artifact_token_rejects_hash_collision() {
    let store = Store::new();
    let job_id = JobId::new();
    store
        .insert_artifact_token(ArtifactToken {
            token_hash: "hash-1".into(),
            job_id: job_id.clone(),
            vmid: Vmid(9000),
            expires_at_ms: 1_000,
        })
        .unwrap();

    let err = store
        .insert_artifact_token(ArtifactToken {
            token_hash: "hash-1".into(),
            job_id,
            vmid: Vmid(9001),
            expires_at_ms: 2_000,
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::UniqueConstraint(_)));
}

#[test]
fn get_artifact_token_round_trips() {
    let store = Store::new();
    let token =
        ArtifactToken { token_hash: "hash-1".into(), job_id: JobId::new(), vmid: Vmid(9000), expires_at_ms: 1_000 };
    store.insert_artifact_token(token).unwrap();
    assert!(store.get_artifact_token("hash-1").is_some());
    assert!(store.get_artifact_token("hash-missing").is_none());
}
