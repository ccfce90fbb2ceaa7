// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-use, hash-only credentials.
//!
//! The plaintext token is only ever held in memory by the issuer (the
//! bootstrap service); the store sees nothing but `token_hash`.

use crate::job::JobId;
use crate::vmid::Vmid;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash a plaintext token for storage/lookup. Hex-encoded SHA-256.
pub fn hash_token(plaintext: &str) -> String {
    let digest = Sha256::digest(plaintext.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Keyed by (token_hash, vmid). Single-use: `consumed_at_ms` set on first
/// successful `Consume`, and a second `Consume` must fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapToken {
    pub token_hash: String,
    pub vmid: Vmid,
    pub expires_at_ms: u64,
    pub consumed_at_ms: Option<u64>,
}

impl BootstrapToken {
    pub fn new(token_hash: impl Into<String>, vmid: Vmid, expires_at_ms: u64) -> Self {
        Self { token_hash: token_hash.into(), vmid, expires_at_ms, consumed_at_ms: None }
    }

    pub fn is_valid(&self, now_ms: u64) -> bool {
        self.consumed_at_ms.is_none() && self.expires_at_ms > now_ms
    }
}

/// Keyed by a unique `token_hash`. Used by guests to upload artifacts;
/// multiple may be issued per job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactToken {
    pub token_hash: String,
    pub job_id: JobId,
    pub vmid: Vmid,
    pub expires_at_ms: u64,
}
