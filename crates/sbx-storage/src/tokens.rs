// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-use credential tables.

use crate::error::StoreError;
use crate::state::Store;
use sbx_core::{ArtifactToken, BootstrapToken, Vmid};

impl Store {
    pub fn insert_bootstrap_token(&self, token: BootstrapToken) {
        let mut state = self.state.lock();
        state.bootstrap_tokens.insert((token.token_hash.clone(), token.vmid), token);
    }

    /// Non-mutating check: exists, matches `vmid`, unexpired, unconsumed.
    /// Used between validate and the later `consume_bootstrap_token` call
    /// so a slow response-composition step doesn't burn the token early.
    pub fn validate_bootstrap_token(&self, token_hash: &str, vmid: Vmid, now_ms: u64) -> bool {
        let state = self.state.lock();
        state
            .bootstrap_tokens
            .get(&(token_hash.to_string(), vmid))
            .is_some_and(|token| token.is_valid(now_ms))
    }

    /// Single-use CAS: only the first `Consume` for a (hash, vmid) pair
    /// observes an unconsumed, unexpired token and may mark it consumed.
    pub fn consume_bootstrap_token(
        &self,
        token_hash: &str,
        vmid: Vmid,
        now_ms: u64,
    ) -> Result<BootstrapToken, StoreError> {
        let mut state = self.state.lock();
        let key = (token_hash.to_string(), vmid);
        let token = state
            .bootstrap_tokens
            .get_mut(&key)
            .ok_or_else(|| StoreError::UniqueConstraint("bootstrap token not found".into()))?;
        if !token.is_valid(now_ms) {
            return Err(StoreError::UniqueConstraint("bootstrap token expired or consumed".into()));
        }
        token.consumed_at_ms = Some(now_ms);
        Ok(token.clone())
    }

    /// Inserts only if `token_hash` is unused; callers retry with a fresh
    /// random token on conflict (spec's "retry up to 5 times" allocator).
    pub fn insert_artifact_token(&self, token: ArtifactToken) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.artifact_tokens.contains_key(&token.token_hash) {
            return Err(StoreError::UniqueConstraint("artifact token hash collision".into()));
        }
        state.artifact_tokens.insert(token.token_hash.clone(), token);
        Ok(())
    }

    pub fn get_artifact_token(&self, token_hash: &str) -> Option<ArtifactToken> {
        self.state.lock().artifact_tokens.get(token_hash).cloned()
    }
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
