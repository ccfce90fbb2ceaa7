// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox table operations: insert, lookup, and the CAS transition.

use crate::error::StoreError;
use crate::state::Store;
use sbx_core::{Clock, Sandbox, SandboxState, Vmid};
use tracing::debug;

impl Store {
    /// Insert a newly allocated sandbox. Fails if the vmid is already in
    /// use by a non-destroyed sandbox.
    pub fn insert_sandbox(&self, sandbox: Sandbox) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if let Some(existing) = state.sandboxes.get(&sandbox.vmid) {
            if !existing.state.is_terminal() {
                return Err(StoreError::VmidAlreadyExists(sandbox.vmid));
            }
        }
        state.sandboxes.insert(sandbox.vmid, sandbox);
        Ok(())
    }

    /// Look up a sandbox. A DESTROYED sandbox is treated as non-existent.
    pub fn get_sandbox(&self, vmid: Vmid) -> Option<Sandbox> {
        let state = self.state.lock();
        state.sandboxes.get(&vmid).filter(|s| !s.state.is_terminal()).cloned()
    }

    /// Look up a sandbox regardless of state, for reconciliation/debug paths
    /// that must be able to see DESTROYED sandboxes too.
    pub fn get_sandbox_any(&self, vmid: Vmid) -> Option<Sandbox> {
        self.state.lock().sandboxes.get(&vmid).cloned()
    }

    /// All non-destroyed sandboxes.
    pub fn list_sandboxes(&self) -> Vec<Sandbox> {
        self.state.lock().sandboxes.values().filter(|s| !s.state.is_terminal()).cloned().collect()
    }

    /// The smallest vmid `>= start` not currently held by a non-destroyed
    /// sandbox. Callers should retry `insert_sandbox` on a uniqueness
    /// conflict with the next candidate, per spec's "monotonic allocator
    /// ... with uniqueness retry".
    pub fn next_free_vmid(&self, start: u32) -> Vmid {
        let state = self.state.lock();
        let mut candidate = start.max(1);
        loop {
            let vmid = Vmid(candidate);
            let taken = state.sandboxes.get(&vmid).is_some_and(|s| !s.state.is_terminal());
            if !taken {
                return vmid;
            }
            candidate += 1;
        }
    }

    /// Compare-and-set transition. Self-transitions are no-ops. On
    /// success, emits a `sandbox.state` event with message `"<from> -> <to>"`.
    pub fn transition_sandbox<C: Clock>(
        &self,
        vmid: Vmid,
        to: SandboxState,
        clock: &C,
    ) -> Result<Sandbox, StoreError> {
        let mut state = self.state.lock();
        let sandbox = state.sandboxes.get(&vmid).ok_or(StoreError::SandboxNotFound(vmid))?;
        let from = sandbox.state;
        if !from.can_transition(to) {
            return Err(StoreError::InvalidTransition { from, to });
        }
        let now = clock.epoch_ms();
        let message = format!("{from} -> {to}");
        let sandbox = state.sandboxes.get_mut(&vmid).ok_or(StoreError::SandboxNotFound(vmid))?;
        sandbox.state = to;
        sandbox.updated_at_ms = now;
        let updated = sandbox.clone();
        debug!(vmid = %vmid, %from, %to, "sandbox transition");
        if from != to {
            crate::events::append_locked(
                &mut state,
                sbx_core::EventKind::SandboxState,
                message,
                Some(vmid),
                None,
                serde_json::Value::Null,
                now,
            );
        }
        Ok(updated)
    }

    /// Bypasses the transition table — used by recovery paths.
    pub fn force_destroy(&self, vmid: Vmid, now_ms: u64) -> Option<Sandbox> {
        let mut state = self.state.lock();
        let sandbox = state.sandboxes.get_mut(&vmid)?;
        sandbox.state = SandboxState::Destroyed;
        sandbox.updated_at_ms = now_ms;
        Some(sandbox.clone())
    }

    /// Bypasses the transition table — used by Revert, which must be able
    /// to force a sandbox stuck in BOOTING/PROVISIONING back to STOPPED
    /// even though that pair has no arm in `can_transition`.
    pub fn force_stop(&self, vmid: Vmid, now_ms: u64) -> Option<Sandbox> {
        let mut state = self.state.lock();
        let sandbox = state.sandboxes.get_mut(&vmid)?;
        sandbox.state = SandboxState::Stopped;
        sandbox.updated_at_ms = now_ms;
        Some(sandbox.clone())
    }

    pub fn update_sandbox_ip(&self, vmid: Vmid, ip: impl Into<String>, now_ms: u64) {
        let mut state = self.state.lock();
        if let Some(sandbox) = state.sandboxes.get_mut(&vmid) {
            sandbox.ip = Some(ip.into());
            sandbox.updated_at_ms = now_ms;
        }
    }

    pub fn touch_sandbox_last_used(&self, vmid: Vmid, now_ms: u64) {
        let mut state = self.state.lock();
        if let Some(sandbox) = state.sandboxes.get_mut(&vmid) {
            sandbox.last_used_at_ms = now_ms;
        }
    }

    /// Only for `keepalive=true` sandboxes not in DESTROYED.
    pub fn renew_lease(&self, vmid: Vmid, expires_at_ms: u64) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let sandbox =
            state.sandboxes.get_mut(&vmid).ok_or(StoreError::SandboxNotFound(vmid))?;
        if !sandbox.keepalive || sandbox.state.is_terminal() {
            return Err(StoreError::LeaseNotRenewable);
        }
        sandbox.lease_expires_at_ms = expires_at_ms;
        Ok(())
    }

    pub fn set_sandbox_lease(&self, vmid: Vmid, expires_at_ms: u64) {
        let mut state = self.state.lock();
        if let Some(sandbox) = state.sandboxes.get_mut(&vmid) {
            sandbox.lease_expires_at_ms = expires_at_ms;
        }
    }

    pub fn set_sandbox_keepalive(&self, vmid: Vmid, keepalive: bool) {
        let mut state = self.state.lock();
        if let Some(sandbox) = state.sandboxes.get_mut(&vmid) {
            sandbox.keepalive = keepalive;
        }
    }
}

#[cfg(test)]
#[path = "sandboxes_tests.rs"]
mod tests;
