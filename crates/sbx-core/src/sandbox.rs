// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox state and the transition table.
//!
//! A sandbox is a single VM owned by the daemon. Its `state` column is
//! the thing every background loop and the job orchestrator race to
//! update via compare-and-set — see [`SandboxState::can_transition`]
//! for the authoritative table from spec section 3.

use crate::vmid::Vmid;
use crate::workspace::WorkspaceId;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SandboxState {
    Requested,
    Provisioning,
    Booting,
    Ready,
    Running,
    Completed,
    Failed,
    Timeout,
    Stopped,
    Destroyed,
}

crate::simple_display! {
    SandboxState {
        Requested => "REQUESTED",
        Provisioning => "PROVISIONING",
        Booting => "BOOTING",
        Ready => "READY",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Timeout => "TIMEOUT",
        Stopped => "STOPPED",
        Destroyed => "DESTROYED",
    }
}

impl SandboxState {
    /// The allowed-transitions table from spec section 3.
    ///
    /// Self-transitions are always permitted as no-ops and are not part
    /// of this table; callers check `from == to` before consulting it.
    pub fn can_transition(self, to: SandboxState) -> bool {
        use SandboxState::*;
        if self == to {
            return true;
        }
        matches!(
            (self, to),
            (Requested, Provisioning | Timeout | Destroyed)
                | (Provisioning, Booting | Timeout | Destroyed)
                | (Booting, Ready | Timeout | Destroyed)
                | (Ready, Running | Stopped | Timeout | Destroyed)
                | (Running, Completed | Failed | Timeout | Stopped | Destroyed)
                | (Completed | Failed | Timeout, Stopped | Destroyed)
                | (Stopped, Booting | Ready | Running | Destroyed)
        )
    }

    /// True once a sandbox can never leave this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, SandboxState::Destroyed)
    }

    /// True for COMPLETED/FAILED/TIMEOUT — job-terminal but not sandbox-terminal.
    pub fn is_job_terminal(self) -> bool {
        matches!(self, SandboxState::Completed | SandboxState::Failed | SandboxState::Timeout)
    }
}

/// A single VM owned by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sandbox {
    pub vmid: Vmid,
    pub name: String,
    pub profile: String,
    pub state: SandboxState,
    pub ip: Option<String>,
    pub workspace_id: Option<WorkspaceId>,
    pub keepalive: bool,
    /// Zero means "no lease" (sandbox is not subject to lease GC).
    pub lease_expires_at_ms: u64,
    pub last_used_at_ms: u64,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Sandbox {
    pub fn default_name(vmid: Vmid) -> String {
        format!("sandbox-{}", vmid.get())
    }

    pub fn new(vmid: Vmid, profile: impl Into<String>, now_ms: u64) -> Self {
        Self {
            vmid,
            name: Self::default_name(vmid),
            profile: profile.into(),
            state: SandboxState::Requested,
            ip: None,
            workspace_id: None,
            keepalive: false,
            lease_expires_at_ms: 0,
            last_used_at_ms: now_ms,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        }
    }

    pub fn has_lease(&self) -> bool {
        self.lease_expires_at_ms > 0
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct SandboxBuilder => Sandbox {
        set {
            vmid: Vmid = Vmid(1),
            state: SandboxState = SandboxState::Requested,
            keepalive: bool = false,
            lease_expires_at_ms: u64 = 0,
            last_used_at_ms: u64 = 0,
            created_at_ms: u64 = 0,
            updated_at_ms: u64 = 0,
        }
        into {
            profile: String = "default",
        }
        option {
            ip: String = None,
            workspace_id: WorkspaceId = None,
        }
        computed {
            name: String = Sandbox::default_name(self.vmid),
        }
    }
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
