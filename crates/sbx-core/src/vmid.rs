// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! VM id — the hypervisor-facing identifier for a sandbox.
//!
//! Unlike [`crate::job::JobId`] or [`crate::workspace::WorkspaceId`], a
//! `Vmid` is not an opaque nanoid: it is a positive integer that is
//! meaningful to the hypervisor backend (a Proxmox-style numeric VMID),
//! globally unique across non-destroyed sandboxes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vmid(pub u32);

impl Vmid {
    /// Construct a Vmid, rejecting zero (not a valid vmid per spec).
    pub fn new(v: u32) -> Option<Self> {
        if v == 0 {
            None
        } else {
            Some(Self(v))
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Vmid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Vmid {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert_eq!(Vmid::new(0), None);
    }

    #[test]
    fn positive_round_trips() {
        assert_eq!(Vmid::new(9001).unwrap().get(), 9001);
    }

    #[test]
    fn display_is_bare_number() {
        assert_eq!(Vmid(2001).to_string(), "2001");
    }
}
