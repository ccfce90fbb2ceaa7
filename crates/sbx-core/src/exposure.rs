// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A tailnet-published TCP endpoint forwarding to a sandbox port.

use crate::vmid::Vmid;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureState {
    Requested,
    Serving,
    Healthy,
    Unhealthy,
    Removed,
}

crate::simple_display! {
    ExposureState {
        Requested => "requested",
        Serving => "serving",
        Healthy => "healthy",
        Unhealthy => "unhealthy",
        Removed => "removed",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exposure {
    pub name: String,
    pub vmid: Vmid,
    pub port: u16,
    pub target_ip: String,
    pub url: String,
    pub state: ExposureState,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// Ports where the exposure publisher also runs an HTTP health probe.
pub const DEFAULT_HTTP_PROBE_PORTS: &[u16] = &[80, 443, 3000, 8000, 8080];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_http_probe_ports_include_common_web_ports() {
        assert!(DEFAULT_HTTP_PROBE_PORTS.contains(&8080));
        assert!(!DEFAULT_HTTP_PROBE_PORTS.contains(&22));
    }
}
