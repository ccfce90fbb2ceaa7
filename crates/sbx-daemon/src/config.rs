// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-wide defaults (SPEC_FULL.md section B/C).
//!
//! spec.md states most of these only in prose ("interval 30s by
//! default", "cpu_threshold (default 0.05)", ...). This struct is the
//! one place they're formalized; `Default` matches spec.md's stated
//! values exactly. Loaded from a TOML file the way the teacher loads
//! its own config, via [`DaemonConfig::load`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Interval between lease-GC sweeps.
    pub lease_gc_interval_secs: u64,
    /// Interval between reconciler sweeps.
    pub reconciler_interval_secs: u64,
    /// Interval between idle-stopper sweeps.
    pub idle_stopper_interval_secs: u64,
    /// Interval between artifact-GC sweeps.
    pub artifact_gc_interval_secs: u64,
    /// Daemon-wide idle-stop default when a profile doesn't set one; 0 disables.
    pub idle_stop_minutes_default: u32,
    /// CPU usage fraction above which a sandbox is considered non-idle.
    pub cpu_threshold: f64,
    /// Ports where the exposure publisher also runs an HTTP health probe.
    pub http_probe_ports: Vec<u16>,
    /// Per-source-IP token bucket for the bootstrap/report endpoints.
    pub rate_limit_qps: f64,
    pub rate_limit_burst: f64,
    /// Bootstrap token TTL.
    pub bootstrap_token_ttl_secs: u64,
    /// Job provisioning pipeline budget.
    pub provision_timeout_secs: u64,
    /// `failJob` cleanup budget (runs under a detached context).
    pub failure_cleanup_timeout_secs: u64,
    /// Guest IP lookup budget during provisioning.
    pub guest_ip_timeout_secs: u64,
    /// Guest IP lookup budget during reconciliation (tighter than provisioning).
    pub reconciler_ip_timeout_secs: u64,
    /// Bootstrap/artifact TCP probe budget for the exposure publisher.
    pub exposure_probe_timeout_secs: u64,
    /// Tailscale CLI invocation budget.
    pub tailnet_command_timeout_secs: u64,
    /// CIDR guest-facing endpoints accept traffic from.
    pub agent_subnet_cidr: String,
    /// Root directory artifact files are stored under.
    pub artifact_root: PathBuf,
    /// Operator socket path (Unix domain socket).
    pub operator_socket_path: PathBuf,
    /// Guest-facing listener bind address.
    pub guest_listen_addr: String,
    /// SSH public key written into every guest's cloud-init snippet.
    pub guest_ssh_public_key: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            lease_gc_interval_secs: 30,
            reconciler_interval_secs: 30,
            idle_stopper_interval_secs: 30,
            artifact_gc_interval_secs: 600,
            idle_stop_minutes_default: 0,
            cpu_threshold: 0.05,
            http_probe_ports: sbx_core::DEFAULT_HTTP_PROBE_PORTS.to_vec(),
            rate_limit_qps: 2.0,
            rate_limit_burst: 5.0,
            bootstrap_token_ttl_secs: 600,
            provision_timeout_secs: 600,
            failure_cleanup_timeout_secs: 30,
            guest_ip_timeout_secs: 30,
            reconciler_ip_timeout_secs: 2,
            exposure_probe_timeout_secs: 2,
            tailnet_command_timeout_secs: 10,
            agent_subnet_cidr: "10.77.0.0/16".to_string(),
            artifact_root: PathBuf::from("/var/lib/sbx/artifacts"),
            operator_socket_path: PathBuf::from("/run/sbx/operator.sock"),
            guest_listen_addr: "10.77.0.1:8088".to_string(),
            guest_ssh_public_key: String::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("failed to parse config TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn lease_gc_interval(&self) -> Duration {
        Duration::from_secs(self.lease_gc_interval_secs)
    }

    pub fn reconciler_interval(&self) -> Duration {
        Duration::from_secs(self.reconciler_interval_secs)
    }

    pub fn idle_stopper_interval(&self) -> Duration {
        Duration::from_secs(self.idle_stopper_interval_secs)
    }

    pub fn artifact_gc_interval(&self) -> Duration {
        Duration::from_secs(self.artifact_gc_interval_secs)
    }

    pub fn provision_timeout(&self) -> Duration {
        Duration::from_secs(self.provision_timeout_secs)
    }

    pub fn failure_cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.failure_cleanup_timeout_secs)
    }

    pub fn guest_ip_timeout(&self) -> Duration {
        Duration::from_secs(self.guest_ip_timeout_secs)
    }

    pub fn reconciler_ip_timeout(&self) -> Duration {
        Duration::from_secs(self.reconciler_ip_timeout_secs)
    }

    pub fn bootstrap_token_ttl(&self) -> Duration {
        Duration::from_secs(self.bootstrap_token_ttl_secs)
    }

    pub fn exposure_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.exposure_probe_timeout_secs)
    }

    pub fn tailnet_command_timeout(&self) -> Duration {
        Duration::from_secs(self.tailnet_command_timeout_secs)
    }

    /// URL a guest uses to reach the bootstrap/report listener.
    pub fn controller_url(&self) -> String {
        format!("http://{}", self.guest_listen_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_stated_values() {
        let cfg = DaemonConfig::default();
        assert_eq!(cfg.lease_gc_interval_secs, 30);
        assert_eq!(cfg.cpu_threshold, 0.05);
        assert_eq!(cfg.provision_timeout_secs, 600);
        assert_eq!(cfg.failure_cleanup_timeout_secs, 30);
        assert_eq!(cfg.guest_ip_timeout_secs, 30);
        assert_eq!(cfg.reconciler_ip_timeout_secs, 2);
        assert_eq!(cfg.bootstrap_token_ttl_secs, 600);
        assert_eq!(cfg.http_probe_ports, vec![80, 443, 3000, 8000, 8080]);
    }

    #[test]
    fn partial_toml_overrides_only_specified_fields() {
        let toml = "cpu_threshold = 0.2\nartifact_gc_interval_secs = 120\n";
        let cfg: DaemonConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.cpu_threshold, 0.2);
        assert_eq!(cfg.artifact_gc_interval_secs, 120);
        assert_eq!(cfg.lease_gc_interval_secs, 30);
    }

    #[test]
    fn load_missing_file_is_an_io_error() {
        let err = DaemonConfig::load(Path::new("/nonexistent/sbxd.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
