// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell-out [`Backend`] driving a Proxmox-style `qm`/`pvesm` CLI.
//!
//! This is illustrative: the concrete hypervisor integration is
//! explicitly out of scope (spec section 1). It exists to show the
//! trait is implementable against a real binary, the way `sbx-daemon`'s
//! tests exercise [`crate::fake_backend::FakeBackend`] instead.

use crate::backend::{Backend, BackendError, VmStats, VmStatus};
use async_trait::async_trait;
use sbx_core::{Vmid, VmConfig};
use tokio::process::Command;

/// Runs `qm`/`pvesm` on the local host. `binary` is configurable for tests
/// that want to point at a stub script instead of the real Proxmox tools.
pub struct ShellBackend {
    qm_binary: String,
    pvesm_binary: String,
}

impl ShellBackend {
    pub fn new() -> Self {
        Self { qm_binary: "qm".to_string(), pvesm_binary: "pvesm".to_string() }
    }

    pub fn with_binaries(qm_binary: impl Into<String>, pvesm_binary: impl Into<String>) -> Self {
        Self { qm_binary: qm_binary.into(), pvesm_binary: pvesm_binary.into() }
    }

    async fn run_qm(&self, args: &[&str]) -> Result<String, BackendError> {
        let output = Command::new(&self.qm_binary)
            .args(args)
            .output()
            .await
            .map_err(|e| BackendError::Other(format!("failed to run {}: {e}", self.qm_binary)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("does not exist") {
                return Err(BackendError::VmNotFound(parse_vmid_from_args(args)));
            }
            return Err(BackendError::Other(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run_pvesm(&self, args: &[&str]) -> Result<String, BackendError> {
        let output = Command::new(&self.pvesm_binary)
            .args(args)
            .output()
            .await
            .map_err(|e| BackendError::Other(format!("failed to run {}: {e}", self.pvesm_binary)))?;
        if !output.status.success() {
            return Err(BackendError::Other(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for ShellBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_vmid_from_args(args: &[&str]) -> Vmid {
    args.iter().find_map(|a| a.parse::<u32>().ok()).map(Vmid).unwrap_or(Vmid(0))
}

#[async_trait]
impl Backend for ShellBackend {
    async fn validate_template(&self, vmid: Vmid) -> Result<(), BackendError> {
        let id = vmid.to_string();
        self.run_qm(&["config", &id]).await.map(|_| ())
    }

    async fn clone_vm(&self, template_vmid: Vmid, new_vmid: Vmid, name: &str) -> Result<(), BackendError> {
        let template = template_vmid.to_string();
        let new_id = new_vmid.to_string();
        self.run_qm(&["clone", &template, &new_id, "--name", name]).await.map(|_| ())
    }

    async fn configure(&self, vmid: Vmid, cfg: &VmConfig) -> Result<(), BackendError> {
        let id = vmid.to_string();
        let mut args: Vec<String> = vec!["set".to_string(), id];
        if let Some(cores) = cfg.cores {
            args.push("--cores".to_string());
            args.push(cores.to_string());
        }
        if let Some(memory) = cfg.memory_mb {
            args.push("--memory".to_string());
            args.push(memory.to_string());
        }
        if cfg.bridge.is_some() || cfg.model.is_some() {
            let model = cfg.model.as_deref().unwrap_or("virtio");
            let bridge = cfg.bridge.as_deref().unwrap_or("vmbr0");
            let firewall = if cfg.firewall { ",firewall=1" } else { "" };
            args.push("--net0".to_string());
            args.push(format!("model={model},bridge={bridge}{firewall}"));
        }
        args.push("--scsihw".to_string());
        args.push(cfg.scsihw.clone());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_qm(&arg_refs).await.map(|_| ())
    }

    async fn start(&self, vmid: Vmid) -> Result<(), BackendError> {
        let id = vmid.to_string();
        self.run_qm(&["start", &id]).await.map(|_| ())
    }

    async fn stop(&self, vmid: Vmid) -> Result<(), BackendError> {
        let id = vmid.to_string();
        self.run_qm(&["stop", &id]).await.map(|_| ())
    }

    async fn destroy(&self, vmid: Vmid) -> Result<(), BackendError> {
        let id = vmid.to_string();
        self.run_qm(&["destroy", &id]).await.map(|_| ())
    }

    async fn status(&self, vmid: Vmid) -> Result<VmStatus, BackendError> {
        let id = vmid.to_string();
        let out = self.run_qm(&["status", &id]).await?;
        Ok(if out.contains("status: running") {
            VmStatus::Running
        } else if out.contains("status: stopped") {
            VmStatus::Stopped
        } else {
            VmStatus::Unknown
        })
    }

    async fn guest_ip(&self, vmid: Vmid) -> Result<String, BackendError> {
        let id = vmid.to_string();
        let out = self.run_qm(&["guest", "cmd", &id, "network-get-interfaces"]).await?;
        first_non_loopback_ip(&out).ok_or(BackendError::GuestIpNotFound(vmid))
    }

    async fn current_stats(&self, vmid: Vmid) -> Result<VmStats, BackendError> {
        let id = vmid.to_string();
        let out = self.run_qm(&["status", &id, "--verbose"]).await?;
        let cpu_usage = out
            .lines()
            .find_map(|l| l.strip_prefix("cpu: "))
            .and_then(|v| v.trim().parse::<f64>().ok())
            .unwrap_or(0.0);
        Ok(VmStats { cpu_usage })
    }

    async fn snapshot_rollback(&self, vmid: Vmid, name: &str) -> Result<(), BackendError> {
        let id = vmid.to_string();
        self.run_qm(&["rollback", &id, name]).await.map(|_| ())
    }

    async fn create_volume(&self, storage: &str, id: &str, size_gb: u32) -> Result<String, BackendError> {
        let size = format!("{size_gb}G");
        self.run_pvesm(&["alloc", storage, "0", id, &size]).await?;
        Ok(format!("{storage}:{id}"))
    }

    async fn delete_volume(&self, volid: &str) -> Result<(), BackendError> {
        self.run_pvesm(&["free", volid]).await.map(|_| ())
    }

    async fn attach_volume(&self, vmid: Vmid, volid: &str, slot: &str) -> Result<(), BackendError> {
        let id = vmid.to_string();
        let flag = format!("--{slot}");
        self.run_qm(&["set", &id, &flag, volid]).await.map(|_| ())
    }

    async fn detach_volume(&self, vmid: Vmid, slot: &str) -> Result<(), BackendError> {
        let id = vmid.to_string();
        let flag = format!("--{slot}");
        self.run_qm(&["unset", &id, &flag]).await.map(|_| ())
    }
}

/// Very small slice of the `network-get-interfaces` JSON: good enough to
/// pull the first plausible IPv4 address out without a full qemu-guest-agent
/// schema (that belongs to the hypervisor integration, out of scope).
fn first_non_loopback_ip(raw: &str) -> Option<String> {
    for token in raw.split(['"', ',']) {
        if token.starts_with("10.") || token.starts_with("192.168.") || token.starts_with("172.") {
            return Some(token.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_non_loopback_ip_finds_private_address() {
        let raw = r#"{"ip-address":"127.0.0.1"},{"ip-address":"10.77.0.12"}"#;
        assert_eq!(first_non_loopback_ip(raw), Some("10.77.0.12".to_string()));
    }

    #[test]
    fn first_non_loopback_ip_none_when_absent() {
        assert_eq!(first_non_loopback_ip(r#"{"ip-address":"127.0.0.1"}"#), None);
    }

    #[test]
    fn parse_vmid_from_args_finds_first_number() {
        assert_eq!(parse_vmid_from_args(&["stop", "9001"]), Vmid(9001));
        assert_eq!(parse_vmid_from_args(&["stop"]), Vmid(0));
    }
}
