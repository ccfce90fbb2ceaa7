// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Profile data model.
//!
//! The YAML parsing lives in `sbx-profile`; this module only owns the
//! parsed shape and the validation rules that are part of the domain
//! (host-mount detection, firewall-group/mode consistency, inner-sandbox
//! enum). Keeping validation here means the job orchestrator and the
//! profile loader share one source of truth for "is this profile legal".

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkMode {
    Off,
    Nat,
    Allowlist,
}

crate::simple_display! {
    NetworkMode {
        Off => "off",
        Nat => "nat",
        Allowlist => "allowlist",
    }
}

impl NetworkMode {
    /// Each mode maps 1:1 to a canonical firewall group name.
    pub fn canonical_firewall_group(self) -> &'static str {
        match self {
            NetworkMode::Off => "off",
            NetworkMode::Nat => "nat-default",
            NetworkMode::Allowlist => "allowlist-default",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InnerSandbox {
    #[default]
    None,
    Bubblewrap,
}

crate::simple_display! {
    InnerSandbox {
        None => "none",
        Bubblewrap => "bubblewrap",
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSpec {
    #[serde(default)]
    pub cores: Option<u32>,
    #[serde(default)]
    pub memory_mb: Option<u32>,
    #[serde(default)]
    pub cpulist: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(default)]
    pub bridge: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub mode: Option<NetworkMode>,
    #[serde(default)]
    pub firewall: bool,
    #[serde(default)]
    pub firewall_group: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSpec {
    #[serde(default)]
    pub root_size_gb: Option<u32>,
    #[serde(default)]
    pub scsihw: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehaviorSpec {
    #[serde(default)]
    pub keepalive_default: bool,
    #[serde(default)]
    pub ttl_minutes_default: u32,
    /// `None` means unset (fall back to the daemon default); `Some(0)` is an
    /// explicit "never idle-stop", distinct from not setting the field at all.
    #[serde(default)]
    pub idle_stop_minutes_default: Option<u32>,
    #[serde(default)]
    pub inner_sandbox: InnerSandbox,
    #[serde(default)]
    pub inner_sandbox_args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactsSpec {
    #[serde(default)]
    pub ttl_minutes: Option<u32>,
    #[serde(default)]
    pub retention_minutes: Option<u32>,
    #[serde(default)]
    pub retention_hours: Option<u32>,
    #[serde(default)]
    pub retention_days: Option<u32>,
}

impl ArtifactsSpec {
    /// Resolve retention precedence: ttl_minutes > retention_minutes > hours > days.
    /// `None` means "no retention configured" (artifact GC skips these artifacts).
    pub fn retention_minutes(&self) -> Option<u64> {
        if let Some(m) = self.ttl_minutes {
            return Some(m as u64);
        }
        if let Some(m) = self.retention_minutes {
            return Some(m as u64);
        }
        if let Some(h) = self.retention_hours {
            return Some(h as u64 * 60);
        }
        if let Some(d) = self.retention_days {
            return Some(d as u64 * 60 * 24);
        }
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub template_vmid: u32,
    #[serde(default)]
    pub resources: ResourceSpec,
    #[serde(default)]
    pub network: NetworkSpec,
    #[serde(default)]
    pub storage: StorageSpec,
    #[serde(default)]
    pub behavior: BehaviorSpec,
    #[serde(default)]
    pub artifacts: ArtifactsSpec,
    /// The original YAML document text, preserved for later re-parsing.
    #[serde(skip)]
    pub raw_yaml: String,
}

/// Host bind-mount key prefixes that must never appear in a profile's YAML.
/// `host_mount*`/`bind_mount*` are wildcard prefixes per spec (`host_mount_ro`,
/// `bind_mount_extra`, etc. are all forbidden, not just the bare keys).
pub const FORBIDDEN_HOST_MOUNT_KEY_PREFIXES: &[&str] =
    &["host_path", "host_mount", "bind_mount", "virtiofs"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("profile name is required")]
    MissingName,
    #[error("template_vmid must be a positive integer")]
    InvalidTemplateVmid,
    #[error("network.firewall_group requires network.firewall=true")]
    FirewallGroupWithoutFirewall,
    #[error(
        "network.firewall_group {group:?} does not match the canonical group {expected:?} for mode {mode}"
    )]
    FirewallGroupModeMismatch { group: String, expected: String, mode: NetworkMode },
    #[error("profile contains a forbidden host bind-mount key: {key}")]
    HostMountDetected { key: String },
}

impl Profile {
    /// Validate the invariants from spec section 3.
    ///
    /// `raw_yaml` is scanned directly for forbidden keys rather than relying
    /// on the typed struct, since the struct has no field to deserialize a
    /// forbidden key into in the first place — the text scan is what actually
    /// catches the user trying to sneak one in.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.name.trim().is_empty() {
            return Err(ProfileError::MissingName);
        }
        if self.template_vmid == 0 {
            return Err(ProfileError::InvalidTemplateVmid);
        }
        if let Some(key) = yaml_forbidden_host_mount_key(&self.raw_yaml) {
            return Err(ProfileError::HostMountDetected { key });
        }
        if let Some(group) = &self.network.firewall_group {
            if !self.network.firewall {
                return Err(ProfileError::FirewallGroupWithoutFirewall);
            }
            if let Some(mode) = self.network.mode {
                let expected = mode.canonical_firewall_group();
                if group != expected {
                    return Err(ProfileError::FirewallGroupModeMismatch {
                        group: group.clone(),
                        expected: expected.to_string(),
                        mode,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Crude but sufficient key-presence scan over raw YAML text: looks for a
/// `key:` at the start of a (possibly indented) line, case-insensitively,
/// whose key name *starts with* one of `FORBIDDEN_HOST_MOUNT_KEY_PREFIXES`
/// (`host_mount*`/`bind_mount*` are wildcard prefixes, so `host_mount_ro:`
/// and `bind_mount_extra:` are caught along with the bare keys). Returns the
/// matched prefix, for the error message.
fn yaml_forbidden_host_mount_key(raw: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let trimmed = line.trim_start();
        let (key, _) = trimmed.split_once(':')?;
        let lower = key.to_ascii_lowercase();
        FORBIDDEN_HOST_MOUNT_KEY_PREFIXES
            .iter()
            .find(|prefix| lower.starts_with(**prefix))
            .map(|prefix| prefix.to_string())
    })
}

#[cfg(test)]
#[path = "profile_tests.rs"]
mod tests;
