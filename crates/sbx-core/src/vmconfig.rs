// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The merged provisioning spec handed to `Backend::configure`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SCSIHW: &str = "virtio-scsi-pci";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VmConfig {
    pub cores: Option<u32>,
    pub memory_mb: Option<u32>,
    pub cpulist: Option<String>,
    pub bridge: Option<String>,
    pub model: Option<String>,
    pub root_size_gb: Option<u32>,
    pub scsihw: String,
    pub firewall: bool,
    pub firewall_group: Option<String>,
    pub cloud_init: Option<PathBuf>,
}

impl VmConfig {
    /// Merge a profile's resource/network/storage sections into a VmConfig.
    /// `scsihw` defaults to [`DEFAULT_SCSIHW`] when the profile leaves it unset.
    pub fn from_profile(profile: &crate::profile::Profile) -> Self {
        Self {
            cores: profile.resources.cores,
            memory_mb: profile.resources.memory_mb,
            cpulist: profile.resources.cpulist.clone(),
            bridge: profile.network.bridge.clone(),
            model: profile.network.model.clone(),
            root_size_gb: profile.storage.root_size_gb,
            scsihw: profile.storage.scsihw.clone().unwrap_or_else(|| DEFAULT_SCSIHW.to_string()),
            firewall: profile.network.firewall,
            firewall_group: profile.network.firewall_group.clone(),
            cloud_init: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;

    fn profile() -> Profile {
        Profile {
            name: "yolo".into(),
            template_vmid: 1,
            resources: Default::default(),
            network: Default::default(),
            storage: Default::default(),
            behavior: Default::default(),
            artifacts: Default::default(),
            raw_yaml: String::new(),
        }
    }

    #[test]
    fn scsihw_defaults_when_unset() {
        let cfg = VmConfig::from_profile(&profile());
        assert_eq!(cfg.scsihw, DEFAULT_SCSIHW);
    }

    #[test]
    fn scsihw_honors_profile_override() {
        let mut p = profile();
        p.storage.scsihw = Some("lsi".into());
        let cfg = VmConfig::from_profile(&p);
        assert_eq!(cfg.scsihw, "lsi");
    }
}
