// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parse one YAML document into a validated [`Profile`].

use sbx_core::{Profile, ProfileError};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileLoadError {
    #[error("failed to read {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("failed to parse profile YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] ProfileError),
}

/// Parse and validate a profile from raw YAML text. The original text is
/// preserved on the returned [`Profile`] for the host-mount key scan.
pub fn load_str(raw_yaml: &str) -> Result<Profile, ProfileLoadError> {
    let mut profile: Profile = serde_yaml::from_str(raw_yaml)?;
    profile.raw_yaml = raw_yaml.to_string();
    profile.validate()?;
    Ok(profile)
}

/// Load every `*.yaml`/`*.yml` file directly under `dir` as a profile.
///
/// Non-profile files and subdirectories are skipped. Returns profiles in
/// filename order; callers (see [`crate::store::ProfileStore`]) index them
/// by `profile.name`, which need not match the filename.
pub fn load_dir(dir: &Path) -> Result<Vec<Profile>, ProfileLoadError> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .map_err(|source| ProfileLoadError::Io { path: dir.display().to_string(), source })?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension().and_then(|ext| ext.to_str()).map(|ext| ext == "yaml" || ext == "yml").unwrap_or(false)
        })
        .collect();
    entries.sort();

    let mut profiles = Vec::with_capacity(entries.len());
    for path in entries {
        let raw = std::fs::read_to_string(&path)
            .map_err(|source| ProfileLoadError::Io { path: path.display().to_string(), source })?;
        profiles.push(load_str(&raw)?);
    }
    Ok(profiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name: yolo
template_vmid: 9000
behavior:
  keepalive_default: true
  ttl_minutes_default: 90
"#;

    #[test]
    fn loads_minimal_profile() {
        let profile = load_str(VALID).unwrap();
        assert_eq!(profile.name, "yolo");
        assert_eq!(profile.template_vmid, 9000);
        assert!(profile.behavior.keepalive_default);
        assert_eq!(profile.raw_yaml.trim(), VALID.trim());
    }

    #[test]
    fn rejects_zero_template_vmid() {
        let raw = "name: bad\ntemplate_vmid: 0\n";
        let err = load_str(raw).unwrap_err();
        assert!(matches!(err, ProfileLoadError::Invalid(ProfileError::InvalidTemplateVmid)));
    }

    #[test]
    fn rejects_host_mount_keys() {
        let raw = "name: bad\ntemplate_vmid: 1\nhost_path: /etc/passwd\n";
        let err = load_str(raw);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_host_mount_wildcard_suffix_keys() {
        let raw = "name: bad\ntemplate_vmid: 1\nhost_mount_ro: /etc/passwd\n";
        let err = load_str(raw);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_firewall_group_without_firewall() {
        let raw = r#"
name: bad
template_vmid: 1
network:
  firewall_group: nat-default
"#;
        let err = load_str(raw).unwrap_err();
        assert!(matches!(err, ProfileLoadError::Invalid(ProfileError::FirewallGroupWithoutFirewall)));
    }

    #[test]
    fn rejects_firewall_group_mode_mismatch() {
        let raw = r#"
name: bad
template_vmid: 1
network:
  mode: nat
  firewall: true
  firewall_group: allowlist-default
"#;
        let err = load_str(raw).unwrap_err();
        assert!(matches!(err, ProfileLoadError::Invalid(ProfileError::FirewallGroupModeMismatch { .. })));
    }

    #[test]
    fn accepts_matching_firewall_group() {
        let raw = r#"
name: ok
template_vmid: 1
network:
  mode: nat
  firewall: true
  firewall_group: nat-default
"#;
        assert!(load_str(raw).is_ok());
    }

    #[test]
    fn bad_yaml_is_a_yaml_error() {
        let err = load_str("name: [unterminated").unwrap_err();
        assert!(matches!(err, ProfileLoadError::Yaml(_)));
    }
}
