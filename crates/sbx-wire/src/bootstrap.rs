// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bootstrap fetch wire payload (spec section 6 / component 4.4).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `{token, vmid}` — what a freshly booted guest POSTs to fetch its bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BootstrapRequest {
    pub token: String,
    pub vmid: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobWire {
    pub id: String,
    pub repo_url: String,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
    pub task: String,
    pub mode: String,
    pub profile: String,
    pub keepalive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_minutes: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitWire {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_hosts: Option<String>,
}

impl GitWire {
    /// Whether there's anything worth sending — spec says "git/env/Claude
    /// settings when non-empty" are included, all-or-nothing per section.
    pub fn is_empty(&self) -> bool {
        self.token.is_none()
            && self.username.is_none()
            && self.ssh_private_key.is_none()
            && self.ssh_public_key.is_none()
            && self.known_hosts.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactWire {
    pub endpoint: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyWire {
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_sandbox: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inner_sandbox_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BootstrapResponse {
    pub job: JobWire,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claude_settings_json: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactWire>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyWire>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_git_wire_reports_empty() {
        assert!(GitWire::default().is_empty());
        let mut git = GitWire::default();
        git.token = Some("x".into());
        assert!(!git.is_empty());
    }

    #[test]
    fn bootstrap_response_omits_absent_optional_sections() {
        let resp = BootstrapResponse {
            job: JobWire {
                id: "job-1".into(),
                repo_url: "https://ex/r.git".into(),
                git_ref: None,
                task: "t".into(),
                mode: "normal".into(),
                profile: "yolo".into(),
                keepalive: true,
                ttl_minutes: Some(90),
            },
            git: None,
            env: None,
            claude_settings_json: None,
            artifact: None,
            policy: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("\"git\""));
        assert!(!json.contains("\"artifact\""));
        assert!(!json.contains("\"ref\""));
    }
}
