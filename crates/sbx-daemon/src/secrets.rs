// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The secrets bundle a guest receives at bootstrap (spec section 4.4
//! step 5, wire shape in section 6).
//!
//! File I/O details of the secrets bundle loader are out of scope; the
//! shape of the bundle and "register env keys with the Redactor before
//! they ever leave the process" are not.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitCredentials {
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

impl GitCredentials {
    fn is_empty(&self) -> bool {
        self.token.is_none()
            && self.username.is_none()
            && self.ssh_private_key.is_none()
            && self.ssh_public_key.is_none()
            && self.known_hosts.is_none()
    }
}

/// Either a pre-configured static artifact credential, or an endpoint the
/// bootstrap service pairs with a freshly issued single-use token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactSecret {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_token: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsBundle {
    #[serde(default)]
    pub git: GitCredentials,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claude_settings_json: Option<String>,
    #[serde(default)]
    pub artifact: ArtifactSecret,
}

impl SecretsBundle {
    pub fn git_if_present(&self) -> Option<&GitCredentials> {
        if self.git.is_empty() {
            None
        } else {
            Some(&self.git)
        }
    }
}

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("failed to read {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("failed to parse secrets TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("no secrets bundle configured for profile {0}")]
    UnknownProfile(String),
}

pub trait SecretsStore: Send + Sync + 'static {
    fn load(&self, profile: &str) -> Result<SecretsBundle, SecretsError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SecretsFile {
    #[serde(default)]
    default: SecretsBundle,
    #[serde(default)]
    profiles: HashMap<String, SecretsBundle>,
}

/// Loads a TOML document once at construction: a `[default]` bundle plus
/// per-profile `[profiles.<name>]` overrides that replace it wholesale.
pub struct FsSecretsStore {
    file: SecretsFile,
}

impl FsSecretsStore {
    pub fn load_from(path: &Path) -> Result<Self, SecretsError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| SecretsError::Io { path: path.display().to_string(), source })?;
        let file: SecretsFile = toml::from_str(&raw)?;
        Ok(Self { file })
    }
}

impl SecretsStore for FsSecretsStore {
    fn load(&self, profile: &str) -> Result<SecretsBundle, SecretsError> {
        Ok(self.file.profiles.get(profile).cloned().unwrap_or_else(|| self.file.default.clone()))
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    #[derive(Default)]
    pub struct FakeSecretsStore {
        bundles: StdHashMap<String, SecretsBundle>,
        default: SecretsBundle,
    }

    impl FakeSecretsStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_default(mut self, bundle: SecretsBundle) -> Self {
            self.default = bundle;
            self
        }

        pub fn with_profile(mut self, profile: impl Into<String>, bundle: SecretsBundle) -> Self {
            self.bundles.insert(profile.into(), bundle);
            self
        }
    }

    impl SecretsStore for FakeSecretsStore {
        fn load(&self, profile: &str) -> Result<SecretsBundle, SecretsError> {
            Ok(self.bundles.get(profile).cloned().unwrap_or_else(|| self.default.clone()))
        }
    }
}
