// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory profile cache, loaded once at startup.

use crate::loader::{load_dir, ProfileLoadError};
use sbx_core::Profile;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Profiles loaded by name. Immutable for the lifetime of the process —
/// spec section 9 leaves SIGHUP reload unspecified, so we don't implement
/// it (see DESIGN.md).
#[derive(Clone, Default)]
pub struct ProfileStore {
    by_name: Arc<HashMap<String, Profile>>,
}

impl ProfileStore {
    /// Load every profile YAML file under `dir` once and index by name.
    pub fn load_dir(dir: &Path) -> Result<Self, ProfileLoadError> {
        let profiles = load_dir(dir)?;
        Ok(Self::from_profiles(profiles))
    }

    pub fn from_profiles(profiles: Vec<Profile>) -> Self {
        let by_name = profiles.into_iter().map(|p| (p.name.clone(), p)).collect();
        Self { by_name: Arc::new(by_name) }
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.by_name.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.by_name.keys().map(String::as_str).collect()
    }
}
