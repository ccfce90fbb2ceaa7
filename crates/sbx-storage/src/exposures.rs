// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exposure table operations.

use crate::error::StoreError;
use crate::state::Store;
use sbx_core::{Exposure, Vmid};

impl Store {
    /// Insert or replace an exposure by name. Fails on name reuse by a
    /// different vmid unless `force` is set, per spec's explicit
    /// create-with-force-to-replace rule.
    pub fn upsert_exposure(&self, exposure: Exposure, force: bool) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if let Some(existing) = state.exposures.get(&exposure.name) {
            if existing.vmid != exposure.vmid && !force {
                return Err(StoreError::ExposureNameConflict(exposure.name));
            }
        }
        state.exposures.insert(exposure.name.clone(), exposure);
        Ok(())
    }

    pub fn get_exposure(&self, name: &str) -> Option<Exposure> {
        self.state.lock().exposures.get(name).cloned()
    }

    pub fn delete_exposure(&self, name: &str) -> Result<Exposure, StoreError> {
        let mut state = self.state.lock();
        state.exposures.remove(name).ok_or_else(|| StoreError::ExposureNotFound(name.to_string()))
    }

    pub fn list_exposures(&self) -> Vec<Exposure> {
        self.state.lock().exposures.values().cloned().collect()
    }

    pub fn list_exposures_for(&self, vmid: Vmid) -> Vec<Exposure> {
        self.state.lock().exposures.values().filter(|e| e.vmid == vmid).cloned().collect()
    }
}

#[cfg(test)]
#[path = "exposures_tests.rs"]
mod tests;
