// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interval loop that stops RUNNING sandboxes nobody is using (spec
//! section 4.5).
//!
//! The "last active" clock for a sandbox is tracked in memory across
//! evaluations, seeded from the store's own `last_used_at`/`updated_at`
//! columns so a freshly restarted daemon doesn't immediately treat every
//! sandbox as idle-for-a-long-time.

use crate::config::DaemonConfig;
use crate::event_recorder::EventRecorder;
use crate::metrics::{Metrics, NoopMetrics};
use crate::sandbox_manager::SandboxManager;
use parking_lot::Mutex;
use sbx_adapters::{Backend, SshActivityProbe};
use sbx_core::{Clock, EventKind, SandboxState, Vmid};
use sbx_profile::ProfileStore;
use sbx_storage::Store;
use std::collections::HashMap;
use std::sync::Arc;

pub struct IdleStopper<C: Clock, M: Metrics = NoopMetrics> {
    store: Store,
    backend: Arc<dyn Backend>,
    sandboxes: Arc<SandboxManager<C, M>>,
    ssh_probe: Arc<dyn SshActivityProbe>,
    events: EventRecorder<C>,
    profiles: ProfileStore,
    clock: C,
    config: Arc<DaemonConfig>,
    last_active_ms: Mutex<HashMap<Vmid, u64>>,
}

impl<C: Clock, M: Metrics> IdleStopper<C, M> {
    pub fn new(
        store: Store,
        backend: Arc<dyn Backend>,
        sandboxes: Arc<SandboxManager<C, M>>,
        ssh_probe: Arc<dyn SshActivityProbe>,
        events: EventRecorder<C>,
        profiles: ProfileStore,
        clock: C,
        config: Arc<DaemonConfig>,
    ) -> Self {
        Self { store, backend, sandboxes, ssh_probe, events, profiles, clock, config, last_active_ms: Mutex::new(HashMap::new()) }
    }

    fn now(&self) -> u64 {
        self.clock.epoch_ms()
    }

    fn mark_active_now(&self, vmid: Vmid, now: u64) {
        self.last_active_ms.lock().insert(vmid, now);
    }

    /// `Some(n)` on the profile (including `Some(0)`, an explicit disable)
    /// always wins; only an unset (`None`) field falls back to the
    /// daemon-wide default.
    fn idle_stop_minutes(&self, profile_name: &str) -> u32 {
        match self.profiles.get(profile_name).and_then(|p| p.behavior.idle_stop_minutes_default) {
            Some(minutes) => minutes,
            None => self.config.idle_stop_minutes_default,
        }
    }

    /// One evaluation pass over every RUNNING sandbox.
    pub async fn run_once(&self) {
        let now = self.now();
        for sandbox in self.store.list_sandboxes() {
            if sandbox.state != SandboxState::Running {
                continue;
            }
            self.evaluate(sandbox.vmid, now).await;
        }
    }

    async fn evaluate(&self, vmid: Vmid, now: u64) {
        let Some(sandbox) = self.store.get_sandbox(vmid) else { return };
        let idle_minutes = self.idle_stop_minutes(&sandbox.profile);
        if idle_minutes == 0 {
            return;
        }
        let idle_window_ms = idle_minutes as u64 * 60_000;

        let tracked = self.last_active_ms.lock().get(&vmid).copied().unwrap_or(0);
        let mut last_active = tracked.max(sandbox.updated_at_ms).max(sandbox.last_used_at_ms);
        if last_active == 0 || last_active > now {
            last_active = now;
        }

        if let Some(job) = self.store.job_for_sandbox(vmid) {
            if matches!(job.status, sbx_core::JobStatus::Queued | sbx_core::JobStatus::Running) {
                self.mark_active_now(vmid, now);
                return;
            }
        }

        let mut ip = sandbox.ip.clone();
        if ip.is_none() {
            if let Ok(found) = self.backend.guest_ip(vmid).await {
                if !found.is_empty() {
                    self.store.update_sandbox_ip(vmid, found.clone(), now);
                    ip = Some(found);
                }
            }
        }
        let Some(ip) = ip else {
            // Can't probe SSH without an IP yet; defer judgement this cycle.
            self.last_active_ms.lock().insert(vmid, last_active);
            return;
        };

        if self.ssh_probe.has_active_session(&ip).await {
            self.mark_active_now(vmid, now);
            return;
        }

        let cpu_usage = match self.backend.current_stats(vmid).await {
            Ok(stats) => stats.cpu_usage,
            Err(_) => {
                self.last_active_ms.lock().insert(vmid, last_active);
                return;
            }
        };
        if cpu_usage > self.config.cpu_threshold {
            self.mark_active_now(vmid, now);
            return;
        }

        if now.saturating_sub(last_active) >= idle_window_ms {
            let idle_for_minutes = now.saturating_sub(last_active) / 60_000;
            let payload = serde_json::json!({
                "idle_minutes": idle_minutes,
                "idle_for_minutes": idle_for_minutes,
                "last_active_at": last_active,
                "cpu_usage": cpu_usage,
                "cpu_threshold": self.config.cpu_threshold,
                "ssh_active": false,
            });
            let result = self.sandboxes.stop(vmid).await;
            let mut payload = payload;
            if let Err(err) = &result {
                payload["error"] = serde_json::Value::String(err.to_string());
            }
            self.events.record(EventKind::SandboxIdleStop, "idle stop", Some(vmid), None, payload);
            self.last_active_ms.lock().remove(&vmid);
        } else {
            self.last_active_ms.lock().insert(vmid, last_active);
        }
    }
}
