// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin wrapper over [`sbx_storage::Store`]'s event table that runs every
//! message through the [`Redactor`] first (spec section 4.8).
//!
//! "Never fails the caller on record failure" — the store's in-memory
//! append can't actually fail, but this keeps the shape a real
//! durable-log implementation would need: record errors are logged, not
//! propagated.

use crate::redactor::Redactor;
use sbx_core::{Clock, Event, EventKind, JobId, Vmid};
use sbx_storage::Store;

#[derive(Clone)]
pub struct EventRecorder<C: Clock> {
    store: Store,
    redactor: Redactor,
    clock: C,
}

impl<C: Clock> EventRecorder<C> {
    pub fn new(store: Store, redactor: Redactor, clock: C) -> Self {
        Self { store, redactor, clock }
    }

    pub fn record(
        &self,
        kind: EventKind,
        message: impl Into<String>,
        vmid: Option<Vmid>,
        job_id: Option<JobId>,
        payload: serde_json::Value,
    ) -> Event {
        let message = self.redactor.redact(&message.into());
        let now = self.clock.epoch_ms();
        tracing::info!(%kind, vmid = ?vmid, job_id = ?job_id, %message, "event");
        self.store.append_event(kind, message, vmid, job_id, payload, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbx_core::FakeClock;

    #[test]
    fn record_redacts_sensitive_values_before_appending() {
        let store = Store::new();
        let redactor = Redactor::new();
        redactor.add_sensitive_value("supersecrettoken123");
        let recorder = EventRecorder::new(store.clone(), redactor, FakeClock::new());

        recorder.record(
            EventKind::JobReport,
            "fetched with supersecrettoken123",
            None,
            None,
            serde_json::Value::Null,
        );

        let events = store.list_events(0, 10);
        assert_eq!(events.len(), 1);
        assert!(!events[0].message.contains("supersecrettoken123"));
    }

    #[test]
    fn record_attaches_vmid_and_job_id() {
        let store = Store::new();
        let recorder = EventRecorder::new(store.clone(), Redactor::new(), FakeClock::new());
        let job_id = JobId::new();
        recorder.record(EventKind::JobRunning, "job running", Some(Vmid(9001)), Some(job_id.clone()), serde_json::Value::Null);
        let events = store.list_events(0, 10);
        assert_eq!(events[0].vmid, Some(Vmid(9001)));
        assert_eq!(events[0].job_id.as_ref().unwrap().as_str(), job_id.as_str());
    }
}
