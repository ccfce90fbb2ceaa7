// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event log operations.

use crate::state::{MaterializedState, Store};
use sbx_core::{Event, EventKind, JobId, Vmid};

/// Assign the next monotonic id and append, while already holding the lock.
/// Other table modules call this so a state transition and its event land
/// under the same critical section.
pub(crate) fn append_locked(
    state: &mut MaterializedState,
    kind: EventKind,
    message: impl Into<String>,
    vmid: Option<Vmid>,
    job_id: Option<JobId>,
    payload: serde_json::Value,
    now_ms: u64,
) -> Event {
    state.next_event_id += 1;
    let event = Event {
        id: state.next_event_id,
        ts_ms: now_ms,
        kind,
        vmid,
        job_id,
        message: message.into(),
        payload,
    };
    state.events.push(event.clone());
    event
}

impl Store {
    /// Append a standalone event not tied to a table mutation (e.g. the
    /// exposure publisher or artifact GC emitting a summary record).
    pub fn append_event(
        &self,
        kind: EventKind,
        message: impl Into<String>,
        vmid: Option<Vmid>,
        job_id: Option<JobId>,
        payload: serde_json::Value,
        now_ms: u64,
    ) -> Event {
        let mut state = self.state.lock();
        append_locked(&mut state, kind, message, vmid, job_id, payload, now_ms)
    }

    /// Events with `id > since_id`, oldest first, capped at `limit`.
    pub fn list_events(&self, since_id: u64, limit: usize) -> Vec<Event> {
        let state = self.state.lock();
        state.events.iter().filter(|e| e.id > since_id).take(limit).cloned().collect()
    }

    /// The id of the most recently appended event, or 0 if the log is empty.
    pub fn last_event_id(&self) -> u64 {
        self.state.lock().next_event_id
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
