// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional metrics collaborator for the sandbox manager (spec section
//! 4.1's "Metrics (optional collaborator)" paragraph).
//!
//! spec section 1 puts metrics exposition out of scope; what's left in
//! scope is the small set of observations the sandbox manager makes as
//! it drives transitions. [`NoopMetrics`] is the default — a real
//! exporter (Prometheus, statsd, ...) plugs in by implementing
//! [`Metrics`] and is outside this crate's concern.

use sbx_core::SandboxState;
use std::time::Duration;

/// Outcome label for a start/stop/destroy/revert operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

pub trait Metrics: Send + Sync + 'static {
    fn record_transition(&self, from: SandboxState, to: SandboxState);
    /// Observed once per sandbox, on the transition into RUNNING.
    fn observe_provision_duration(&self, duration: Duration);
    fn record_start(&self, duration: Duration, outcome: Outcome);
    fn record_stop(&self, duration: Duration, outcome: Outcome);
    fn record_destroy(&self, duration: Duration, outcome: Outcome);
    fn record_revert(&self, duration: Duration, outcome: Outcome);
}

/// Default no-op implementation; used whenever no exporter is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn record_transition(&self, _from: SandboxState, _to: SandboxState) {}
    fn observe_provision_duration(&self, _duration: Duration) {}
    fn record_start(&self, _duration: Duration, _outcome: Outcome) {}
    fn record_stop(&self, _duration: Duration, _outcome: Outcome) {}
    fn record_destroy(&self, _duration: Duration, _outcome: Outcome) {}
    fn record_revert(&self, _duration: Duration, _outcome: Outcome) {}
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, Default)]
    pub struct RecordedCall {
        pub kind: &'static str,
        pub outcome: Option<Outcome>,
    }

    /// Records every call for assertions in sandbox-manager tests.
    #[derive(Clone, Default)]
    pub struct FakeMetrics {
        calls: Arc<Mutex<Vec<RecordedCall>>>,
        transitions: Arc<Mutex<Vec<(SandboxState, SandboxState)>>>,
    }

    impl FakeMetrics {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().clone()
        }

        pub fn transitions(&self) -> Vec<(SandboxState, SandboxState)> {
            self.transitions.lock().clone()
        }
    }

    impl Metrics for FakeMetrics {
        fn record_transition(&self, from: SandboxState, to: SandboxState) {
            self.transitions.lock().push((from, to));
        }

        fn observe_provision_duration(&self, _duration: Duration) {
            self.calls.lock().push(RecordedCall { kind: "provision", outcome: None });
        }

        fn record_start(&self, _duration: Duration, outcome: Outcome) {
            self.calls.lock().push(RecordedCall { kind: "start", outcome: Some(outcome) });
        }

        fn record_stop(&self, _duration: Duration, outcome: Outcome) {
            self.calls.lock().push(RecordedCall { kind: "stop", outcome: Some(outcome) });
        }

        fn record_destroy(&self, _duration: Duration, outcome: Outcome) {
            self.calls.lock().push(RecordedCall { kind: "destroy", outcome: Some(outcome) });
        }

        fn record_revert(&self, _duration: Duration, outcome: Outcome) {
            self.calls.lock().push(RecordedCall { kind: "revert", outcome: Some(outcome) });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_metrics_accepts_all_calls_without_panicking() {
        let m = NoopMetrics;
        m.record_transition(SandboxState::Requested, SandboxState::Provisioning);
        m.observe_provision_duration(Duration::from_secs(1));
        m.record_start(Duration::from_millis(5), Outcome::Success);
    }

    #[test]
    fn fake_metrics_records_transitions_and_outcomes() {
        use fake::FakeMetrics;
        let m = FakeMetrics::new();
        m.record_transition(SandboxState::Ready, SandboxState::Running);
        m.record_stop(Duration::from_millis(1), Outcome::Failure);
        assert_eq!(m.transitions(), vec![(SandboxState::Ready, SandboxState::Running)]);
        assert_eq!(m.calls().len(), 1);
        assert_eq!(m.calls()[0].outcome, Some(Outcome::Failure));
    }
}
