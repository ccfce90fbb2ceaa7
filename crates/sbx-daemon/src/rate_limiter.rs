// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-source-IP token bucket for the bootstrap/report endpoints (spec
//! section 4.9).

use parking_lot::Mutex;
use sbx_core::Clock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

const SWEEP_AFTER_MS: u64 = 10 * 60 * 1000;

struct Bucket {
    tokens: f64,
    last_seen_ms: u64,
}

struct State {
    buckets: HashMap<IpAddr, Bucket>,
    last_sweep_ms: u64,
}

/// Safe for concurrent callers; an unspecified or loopback source is denied.
pub struct IpRateLimiter<C: Clock> {
    qps: f64,
    burst: f64,
    clock: C,
    state: Mutex<State>,
}

impl<C: Clock> IpRateLimiter<C> {
    pub fn new(qps: f64, burst: f64, clock: C) -> Self {
        Self {
            qps,
            burst,
            clock,
            state: Mutex::new(State { buckets: HashMap::new(), last_sweep_ms: 0 }),
        }
    }

    /// Consume one token for `source`. Denies loopback and unspecified
    /// addresses outright — those never identify a real guest.
    pub fn allow(&self, source: IpAddr) -> bool {
        if source.is_loopback() || source.is_unspecified() {
            return false;
        }
        let now = self.clock.epoch_ms();
        let mut state = self.state.lock();
        self.sweep_if_due(&mut state, now);

        let bucket = state.buckets.entry(source).or_insert_with(|| Bucket { tokens: self.burst, last_seen_ms: now });
        let elapsed_secs = now.saturating_sub(bucket.last_seen_ms) as f64 / 1000.0;
        bucket.tokens = (bucket.tokens + elapsed_secs * self.qps).min(self.burst);
        bucket.last_seen_ms = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn sweep_if_due(&self, state: &mut State, now: u64) {
        if now.saturating_sub(state.last_sweep_ms) < SWEEP_AFTER_MS {
            return;
        }
        state.buckets.retain(|_, b| now.saturating_sub(b.last_seen_ms) < SWEEP_AFTER_MS);
        state.last_sweep_ms = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbx_core::FakeClock;
    use std::net::Ipv4Addr;

    fn addr(n: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 77, 0, n))
    }

    #[test]
    fn loopback_and_unspecified_are_always_denied() {
        let limiter = IpRateLimiter::new(10.0, 10.0, FakeClock::new());
        assert!(!limiter.allow(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert!(!limiter.allow(IpAddr::V4(Ipv4Addr::UNSPECIFIED)));
    }

    #[test]
    fn burst_allows_up_to_burst_requests_then_denies() {
        let limiter = IpRateLimiter::new(1.0, 3.0, FakeClock::new());
        let ip = addr(1);
        assert!(limiter.allow(ip));
        assert!(limiter.allow(ip));
        assert!(limiter.allow(ip));
        assert!(!limiter.allow(ip));
    }

    #[test]
    fn tokens_refill_over_time() {
        let clock = FakeClock::new();
        let limiter = IpRateLimiter::new(1.0, 1.0, clock.clone());
        let ip = addr(2);
        assert!(limiter.allow(ip));
        assert!(!limiter.allow(ip));
        clock.advance(std::time::Duration::from_secs(1));
        assert!(limiter.allow(ip));
    }

    #[test]
    fn separate_ips_have_independent_buckets() {
        let limiter = IpRateLimiter::new(1.0, 1.0, FakeClock::new());
        assert!(limiter.allow(addr(1)));
        assert!(limiter.allow(addr(2)));
        assert!(!limiter.allow(addr(1)));
    }

    #[test]
    fn stale_entries_are_swept_after_ten_minutes() {
        let clock = FakeClock::new();
        let limiter = IpRateLimiter::new(1.0, 1.0, clock.clone());
        let ip = addr(3);
        limiter.allow(ip);
        clock.advance(std::time::Duration::from_secs(11 * 60));
        // Triggers the sweep path; a brand-new bucket is created for `ip`
        // with a full burst, so this still succeeds rather than erroring.
        assert!(limiter.allow(ip));
        assert_eq!(limiter.state.lock().buckets.len(), 1);
    }
}
