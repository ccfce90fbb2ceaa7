// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SSH-activity detection for the idle stopper (spec section 4.5).

use async_trait::async_trait;
use tokio::process::Command;

#[async_trait]
pub trait SshActivityProbe: Send + Sync + 'static {
    /// True if there is an established SSH connection (port 22) to `ip`.
    async fn has_active_session(&self, ip: &str) -> bool;
}

/// Default implementation: `conntrack -L -p tcp --dport 22 --dst <ip>`,
/// looking for `ESTABLISHED`.
pub struct ConntrackSshProbe {
    binary: String,
}

impl ConntrackSshProbe {
    pub fn new() -> Self {
        Self { binary: "conntrack".to_string() }
    }
}

impl Default for ConntrackSshProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SshActivityProbe for ConntrackSshProbe {
    async fn has_active_session(&self, ip: &str) -> bool {
        let output = Command::new(&self.binary)
            .args(["-L", "-p", "tcp", "--dport", "22", "--dst", ip])
            .output()
            .await;
        match output {
            Ok(out) => String::from_utf8_lossy(&out.stdout).contains("ESTABLISHED"),
            Err(_) => false,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::SshActivityProbe;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;

    /// Returns true for whichever IPs the test marked active.
    #[derive(Clone, Default)]
    pub struct FakeSshActivityProbe {
        active_ips: Arc<Mutex<HashSet<String>>>,
    }

    impl FakeSshActivityProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn mark_active(&self, ip: impl Into<String>) {
            self.active_ips.lock().insert(ip.into());
        }

        pub fn mark_inactive(&self, ip: &str) {
            self.active_ips.lock().remove(ip);
        }
    }

    #[async_trait]
    impl SshActivityProbe for FakeSshActivityProbe {
        async fn has_active_session(&self, ip: &str) -> bool {
            self.active_ips.lock().contains(ip)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeSshActivityProbe;
    use super::*;

    #[tokio::test]
    async fn fake_probe_reports_marked_ips() {
        let probe = FakeSshActivityProbe::new();
        assert!(!probe.has_active_session("10.0.0.5").await);
        probe.mark_active("10.0.0.5");
        assert!(probe.has_active_session("10.0.0.5").await);
        probe.mark_inactive("10.0.0.5");
        assert!(!probe.has_active_session("10.0.0.5").await);
    }
}
