// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The external tailnet tool collaborator (spec section 4.7).
//!
//! Production talks to the `tailscale` binary's `serve`/`status`
//! subcommands; tests use [`FakeTailnetTool`].

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::Duration;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TailnetError {
    /// `serve --tcp=<port> off` found nothing to remove.
    #[error("no serve rule found for this port")]
    ServeRuleNotFound,
    #[error("tailnet tool error: {0}")]
    Other(String),
}

/// The daemon's own tailnet identity, as reported by `status --json`.
#[derive(Debug, Clone, Default)]
pub struct TailnetSelf {
    pub dns_name: Option<String>,
    pub host_name: String,
    pub magic_dns_suffix: String,
}

impl TailnetSelf {
    /// `Self.DNSName` stripped of its trailing dot, falling back to
    /// `Self.HostName + "." + MagicDNSSuffix` when DNSName is absent.
    pub fn resolved_name(&self) -> String {
        match &self.dns_name {
            Some(name) if !name.is_empty() => name.trim_end_matches('.').to_string(),
            _ => format!("{}.{}", self.host_name, self.magic_dns_suffix),
        }
    }
}

#[async_trait]
pub trait TailnetTool: Send + Sync + 'static {
    async fn serve_tcp(&self, port: u16, target: &str) -> Result<(), TailnetError>;
    async fn serve_off(&self, port: u16) -> Result<(), TailnetError>;
    async fn status(&self) -> Result<TailnetSelf, TailnetError>;
}

/// Shells out to the real `tailscale` CLI with a 10s timeout per spec's
/// concurrency budget for tailscale commands.
pub struct TailscaleCliTool {
    binary: String,
}

impl TailscaleCliTool {
    pub fn new() -> Self {
        Self { binary: "tailscale".to_string() }
    }

    async fn run(&self, args: &[&str]) -> Result<String, TailnetError> {
        let output = tokio::time::timeout(Duration::from_secs(10), Command::new(&self.binary).args(args).output())
            .await
            .map_err(|_| TailnetError::Other("tailscale command timed out".into()))?
            .map_err(|e| TailnetError::Other(format!("failed to run tailscale: {e}")))?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_lowercase();
            if ["not found", "no serve", "no matching", "no listener"].iter().any(|needle| stderr.contains(needle)) {
                return Err(TailnetError::ServeRuleNotFound);
            }
            return Err(TailnetError::Other(stderr));
        }
        Ok(stdout)
    }
}

impl Default for TailscaleCliTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TailnetTool for TailscaleCliTool {
    async fn serve_tcp(&self, port: u16, target: &str) -> Result<(), TailnetError> {
        self.run(&["serve", &format!("--tcp={port}"), &format!("tcp://{target}:{port}")]).await.map(|_| ())
    }

    async fn serve_off(&self, port: u16) -> Result<(), TailnetError> {
        self.run(&["serve", &format!("--tcp={port}"), "off"]).await.map(|_| ())
    }

    async fn status(&self) -> Result<TailnetSelf, TailnetError> {
        let raw = self.run(&["status", "--json"]).await?;
        parse_status_json(&raw)
    }
}

/// Minimal field extraction from `tailscale status --json`'s `Self` object —
/// a full typed model belongs to the tailnet integration, out of scope here.
fn parse_status_json(raw: &str) -> Result<TailnetSelf, TailnetError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| TailnetError::Other(format!("bad status json: {e}")))?;
    let self_obj = value.get("Self").ok_or_else(|| TailnetError::Other("missing Self".into()))?;
    Ok(TailnetSelf {
        dns_name: self_obj.get("DNSName").and_then(|v| v.as_str()).map(str::to_string),
        host_name: self_obj.get("HostName").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        magic_dns_suffix: value.get("MagicDNSSuffix").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
    })
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeState {
        served_ports: HashSet<u16>,
        self_info: TailnetSelf,
        fail_serve: bool,
    }

    /// In-memory tailnet stub: tracks which ports are "served" and returns a
    /// caller-configured `Self` identity.
    #[derive(Clone, Default)]
    pub struct FakeTailnetTool {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeTailnetTool {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_self(&self, self_info: TailnetSelf) {
            self.state.lock().self_info = self_info;
        }

        pub fn fail_next_serve(&self) {
            self.state.lock().fail_serve = true;
        }

        pub fn is_served(&self, port: u16) -> bool {
            self.state.lock().served_ports.contains(&port)
        }
    }

    #[async_trait]
    impl TailnetTool for FakeTailnetTool {
        async fn serve_tcp(&self, port: u16, _target: &str) -> Result<(), TailnetError> {
            let mut state = self.state.lock();
            if std::mem::take(&mut state.fail_serve) {
                return Err(TailnetError::Other("injected failure".into()));
            }
            state.served_ports.insert(port);
            Ok(())
        }

        async fn serve_off(&self, port: u16) -> Result<(), TailnetError> {
            let mut state = self.state.lock();
            if !state.served_ports.remove(&port) {
                return Err(TailnetError::ServeRuleNotFound);
            }
            Ok(())
        }

        async fn status(&self) -> Result<TailnetSelf, TailnetError> {
            Ok(self.state.lock().self_info.clone())
        }
    }
}
