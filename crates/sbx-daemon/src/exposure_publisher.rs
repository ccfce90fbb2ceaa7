// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tailnet port publication for sandboxes (spec section 4.7).
//!
//! Talks to the store and an injected [`TailnetTool`]; health is judged
//! by a raw TCP dial, upgraded to an HTTP probe on the handful of ports
//! web services conventionally listen on.

use crate::config::DaemonConfig;
use crate::event_recorder::EventRecorder;
use sbx_adapters::{TailnetError, TailnetTool};
use sbx_core::{Clock, EventKind, Exposure, ExposureState, OrchestratorError, Vmid};
use sbx_storage::Store;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

pub struct ExposurePublisher<C: Clock> {
    store: Store,
    tailnet: Arc<dyn TailnetTool>,
    events: EventRecorder<C>,
    clock: C,
    config: Arc<DaemonConfig>,
}

impl<C: Clock> ExposurePublisher<C> {
    pub fn new(store: Store, tailnet: Arc<dyn TailnetTool>, events: EventRecorder<C>, clock: C, config: Arc<DaemonConfig>) -> Self {
        Self { store, tailnet, events, clock, config }
    }

    fn now(&self) -> u64 {
        self.clock.epoch_ms()
    }

    pub async fn publish(
        &self,
        name: &str,
        vmid: Vmid,
        target_ip: &str,
        port: u16,
        force: bool,
    ) -> Result<Exposure, OrchestratorError> {
        if port == 0 {
            return Err(OrchestratorError::InvalidPort(0));
        }
        if let Some(existing) = self.store.get_exposure(name) {
            if existing.vmid != vmid && !force {
                return Err(OrchestratorError::ExposureNameConflict);
            }
        }

        self.tailnet
            .serve_tcp(port, target_ip)
            .await
            .map_err(|e| OrchestratorError::Backend(e.to_string()))?;

        let dns_name = match self.tailnet.status().await {
            Ok(self_info) => self_info.resolved_name(),
            Err(err) => {
                let _ = self.tailnet.serve_off(port).await;
                return Err(OrchestratorError::Backend(err.to_string()));
            }
        };

        let state = self.probe_health(target_ip, port).await;
        let now = self.now();
        let exposure = Exposure {
            name: name.to_string(),
            vmid,
            port,
            target_ip: target_ip.to_string(),
            url: format!("tcp://{dns_name}:{port}"),
            state,
            created_at_ms: now,
            updated_at_ms: now,
        };
        self.store
            .upsert_exposure(exposure.clone(), force)
            .map_err(|_| OrchestratorError::ExposureNameConflict)?;

        self.events.record(
            EventKind::ExposureCreate,
            format!("published {name} -> {}", exposure.url),
            Some(vmid),
            None,
            serde_json::Value::Null,
        );
        Ok(exposure)
    }

    async fn probe_health(&self, target_ip: &str, port: u16) -> ExposureState {
        let timeout = self.config.exposure_probe_timeout();
        let addr = format!("{target_ip}:{port}");
        let tcp_ok = tokio::time::timeout(timeout, TcpStream::connect(&addr)).await.is_ok_and(|r| r.is_ok());
        if !tcp_ok {
            return ExposureState::Unhealthy;
        }
        if self.config.http_probe_ports.contains(&port) && self.probe_http(&addr, timeout).await {
            ExposureState::Healthy
        } else {
            ExposureState::Serving
        }
    }

    async fn probe_http(&self, addr: &str, timeout: std::time::Duration) -> bool {
        let fut = async {
            let mut stream = TcpStream::connect(addr).await.ok()?;
            stream.write_all(b"GET / HTTP/1.0\r\n\r\n").await.ok()?;
            let mut buf = [0u8; 16];
            let n = stream.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            Some(buf[..n].starts_with(b"HTTP/"))
        };
        tokio::time::timeout(timeout, fut).await.ok().flatten().unwrap_or(false)
    }

    pub async fn unpublish(&self, name: &str, port: u16) -> Result<(), OrchestratorError> {
        match self.tailnet.serve_off(port).await {
            Ok(()) => {}
            Err(TailnetError::ServeRuleNotFound) => return Err(OrchestratorError::ServeRuleNotFound),
            Err(other) => return Err(OrchestratorError::Backend(other.to_string())),
        }
        if let Ok(exposure) = self.store.delete_exposure(name) {
            self.events.record(
                EventKind::ExposureDelete,
                format!("unpublished {name}"),
                Some(exposure.vmid),
                None,
                serde_json::Value::Null,
            );
        }
        Ok(())
    }
}
