// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-socket client for CLI commands.

use std::path::PathBuf;
use std::time::Duration;

use sbx_wire::{ErrorEnvelope, ProtocolError, Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

fn timeout_ipc() -> Duration {
    std::env::var("SBX_TIMEOUT_IPC_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(10))
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running (no socket at {0})")]
    DaemonNotRunning(PathBuf),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("request timed out")]
    Timeout,
    #[error("daemon rejected the request: {}", .0.error)]
    Rejected(ErrorEnvelope),
    #[error("unexpected response from daemon")]
    UnexpectedResponse,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn connect(socket_path: PathBuf) -> Result<Self, ClientError> {
        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning(socket_path));
        }
        Ok(Self { socket_path })
    }

    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;
        let budget = timeout_ipc();
        tokio::time::timeout(budget, sbx_wire::write_message(&mut stream, request))
            .await
            .map_err(|_| ClientError::Timeout)??;
        let response: Response = tokio::time::timeout(budget, sbx_wire::read_message(&mut stream))
            .await
            .map_err(|_| ClientError::Timeout)??;
        Ok(response)
    }

    /// Send a request and unwrap one expected `Response` variant, converting
    /// `Response::Error` into a `ClientError::Rejected`.
    pub async fn expect<T>(
        &self,
        request: Request,
        extract: impl FnOnce(Response) -> Result<T, Response>,
    ) -> Result<T, ClientError> {
        match extract(self.send(&request).await?) {
            Ok(value) => Ok(value),
            Err(Response::Error(envelope)) => Err(ClientError::Rejected(envelope)),
            Err(_) => Err(ClientError::UnexpectedResponse),
        }
    }
}
