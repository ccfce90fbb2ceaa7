// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sbxd — the sandbox lab control-plane daemon.
//!
//! Owns the operator socket (`sbx` CLI traffic) and the guest-facing
//! bootstrap/report listener, and drives the four background loops
//! (lease GC, reconciler, idle stopper, artifact GC) on their
//! configured intervals.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sbx_adapters::{ConntrackSshProbe, ShellBackend, TailscaleCliTool};
use sbx_core::SystemClock;
use sbx_daemon::artifact_gc::ArtifactGc;
use sbx_daemon::bootstrap_service::BootstrapService;
use sbx_daemon::config::DaemonConfig;
use sbx_daemon::event_recorder::EventRecorder;
use sbx_daemon::exposure_publisher::ExposurePublisher;
use sbx_daemon::idle_stopper::IdleStopper;
use sbx_daemon::job_orchestrator::JobOrchestrator;
use sbx_daemon::metrics::NoopMetrics;
use sbx_daemon::operator_service::OperatorService;
use sbx_daemon::redactor::Redactor;
use sbx_daemon::sandbox_manager::SandboxManager;
use sbx_daemon::secrets::{FsSecretsStore, SecretsBundle, SecretsError, SecretsStore};
use sbx_daemon::snippet::{FsSnippetWriter, SnippetMap};
use sbx_daemon::tokens::OsRandomSource;
use sbx_daemon::workspace_manager::WorkspaceManager;
use sbx_profile::ProfileStore;
use sbx_storage::Store;
use sbx_wire::{GuestRequest, GuestResponse, Request, Response};
use tokio::net::{TcpListener, TcpStream, UnixListener, UnixStream};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("sbxd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("sbxd {}", env!("CARGO_PKG_VERSION"));
                println!("Sandbox lab control-plane daemon.");
                println!();
                println!("Configured via SBX_CONFIG (TOML, default: none), SBX_PROFILES_DIR");
                println!("(default: /etc/sbx/profiles), and SBX_SECRETS (default: none).");
                return Ok(());
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("usage: sbxd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    setup_logging();

    let config = Arc::new(load_config()?);
    let profiles = load_profiles()?;

    std::fs::create_dir_all(&config.artifact_root)?;
    if let Some(parent) = config.operator_socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let store = Store::new();
    let clock = SystemClock;
    let redactor = Redactor::new();
    let events = EventRecorder::new(store.clone(), redactor.clone(), clock.clone());

    let backend = Arc::new(ShellBackend::new());
    let tailnet = Arc::new(TailscaleCliTool::new());
    let ssh_probe = Arc::new(ConntrackSshProbe::new());

    let workspaces = WorkspaceManager::new(store.clone(), backend.clone(), events.clone(), clock.clone());
    let sandboxes = Arc::new(SandboxManager::new(
        store.clone(),
        backend.clone(),
        events.clone(),
        clock.clone(),
        NoopMetrics,
        workspaces,
    ));

    let snippet_root = config
        .operator_socket_path
        .parent()
        .map(|p| p.join("snippets"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/sbx/snippets"));
    let snippets = Arc::new(SnippetMap::new());
    let snippet_writer = Arc::new(FsSnippetWriter::new(snippet_root));
    let random = Arc::new(OsRandomSource::new());

    let jobs = JobOrchestrator::new(
        store.clone(),
        backend.clone(),
        profiles.clone(),
        sandboxes.clone(),
        events.clone(),
        clock.clone(),
        config.clone(),
        redactor.clone(),
        snippets,
        snippet_writer,
        random.clone(),
    );

    let secrets: Arc<dyn SecretsStore> = match std::env::var("SBX_SECRETS") {
        Ok(path) => Arc::new(FsSecretsStore::load_from(Path::new(&path))?),
        Err(_) => {
            warn!("SBX_SECRETS not set; bootstrapped guests will receive an empty secrets bundle");
            Arc::new(EmptySecretsStore)
        }
    };
    let bootstrap = Arc::new(BootstrapService::new(
        store.clone(),
        profiles.clone(),
        secrets,
        jobs.clone(),
        events.clone(),
        clock.clone(),
        config.clone(),
        redactor.clone(),
        random,
    ));

    let exposures = Arc::new(ExposurePublisher::new(
        store.clone(),
        tailnet.clone(),
        events.clone(),
        clock.clone(),
        config.clone(),
    ));

    let idle_stopper = Arc::new(IdleStopper::new(
        store.clone(),
        backend.clone(),
        sandboxes.clone(),
        ssh_probe,
        events.clone(),
        profiles.clone(),
        clock.clone(),
        config.clone(),
    ));
    let artifact_gc = Arc::new(ArtifactGc::new(
        store.clone(),
        profiles,
        events.clone(),
        clock.clone(),
        config.artifact_root.clone(),
    ));

    let operator = Arc::new(OperatorService::new(store, sandboxes.clone(), jobs, exposures, clock));

    let shutdown = CancellationToken::new();

    spawn_loop("lease_gc", config.lease_gc_interval(), shutdown.clone(), {
        let sandboxes = sandboxes.clone();
        move || {
            let sandboxes = sandboxes.clone();
            async move { sandboxes.run_lease_gc_once().await }
        }
    });
    spawn_loop("reconciler", config.reconciler_interval(), shutdown.clone(), {
        let sandboxes = sandboxes.clone();
        move || {
            let sandboxes = sandboxes.clone();
            async move { sandboxes.run_reconciler_once().await }
        }
    });
    spawn_loop("idle_stopper", config.idle_stopper_interval(), shutdown.clone(), {
        let idle_stopper = idle_stopper.clone();
        move || {
            let idle_stopper = idle_stopper.clone();
            async move { idle_stopper.run_once().await }
        }
    });
    spawn_loop("artifact_gc", config.artifact_gc_interval(), shutdown.clone(), {
        let artifact_gc = artifact_gc.clone();
        move || {
            let artifact_gc = artifact_gc.clone();
            async move { artifact_gc.run_once() }
        }
    });

    if config.operator_socket_path.exists() {
        std::fs::remove_file(&config.operator_socket_path)?;
    }
    let operator_listener = UnixListener::bind(&config.operator_socket_path)?;
    info!(path = %config.operator_socket_path.display(), "operator socket listening");
    tokio::spawn(run_operator_listener(operator_listener, operator, shutdown.clone()));

    let guest_listener = TcpListener::bind(config.guest_listen_addr.clone()).await?;
    info!(addr = %config.guest_listen_addr, "guest listener listening");
    tokio::spawn(run_guest_listener(guest_listener, bootstrap, shutdown.clone()));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
        _ = shutdown.cancelled() => info!("shutdown requested over operator socket"),
    }

    shutdown.cancel();
    info!("sbxd shutting down; no sandboxes were destroyed");
    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}

fn load_config() -> Result<DaemonConfig, Box<dyn std::error::Error>> {
    match std::env::var("SBX_CONFIG") {
        Ok(path) => Ok(DaemonConfig::load(Path::new(&path))?),
        Err(_) => Ok(DaemonConfig::default()),
    }
}

fn load_profiles() -> Result<ProfileStore, Box<dyn std::error::Error>> {
    let dir = std::env::var("SBX_PROFILES_DIR").unwrap_or_else(|_| "/etc/sbx/profiles".to_string());
    let path = Path::new(&dir);
    if !path.exists() {
        warn!(dir = %dir, "profiles directory does not exist; starting with no profiles");
        return Ok(ProfileStore::from_profiles(vec![]));
    }
    Ok(ProfileStore::load_dir(path)?)
}

/// Spawn a named interval loop bounded by `shutdown`; each tick awaits
/// the prior tick's work before sleeping again, so a slow sweep never
/// overlaps with the next.
fn spawn_loop<F, Fut>(name: &'static str, interval: Duration, shutdown: CancellationToken, mut tick: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tick().await;
                }
                _ = shutdown.cancelled() => {
                    info!(loop_name = name, "draining background loop");
                    return;
                }
            }
        }
    });
}

async fn run_operator_listener(
    listener: UnixListener,
    operator: Arc<OperatorService<SystemClock>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _)) => {
                        let operator = operator.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(handle_operator_connection(stream, operator, shutdown));
                    }
                    Err(err) => error!(%err, "operator socket accept error"),
                }
            }
            _ = shutdown.cancelled() => return,
        }
    }
}

async fn handle_operator_connection(
    mut stream: UnixStream,
    operator: Arc<OperatorService<SystemClock>>,
    shutdown: CancellationToken,
) {
    let request: Request = match sbx_wire::read_message(&mut stream).await {
        Ok(request) => request,
        Err(err) => {
            warn!(%err, "operator connection: failed to read request");
            return;
        }
    };
    let is_shutdown = matches!(request, Request::Shutdown);
    let response = operator.handle(request).await;
    if let Err(err) = sbx_wire::write_message(&mut stream, &response).await {
        warn!(%err, "operator connection: failed to write response");
    }
    if is_shutdown {
        shutdown.cancel();
    }
}

async fn run_guest_listener(
    listener: TcpListener,
    bootstrap: Arc<BootstrapService<SystemClock>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let bootstrap = bootstrap.clone();
                        tokio::spawn(handle_guest_connection(stream, addr.ip(), bootstrap));
                    }
                    Err(err) => error!(%err, "guest listener accept error"),
                }
            }
            _ = shutdown.cancelled() => return,
        }
    }
}

async fn handle_guest_connection(
    mut stream: TcpStream,
    source: std::net::IpAddr,
    bootstrap: Arc<BootstrapService<SystemClock>>,
) {
    let request: GuestRequest = match sbx_wire::read_message(&mut stream).await {
        Ok(request) => request,
        Err(err) => {
            warn!(%err, "guest connection: failed to read request");
            return;
        }
    };
    let response = match request {
        GuestRequest::Bootstrap(req) => match bootstrap.handle_bootstrap(source, req).await {
            Ok(resp) => GuestResponse::Bootstrap(resp),
            Err(err) => GuestResponse::Error(to_guest_error(&err)),
        },
        GuestRequest::Report(req) => match bootstrap.handle_report(source, req).await {
            Ok(resp) => GuestResponse::Report(resp),
            Err(err) => GuestResponse::Error(to_guest_error(&err)),
        },
    };
    if let Err(err) = sbx_wire::write_message(&mut stream, &response).await {
        warn!(%err, "guest connection: failed to write response");
    }
}

/// Used only when no secrets file is configured: every profile gets an
/// empty bundle rather than refusing to boot.
struct EmptySecretsStore;

impl SecretsStore for EmptySecretsStore {
    fn load(&self, _profile: &str) -> Result<SecretsBundle, SecretsError> {
        Ok(SecretsBundle::default())
    }
}

fn to_guest_error(err: &sbx_core::OrchestratorError) -> sbx_wire::ErrorEnvelope {
    if err.is_client_error() {
        sbx_wire::ErrorEnvelope { error: err.to_string(), code: None, message: None, details: Some(err.to_string()) }
    } else {
        sbx_wire::ErrorEnvelope { error: "internal error".to_string(), code: None, message: None, details: None }
    }
}
