// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sbx` — operator CLI for the sandbox lab control-plane daemon.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod client;
mod commands;
mod exit_error;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use client::DaemonClient;
use commands::{events, exposure, job, sandbox, status, workspace};
use exit_error::ExitError;
use output::OutputFormat;

const DEFAULT_SOCKET: &str = "/run/sbx/operator.sock";

#[derive(Parser)]
#[command(name = "sbx", about = "Control the sandbox lab daemon", version)]
struct Cli {
    /// Path to the daemon's operator socket (default: $SBX_SOCKET or
    /// /run/sbx/operator.sock)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Daemon uptime and sandbox/job counts
    Status,
    /// Job creation and inspection
    Job(job::JobArgs),
    /// Sandbox lifecycle control
    Sandbox(sandbox::SandboxArgs),
    /// Workspace volume management
    Workspace(workspace::WorkspaceArgs),
    /// Tailnet port publication
    Exposure(exposure::ExposureArgs),
    /// Tail the append-only event log
    Events(events::EventsArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {err}");
        std::process::exit(err.code);
    }
}

async fn run(cli: Cli) -> Result<(), ExitError> {
    let socket = cli.socket.unwrap_or_else(|| {
        std::env::var("SBX_SOCKET").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(DEFAULT_SOCKET))
    });
    let client = DaemonClient::connect(socket)?;
    match cli.command {
        Command::Status => status::run(&client, cli.format).await,
        Command::Job(args) => job::run(&client, args, cli.format).await,
        Command::Sandbox(args) => sandbox::run(&client, args, cli.format).await,
        Command::Workspace(args) => workspace::run(&client, args, cli.format).await,
        Command::Exposure(args) => exposure::run(&client, args, cli.format).await,
        Command::Events(args) => events::run(&client, args, cli.format).await,
    }
}
