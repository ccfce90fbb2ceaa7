// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sbx sandbox` — lifecycle control (start/stop/revert/destroy) and listing.

use clap::{Args, Subcommand};

use sbx_wire::{Request, Response, SandboxSummary};

use crate::client::DaemonClient;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, print_table, OutputFormat};

#[derive(Args)]
pub struct SandboxArgs {
    #[command(subcommand)]
    pub command: SandboxCommand,
}

#[derive(Subcommand)]
pub enum SandboxCommand {
    /// List all sandboxes
    List,
    /// Show a sandbox's current state
    Show { vmid: u32 },
    /// Boot a stopped sandbox
    Start { vmid: u32 },
    /// Stop a running sandbox (without destroying it)
    Stop { vmid: u32 },
    /// Revert to the profile's template snapshot and reboot
    Revert {
        vmid: u32,
        /// Revert even if a job is in flight
        #[arg(long)]
        force: bool,
        /// Force the post-revert power state instead of matching the prior one
        #[arg(long)]
        restart: Option<bool>,
    },
    /// Permanently destroy a sandbox
    Destroy { vmid: u32 },
}

pub async fn run(client: &DaemonClient, args: SandboxArgs, format: OutputFormat) -> Result<(), ExitError> {
    match args.command {
        SandboxCommand::List => {
            let sandboxes = client
                .expect(Request::SandboxList, |r| match r {
                    Response::Sandboxes(s) => Ok(s),
                    other => Err(other),
                })
                .await?;
            print_sandboxes(&sandboxes, format);
        }
        SandboxCommand::Show { vmid } => {
            print_sandbox(client, Request::SandboxShow { vmid }, format).await?;
        }
        SandboxCommand::Start { vmid } => {
            print_sandbox(client, Request::SandboxStart { vmid }, format).await?;
        }
        SandboxCommand::Stop { vmid } => {
            print_sandbox(client, Request::SandboxStop { vmid }, format).await?;
        }
        SandboxCommand::Revert { vmid, force, restart } => {
            print_sandbox(client, Request::SandboxRevert { vmid, force, restart }, format).await?;
        }
        SandboxCommand::Destroy { vmid } => {
            client
                .expect(Request::SandboxDestroy { vmid }, |r| match r {
                    Response::Ok => Ok(()),
                    other => Err(other),
                })
                .await?;
            println!("destroyed {vmid}");
        }
    }
    Ok(())
}

async fn print_sandbox(client: &DaemonClient, request: Request, format: OutputFormat) -> Result<(), ExitError> {
    let sandbox = client
        .expect(request, |r| match r {
            Response::Sandbox(s) => Ok(s),
            other => Err(other),
        })
        .await?;
    format_or_json(&sandbox, format, |s| {
        println!("vmid:      {}", s.vmid);
        println!("name:      {}", s.name);
        println!("profile:   {}", s.profile);
        println!("state:     {}", s.state);
        println!("ip:        {}", s.ip.as_deref().unwrap_or("-"));
        println!("workspace: {}", s.workspace_id.as_deref().unwrap_or("-"));
        println!("keepalive: {}", s.keepalive);
        println!("lease:     {}", s.lease_expires_at.as_deref().unwrap_or("-"));
        println!("created:   {}", s.created_at);
        println!("updated:   {}", s.updated_at);
    });
    Ok(())
}

fn print_sandboxes(sandboxes: &[SandboxSummary], format: OutputFormat) {
    format_or_json(sandboxes, format, |sandboxes| {
        let rows = sandboxes
            .iter()
            .map(|s| {
                vec![
                    s.vmid.to_string(),
                    s.name.clone(),
                    s.profile.clone(),
                    s.state.clone(),
                    s.ip.clone().unwrap_or_else(|| "-".into()),
                    s.updated_at.clone(),
                ]
            })
            .collect::<Vec<_>>();
        print_table(&["VMID", "NAME", "PROFILE", "STATE", "IP", "UPDATED"], &rows);
    });
}
