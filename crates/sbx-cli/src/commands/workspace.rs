// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sbx workspace` — persistent storage volumes independent of any one sandbox.

use clap::{Args, Subcommand};

use sbx_wire::{Request, Response, WorkspaceSummary};

use crate::client::DaemonClient;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, print_table, OutputFormat};

#[derive(Args)]
pub struct WorkspaceArgs {
    #[command(subcommand)]
    pub command: WorkspaceCommand,
}

#[derive(Subcommand)]
pub enum WorkspaceCommand {
    /// Create a new workspace volume
    Create {
        name: String,
        /// Storage backend (e.g. "zfs", "qcow2")
        #[arg(long)]
        storage: String,
        /// Volume size in GiB
        #[arg(long)]
        size_gb: u32,
    },
    /// Attach a workspace to a sandbox
    Attach {
        /// Workspace name or ID
        workspace: String,
        vmid: u32,
    },
    /// Detach a workspace from whatever sandbox holds it
    Detach {
        /// Workspace name or ID
        workspace: String,
    },
    /// List all workspaces
    List,
}

pub async fn run(client: &DaemonClient, args: WorkspaceArgs, format: OutputFormat) -> Result<(), ExitError> {
    match args.command {
        WorkspaceCommand::Create { name, storage, size_gb } => {
            print_workspace(client, Request::WorkspaceCreate { name, storage, size_gb }, format).await?;
        }
        WorkspaceCommand::Attach { workspace, vmid } => {
            print_workspace(client, Request::WorkspaceAttach { workspace, vmid }, format).await?;
        }
        WorkspaceCommand::Detach { workspace } => {
            print_workspace(client, Request::WorkspaceDetach { workspace }, format).await?;
        }
        WorkspaceCommand::List => {
            let workspaces = client
                .expect(Request::WorkspaceList, |r| match r {
                    Response::Workspaces(w) => Ok(w),
                    other => Err(other),
                })
                .await?;
            print_workspaces(&workspaces, format);
        }
    }
    Ok(())
}

async fn print_workspace(client: &DaemonClient, request: Request, format: OutputFormat) -> Result<(), ExitError> {
    let workspace = client
        .expect(request, |r| match r {
            Response::Workspace(w) => Ok(w),
            other => Err(other),
        })
        .await?;
    format_or_json(&workspace, format, |w| {
        println!("id:       {}", w.id);
        println!("name:     {}", w.name);
        println!("storage:  {}", w.storage);
        println!("size_gb:  {}", w.size_gb);
        println!("attached: {}", w.attached_vmid.map(|v| v.to_string()).unwrap_or_else(|| "-".into()));
    });
    Ok(())
}

fn print_workspaces(workspaces: &[WorkspaceSummary], format: OutputFormat) {
    format_or_json(workspaces, format, |workspaces| {
        let rows = workspaces
            .iter()
            .map(|w| {
                vec![
                    w.id.clone(),
                    w.name.clone(),
                    w.storage.clone(),
                    w.size_gb.to_string(),
                    w.attached_vmid.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                ]
            })
            .collect::<Vec<_>>();
        print_table(&["ID", "NAME", "STORAGE", "SIZE_GB", "ATTACHED"], &rows);
    });
}
