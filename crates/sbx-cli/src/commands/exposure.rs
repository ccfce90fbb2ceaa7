// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sbx exposure` — tailnet port publication for sandboxes.

use clap::{Args, Subcommand};

use sbx_wire::{ExposureSummary, Request, Response};

use crate::client::DaemonClient;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, print_table, OutputFormat};

#[derive(Args)]
pub struct ExposureArgs {
    #[command(subcommand)]
    pub command: ExposureCommand,
}

#[derive(Subcommand)]
pub enum ExposureCommand {
    /// Publish a sandbox port on the tailnet
    Publish { name: String, vmid: u32, port: u16 },
    /// Unpublish a port
    Unpublish { name: String, port: u16 },
    /// List published exposures
    List,
}

pub async fn run(client: &DaemonClient, args: ExposureArgs, format: OutputFormat) -> Result<(), ExitError> {
    match args.command {
        ExposureCommand::Publish { name, vmid, port } => {
            let exposure = client
                .expect(Request::ExposurePublish { name, vmid, port }, |r| match r {
                    Response::Exposure(e) => Ok(e),
                    other => Err(other),
                })
                .await?;
            print_exposure(&exposure, format);
        }
        ExposureCommand::Unpublish { name, port } => {
            client
                .expect(Request::ExposureUnpublish { name: name.clone(), port }, |r| match r {
                    Response::Ok => Ok(()),
                    other => Err(other),
                })
                .await?;
            println!("unpublished {name}:{port}");
        }
        ExposureCommand::List => {
            let exposures = client
                .expect(Request::ExposureList, |r| match r {
                    Response::Exposures(e) => Ok(e),
                    other => Err(other),
                })
                .await?;
            print_exposures(&exposures, format);
        }
    }
    Ok(())
}

fn print_exposure(exposure: &ExposureSummary, format: OutputFormat) {
    format_or_json(exposure, format, |e| {
        println!("name:  {}", e.name);
        println!("vmid:  {}", e.vmid);
        println!("port:  {}", e.port);
        println!("url:   {}", e.url);
        println!("state: {}", e.state);
    });
}

fn print_exposures(exposures: &[ExposureSummary], format: OutputFormat) {
    format_or_json(exposures, format, |exposures| {
        let rows = exposures
            .iter()
            .map(|e| vec![e.name.clone(), e.vmid.to_string(), e.port.to_string(), e.url.clone(), e.state.clone()])
            .collect::<Vec<_>>();
        print_table(&["NAME", "VMID", "PORT", "URL", "STATE"], &rows);
    });
}
