// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sbx status` — daemon uptime and sandbox/job counts.

use sbx_wire::{Request, Response, StatusSummary};

use crate::client::DaemonClient;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, OutputFormat};

pub async fn run(client: &DaemonClient, format: OutputFormat) -> Result<(), ExitError> {
    let status = client
        .expect(Request::Status, |r| match r {
            Response::Status(status) => Ok(status),
            other => Err(other),
        })
        .await?;
    print_status(&status, format);
    Ok(())
}

fn print_status(status: &StatusSummary, format: OutputFormat) {
    format_or_json(status, format, |s| {
        println!("version:     {}", s.version);
        println!("uptime:      {}s", s.uptime_seconds);
        println!("active jobs: {}", s.active_jobs);
        println!("sandboxes:");
        let mut states: Vec<_> = s.sandboxes_by_state.iter().collect();
        states.sort_by_key(|(state, _)| state.to_string());
        for (state, count) in states {
            println!("  {state:<12} {count}");
        }
    });
}
