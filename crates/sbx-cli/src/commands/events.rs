// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sbx events tail` — read the append-only event log.

use clap::Args;

use sbx_wire::{EventSummary, Request, Response};

use crate::client::DaemonClient;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, OutputFormat};

#[derive(Args)]
pub struct EventsArgs {
    /// Only events after this ID
    #[arg(long, default_value_t = 0)]
    pub since_id: u64,
    /// Maximum number of events to return
    #[arg(long, short = 'n', default_value_t = 50)]
    pub limit: usize,
}

pub async fn run(client: &DaemonClient, args: EventsArgs, format: OutputFormat) -> Result<(), ExitError> {
    let events = client
        .expect(Request::EventsTail { since_id: args.since_id, limit: args.limit }, |r| match r {
            Response::Events(events) => Ok(events),
            other => Err(other),
        })
        .await?;
    print_events(&events, format);
    Ok(())
}

fn print_events(events: &[EventSummary], format: OutputFormat) {
    format_or_json(events, format, |events| {
        for e in events {
            let target = match (e.vmid, &e.job_id) {
                (Some(vmid), Some(job_id)) => format!("vmid={vmid} job={job_id}"),
                (Some(vmid), None) => format!("vmid={vmid}"),
                (None, Some(job_id)) => format!("job={job_id}"),
                (None, None) => String::new(),
            };
            println!("[{}] #{} {} {} {}", e.ts, e.id, e.kind, target, e.message);
        }
    });
}
