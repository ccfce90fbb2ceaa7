// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sbx job` — job creation and inspection.

use clap::{Args, Subcommand};

use sbx_wire::{JobSummary, Request, Response};

use crate::client::DaemonClient;
use crate::exit_error::ExitError;
use crate::output::{format_or_json, print_table, OutputFormat};

#[derive(Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// Queue a job on a fresh or existing sandbox
    Create {
        /// Git repository URL the agent checks out
        repo_url: String,
        /// Profile name (template + resource/network/behavior defaults)
        #[arg(long)]
        profile: String,
        /// Task description handed to the agent
        #[arg(long)]
        task: String,
        /// Git ref to check out (default: repo's default branch)
        #[arg(long)]
        git_ref: Option<String>,
        /// "normal" (default) or "dangerous"
        #[arg(long)]
        mode: Option<String>,
        /// Sandbox lease length in minutes
        #[arg(long)]
        ttl_minutes: Option<u32>,
        /// Keep the sandbox running after the job finishes
        #[arg(long)]
        keepalive: bool,
        /// Attach an existing workspace by name or ID
        #[arg(long)]
        workspace: Option<String>,
        /// Resume an existing agent session ID
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Show a job's current status
    Show {
        /// Job ID
        id: String,
    },
    /// List known jobs
    List,
}

pub async fn run(client: &DaemonClient, args: JobArgs, format: OutputFormat) -> Result<(), ExitError> {
    match args.command {
        JobCommand::Create {
            repo_url,
            profile,
            task,
            git_ref,
            mode,
            ttl_minutes,
            keepalive,
            workspace,
            session_id,
        } => {
            let request = Request::JobCreate {
                repo_url,
                profile,
                task,
                git_ref,
                mode,
                ttl_minutes,
                keepalive: if keepalive { Some(true) } else { None },
                workspace,
                session_id,
            };
            let job = client
                .expect(request, |r| match r {
                    Response::Job(job) => Ok(job),
                    other => Err(other),
                })
                .await?;
            print_job(&job, format);
        }
        JobCommand::Show { id } => {
            let job = client
                .expect(Request::JobShow { id }, |r| match r {
                    Response::Job(job) => Ok(job),
                    other => Err(other),
                })
                .await?;
            print_job(&job, format);
        }
        JobCommand::List => {
            let jobs = client
                .expect(Request::JobList, |r| match r {
                    Response::Jobs(jobs) => Ok(jobs),
                    other => Err(other),
                })
                .await?;
            print_jobs(&jobs, format);
        }
    }
    Ok(())
}

fn print_job(job: &JobSummary, format: OutputFormat) {
    format_or_json(job, format, |job| {
        println!("id:       {}", job.id);
        println!("repo_url: {}", job.repo_url);
        println!("profile:  {}", job.profile);
        println!("status:   {}", job.status);
        if let Some(vmid) = job.sandbox_vmid {
            println!("sandbox:  {vmid}");
        }
        if let Some(result) = &job.result {
            println!("result:   {result}");
        }
        println!("created:  {}", job.created_at);
        println!("updated:  {}", job.updated_at);
    });
}

fn print_jobs(jobs: &[JobSummary], format: OutputFormat) {
    format_or_json(jobs, format, |jobs| {
        let rows = jobs
            .iter()
            .map(|j| {
                vec![
                    j.id.clone(),
                    j.profile.clone(),
                    j.status.clone(),
                    j.sandbox_vmid.map(|v| v.to_string()).unwrap_or_else(|| "-".into()),
                    j.updated_at.clone(),
                ]
            })
            .collect::<Vec<_>>();
        print_table(&["ID", "PROFILE", "STATUS", "SANDBOX", "UPDATED"], &rows);
    });
}
