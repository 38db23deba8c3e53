//! Jobs command - committed import jobs and their invitations

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use comfy_table::Cell;

use guincoin_core::services::LogEvent;

use super::{get_context, get_logger, log_event, parse_id};
use crate::output::{self, create_table, format_amount, status_cell};

#[derive(Subcommand)]
pub enum JobsCommands {
    /// List import jobs, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one job with its pending balances
    Show {
        /// Job id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send claim invitations for every still-pending balance of a job
    SendInvitations {
        /// Job id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: JobsCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        JobsCommands::List { json } => {
            let jobs = ctx.job_service.list_jobs()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&jobs)?);
                return Ok(());
            }

            if jobs.is_empty() {
                println!("No import jobs yet.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["Id", "Name", "Status", "Rows", "Ok", "Errors", "Pending", "Created"]);
            for job in &jobs {
                table.add_row(vec![
                    job.id.to_string(),
                    job.name.clone(),
                    job.status.as_str().to_string(),
                    job.total_rows.to_string(),
                    job.success_count.to_string(),
                    job.error_count.to_string(),
                    job.pending_count.to_string(),
                    job.created_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
            println!("{}", table);
        }
        JobsCommands::Show { id, json } => {
            let detail = ctx.job_service.get_job(parse_id(&id, "job")?)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&detail)?);
                return Ok(());
            }

            let job = &detail.job;
            println!("{}", job.name.bold());
            println!("  Id:         {}", job.id);
            println!("  Status:     {}", job.status.as_str());
            println!("  Created by: {}", job.created_by);
            println!("  Created:    {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));
            if let Some(done) = job.completed_at {
                println!("  Completed:  {}", done.format("%Y-%m-%d %H:%M:%S"));
            }
            println!(
                "  Rows:       {} total, {} ok, {} failed",
                job.total_rows, job.success_count, job.error_count
            );

            if detail.pending_balances.is_empty() {
                return Ok(());
            }

            println!();
            println!("{}", "Pending Balances".bold());
            let mut table = create_table();
            table.set_header(vec!["Id", "Email", "Name", "Amount", "Status", "Invited"]);
            for p in &detail.pending_balances {
                table.add_row(vec![
                    Cell::new(p.id),
                    Cell::new(&p.email),
                    Cell::new(&p.name),
                    Cell::new(format_amount(p.amount)),
                    status_cell(p.status),
                    Cell::new(
                        p.invite_sent_at
                            .map(|t| t.format("%Y-%m-%d").to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    ),
                ]);
            }
            println!("{}", table);
        }
        JobsCommands::SendInvitations { id, json } => {
            let logger = get_logger();
            let job_id = parse_id(&id, "job")?;
            let result = ctx.pending_service.send_job_invitations(job_id)?;

            let mut event = LogEvent::new("invitations_sent")
                .with_command("jobs send-invitations")
                .with_job(job_id);
            if result.failed > 0 {
                event = event.with_error(format!("{} invitation(s) failed", result.failed));
            }
            log_event(&logger, event);

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            output::success(&format!(
                "Sent {} invitation(s) via {}",
                result.sent,
                ctx.pending_service.mailer_name()
            ));
            if result.skipped > 0 {
                println!("  Skipped {} claimed or expired balance(s)", result.skipped);
            }
            if result.failed > 0 {
                output::warning(&format!("{} invitation(s) failed:", result.failed));
                for failure in &result.errors {
                    println!("  {}: {}", failure.pending_balance_id, failure.message);
                }
                println!("Resend with `gc pending send-invitation <id>`.");
            }
        }
    }

    Ok(())
}
