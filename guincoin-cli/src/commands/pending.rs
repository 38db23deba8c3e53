//! Pending command - balances awaiting a claim

use anyhow::{anyhow, Result};
use clap::Subcommand;
use comfy_table::Cell;

use guincoin_core::services::LogEvent;
use guincoin_core::PendingStatus;

use super::{get_context, get_logger, log_event, parse_id};
use crate::output::{self, create_table, format_amount, status_cell};

#[derive(Subcommand)]
pub enum PendingCommands {
    /// List pending balances
    List {
        /// Only show one status (pending, claimed, expired)
        #[arg(long)]
        status: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Send (or resend) the claim invitation for one balance
    SendInvitation {
        /// Pending balance id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Expire a balance so it can never be claimed
    Expire {
        /// Pending balance id
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_status(value: &str) -> Result<PendingStatus> {
    PendingStatus::parse(&value.trim().to_lowercase()).ok_or_else(|| {
        anyhow!(
            "Unknown status '{}'; expected pending, claimed or expired",
            value
        )
    })
}

pub fn run(command: PendingCommands) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();

    match command {
        PendingCommands::List { status, json } => {
            let status = status.as_deref().map(parse_status).transpose()?;
            let balances = ctx.pending_service.list(status)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&balances)?);
                return Ok(());
            }

            if balances.is_empty() {
                println!("No pending balances.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["Id", "Job", "Email", "Amount", "Status", "Invited"]);
            for p in &balances {
                table.add_row(vec![
                    Cell::new(p.id),
                    Cell::new(p.job_id),
                    Cell::new(&p.email),
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
        PendingCommands::SendInvitation { id, json } => {
            let pending_id = parse_id(&id, "pending balance")?;
            let event = LogEvent::new("invitation_sent").with_command("pending send-invitation");

            let pending = match ctx.pending_service.send_invitation(pending_id) {
                Ok(p) => {
                    log_event(&logger, event.with_job(p.job_id));
                    p
                }
                Err(e) => {
                    log_event(&logger, event.with_error(e.to_string()));
                    return Err(e);
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&pending)?);
            } else {
                output::success(&format!(
                    "Invitation sent to {} via {}",
                    pending.email,
                    ctx.pending_service.mailer_name()
                ));
            }
        }
        PendingCommands::Expire { id, force, json } => {
            let pending_id = parse_id(&id, "pending balance")?;

            if !force && !json {
                let pending = ctx.pending_service.get(pending_id)?;
                use dialoguer::Confirm;
                if !Confirm::new()
                    .with_prompt(format!(
                        "Expire {} for {}? It can never be claimed afterwards.",
                        format_amount(pending.amount),
                        pending.email
                    ))
                    .default(false)
                    .interact()?
                {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let pending = ctx.pending_service.expire(pending_id)?;
            log_event(
                &logger,
                LogEvent::new("pending_expired")
                    .with_command("pending expire")
                    .with_job(pending.job_id),
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&pending)?);
            } else {
                output::success(&format!("Expired pending balance {}", pending.id));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("Claimed").unwrap(), PendingStatus::Claimed);
        assert_eq!(parse_status(" expired ").unwrap(), PendingStatus::Expired);
        assert!(parse_status("open").is_err());
    }
}
