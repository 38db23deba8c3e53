//! Status command - show import and pending balance summary

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;
use crate::output::format_amount;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Guincoin Import Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec!["Users", &status.total_users.to_string()]);
    table.add_row(vec!["Import jobs", &status.total_jobs.to_string()]);
    table.add_row(vec!["Transactions", &status.total_transactions.to_string()]);
    table.add_row(vec!["Coins posted", &format_amount(status.posted_amount)]);
    table.add_row(vec!["Coins awaiting claim", &format_amount(status.outstanding_amount)]);

    println!("{}", table);
    println!();

    println!("{}", "Pending Balances".bold());
    for (label, bucket) in [
        ("pending", &status.pending.pending),
        ("claimed", &status.pending.claimed),
        ("expired", &status.pending.expired),
    ] {
        println!("  {:<8} {:>5}  {}", label, bucket.count, format_amount(bucket.amount));
    }

    if status.outbox_size > 0 {
        println!();
        println!(
            "{} invitation(s) queued in the outbox (no mail relay configured)",
            status.outbox_size
        );
    }

    Ok(())
}
