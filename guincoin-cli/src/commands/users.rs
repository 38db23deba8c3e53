//! Users command - register and list directory entries

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_context;
use crate::output::{self, create_table, format_amount};

#[derive(Subcommand)]
pub enum UsersCommands {
    /// Register a user; any open pending balances for the email are claimed
    Add {
        /// Email address
        email: String,
        /// Display name
        #[arg(long)]
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered users with their balances
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: UsersCommands) -> Result<()> {
    let ctx = get_context()?;

    match command {
        UsersCommands::Add { email, name, json } => {
            let registration = ctx.user_service.register_user(&email, &name)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&registration)?);
                return Ok(());
            }

            output::success(&format!("Registered {}", registration.user.email));
            if !registration.claimed.is_empty() {
                println!(
                    "  Claimed {} pending balance(s) worth {}",
                    registration.claimed.len(),
                    format_amount(registration.claimed_amount)
                );
            }
        }
        UsersCommands::List { json } => {
            let users = ctx.user_service.list_users()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
                return Ok(());
            }

            if users.is_empty() {
                println!("No users registered.");
                return Ok(());
            }

            let mut table = create_table();
            table.set_header(vec!["Email", "Name", "Balance", "Registered"]);
            for user in &users {
                let balance = ctx.user_service.get_balance(user.id)?;
                table.add_row(vec![
                    user.email.clone(),
                    user.name.clone(),
                    format_amount(balance),
                    user.created_at.format("%Y-%m-%d").to_string(),
                ]);
            }
            println!("{}", table);
            println!("{}", format!("{} user(s)", users.len()).dimmed());
        }
    }

    Ok(())
}
