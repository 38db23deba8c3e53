//! Guincoin CLI - bulk balance imports from the terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use guincoin_core::services::LogEvent;

mod commands;
mod output;

use commands::{get_logger, import, jobs, log_event, logs, pending, status, users};

/// Guincoin - reconcile and commit bulk balance imports
#[derive(Parser)]
#[command(name = "gc", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show users, jobs and pending balance totals
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the user directory
    Users {
        #[command(subcommand)]
        command: users::UsersCommands,
    },

    /// Run the bulk import wizard
    Import {
        #[command(subcommand)]
        command: import::ImportCommands,
    },

    /// Inspect committed import jobs
    Jobs {
        #[command(subcommand)]
        command: jobs::JobsCommands,
    },

    /// Manage pending balances
    Pending {
        #[command(subcommand)]
        command: pending::PendingCommands,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Users { .. } => "users",
            Self::Import { .. } => "import",
            Self::Jobs { .. } => "jobs",
            Self::Pending { .. } => "pending",
            Self::Logs { .. } => "logs",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logger = get_logger();
    let name = cli.command.name();

    log_event(&logger, LogEvent::new("command_executed").with_command(name));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("command_failed")
                    .with_command(name)
                    .with_error(e.to_string()),
            );
            output::error(&format!("Error: {:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(json),
        Commands::Users { command } => users::run(command),
        Commands::Import { command } => import::run(command),
        Commands::Jobs { command } => jobs::run(command),
        Commands::Pending { command } => pending::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
