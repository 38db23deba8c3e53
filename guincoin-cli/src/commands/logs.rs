//! Logs command - import activity recorded in logs.duckdb

use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use comfy_table::{Cell, Color};

use guincoin_core::services::{now_ms, EntryPoint, LogEntry, LogFilter, LoggingService};

use super::{get_guincoin_dir, parse_id};
use crate::output::{self, create_table, format_size};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Upper bound on entries shown for a single job
const JOB_HISTORY_LIMIT: usize = 10_000;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent entries, newest first
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Only entries for this import job
        #[arg(long)]
        job: Option<String>,
        /// Only entries with this event name (e.g. import_committed)
        #[arg(long)]
        event: Option<String>,
        /// Show only failures
        #[arg(long)]
        errors: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Everything recorded for one import job, oldest first
    Job {
        /// Job id
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Entry and failure counts per event
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete entries older than a number of days
    Prune {
        #[arg(long, default_value = "30")]
        older_than_days: u32,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
        /// Output as JSON (requires --yes)
        #[arg(long, requires = "yes")]
        json: bool,
    },
}

fn open_logs() -> Result<LoggingService> {
    let dir = get_guincoin_dir()?;
    std::fs::create_dir_all(&dir)?;
    LoggingService::new(&dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// Command or route that produced the entry
fn origin(entry: &LogEntry) -> String {
    entry
        .command
        .as_deref()
        .map(|c| format!("gc {}", c))
        .or_else(|| entry.route.clone())
        .unwrap_or_else(|| entry.entry_point.clone())
}

fn print_entries(entries: &[LogEntry], with_job: bool) {
    let mut table = create_table();
    let mut header = vec!["Time", "Event", "Origin"];
    if with_job {
        header.push("Job");
    }
    header.push("Error");
    table.set_header(header);

    for entry in entries {
        let mut row = vec![
            Cell::new(format_timestamp(entry.timestamp)),
            Cell::new(&entry.event),
            Cell::new(origin(entry)),
        ];
        if with_job {
            row.push(Cell::new(entry.job_id.as_deref().unwrap_or("-")));
        }
        row.push(match &entry.error_message {
            Some(message) => Cell::new(message).fg(Color::Red),
            None => Cell::new(""),
        });
        table.add_row(row);
    }
    println!("{}", table);
}

pub fn run(command: LogsCommands) -> Result<()> {
    let service = open_logs()?;

    match command {
        LogsCommands::List {
            limit,
            job,
            event,
            errors,
            json,
        } => {
            let filter = LogFilter {
                job_id: job
                    .as_deref()
                    .map(|id| parse_id(id, "job"))
                    .transpose()?
                    .map(|id| id.to_string()),
                event,
                errors_only: errors,
            };
            let entries = service.query(&filter, limit)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }
            print_entries(&entries, filter.job_id.is_none());
        }
        LogsCommands::Job { id, json } => {
            let job_id = parse_id(&id, "job")?;
            let filter = LogFilter {
                job_id: Some(job_id.to_string()),
                ..LogFilter::default()
            };
            let mut entries = service.query(&filter, JOB_HISTORY_LIMIT)?;
            entries.reverse();

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            if entries.is_empty() {
                output::warning(&format!("Nothing logged for job {}", job_id));
                return Ok(());
            }
            println!("{} {}", "Activity for job".bold(), job_id);
            print_entries(&entries, false);
        }
        LogsCommands::Stats { json } => {
            let counts = service.event_counts()?;
            let total: u64 = counts.iter().map(|c| c.total).sum();
            let failures: u64 = counts.iter().map(|c| c.errors).sum();
            let size_bytes = std::fs::metadata(service.db_path())
                .map(|m| m.len())
                .unwrap_or(0);

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "totalEntries": total,
                        "errorCount": failures,
                        "events": counts,
                        "databasePath": service.db_path().to_string_lossy(),
                        "databaseSizeBytes": size_bytes,
                    })
                );
                return Ok(());
            }

            if counts.is_empty() {
                println!("No log entries found.");
            } else {
                let mut table = create_table();
                table.set_header(vec!["Event", "Entries", "Failures"]);
                for count in &counts {
                    let failures = if count.errors > 0 {
                        Cell::new(count.errors).fg(Color::Red)
                    } else {
                        Cell::new(0)
                    };
                    table.add_row(vec![Cell::new(&count.event), Cell::new(count.total), failures]);
                }
                println!("{}", table);
            }
            println!(
                "{} entries, {} failures in {} ({})",
                total,
                failures,
                service.db_path().display(),
                format_size(size_bytes)
            );
        }
        LogsCommands::Prune {
            older_than_days,
            yes,
            json,
        } => {
            if !yes
                && !dialoguer::Confirm::new()
                    .with_prompt(format!("Delete log entries older than {} days?", older_than_days))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }

            let deleted = service.delete_before(now_ms() - i64::from(older_than_days) * DAY_MS)?;
            if json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                output::success(&format!("Deleted {} log entries", deleted));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct LogsCli {
        #[command(subcommand)]
        command: LogsCommands,
    }

    fn entry(command: Option<&str>, route: Option<&str>) -> LogEntry {
        LogEntry {
            id: 1,
            timestamp: 0,
            entry_point: "server".to_string(),
            app_version: "0.1.0".to_string(),
            platform: "linux".to_string(),
            event: "import_committed".to_string(),
            command: command.map(str::to_string),
            route: route.map(str::to_string),
            job_id: None,
            error_message: None,
            error_details: None,
        }
    }

    #[test]
    fn test_origin_prefers_command_then_route() {
        assert_eq!(origin(&entry(Some("import"), Some("bulk-import/jobs"))), "gc import");
        assert_eq!(origin(&entry(None, Some("bulk-import/jobs"))), "bulk-import/jobs");
        assert_eq!(origin(&entry(None, None)), "server");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_list_filters_parse() {
        let parsed = LogsCli::try_parse_from([
            "logs", "list", "--job", "6f1c", "--event", "invitations_sent", "--errors",
        ])
        .unwrap();
        match parsed.command {
            LogsCommands::List { job, event, errors, .. } => {
                assert_eq!(job.as_deref(), Some("6f1c"));
                assert_eq!(event.as_deref(), Some("invitations_sent"));
                assert!(errors);
            }
            _ => panic!("expected list"),
        }
        assert!(LogsCli::try_parse_from(["logs", "prune", "--json"]).is_err());
    }
}
