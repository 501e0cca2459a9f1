//! Logs command - view and manage the session event log

use std::path::PathBuf;

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;

use super::get_chronicles_dir;
use crate::output;
use chronicles_core::services::{EntryPoint, LoggingService};

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors
        #[arg(long)]
        errors: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear old log entries
    Clear {
        /// Delete logs older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show log statistics and database path
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy the log database to a file (for bug reports)
    Export {
        /// Destination path
        output: PathBuf,
    },
}

/// Larger cutoffs delete nothing anyway
const MAX_RETENTION_DAYS: u64 = 36_500;

fn get_logging_service() -> Result<LoggingService> {
    let chronicles_dir = get_chronicles_dir()?;
    LoggingService::new(&chronicles_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// Short run id prefix; enough to tell processes apart in a table
fn short_run(run_id: &str) -> &str {
    run_id.get(..8).unwrap_or(run_id)
}

pub fn run(command: LogsCommands) -> Result<()> {
    match command {
        LogsCommands::List { limit, errors, json } => {
            let service = get_logging_service()?;
            let entries = if errors {
                service.get_errors(limit)?
            } else {
                service.get_recent(limit)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Time", "Run", "Entry", "Event", "Context", "Error"]);

            for entry in &entries {
                let context = [entry.backend.as_deref(), entry.command.as_deref()]
                    .iter()
                    .filter_map(|&s| s)
                    .collect::<Vec<_>>()
                    .join(", ");

                let error_indicator = match &entry.error_kind {
                    Some(kind) => kind.red().to_string(),
                    None if entry.error_message.is_some() => "!".red().to_string(),
                    None => String::new(),
                };

                table.add_row(vec![
                    format_timestamp(entry.timestamp),
                    short_run(&entry.run_id).to_string(),
                    entry.entry_point.clone(),
                    entry.event.clone(),
                    context,
                    error_indicator,
                ]);
            }

            println!("{}", table);

            if !errors {
                let errors_list = service.get_errors(3)?;
                if !errors_list.is_empty() {
                    println!();
                    println!("{}", "Recent Errors:".red().bold());
                    for err in &errors_list {
                        println!(
                            "  {} [{}]: {}",
                            format_timestamp(err.timestamp).dimmed(),
                            err.event,
                            err.error_message.as_deref().unwrap_or("Unknown error")
                        );
                    }
                }
            }
        }
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            let service = get_logging_service()?;
            let days = older_than_days.min(MAX_RETENTION_DAYS) as i64;
            let cutoff_ms = (Utc::now() - Duration::days(days)).timestamp_millis();

            if !force && !json {
                use dialoguer::Confirm;
                if !Confirm::new()
                    .with_prompt(format!(
                        "Delete logs older than {} days?",
                        older_than_days
                    ))
                    .default(false)
                    .interact()?
                {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let deleted = service.delete_before(cutoff_ms)?;

            if json {
                println!("{}", serde_json::json!({"deleted": deleted}));
            } else {
                output::success(&format!("Deleted {} log entries", deleted));
            }
        }
        LogsCommands::Stats { json } => {
            let service = get_logging_service()?;
            let total = service.count()?;
            let errors = service.get_errors(1000)?.len();
            let db_path = service.db_path().to_path_buf();
            let size_bytes = std::fs::metadata(&db_path)
                .map(|m| m.len())
                .unwrap_or(0);

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "total_entries": total,
                        "error_count": errors,
                        "run_id": service.run_id(),
                        "database_path": db_path.to_string_lossy(),
                        "database_size_bytes": size_bytes
                    })
                );
            } else {
                println!("{}", "Log Statistics".bold());
                println!("  Total entries: {}", total);
                println!("  Errors: {}", errors);
                println!("  Database: {}", db_path.display());
                println!("  Size: {}", output::format_size(size_bytes));
            }
        }
        LogsCommands::Export { output: destination } => {
            let service = get_logging_service()?;
            let written = service.export(&destination)?;
            output::success(&format!("Exported logs to {}", written.display()));
        }
    }

    Ok(())
}
