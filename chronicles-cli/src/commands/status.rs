//! Status command - show the current session

use std::collections::HashMap;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use chronicles_core::{Identity, SessionPhase};

use super::{get_context, print_json};
use crate::output;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    phase: SessionPhase,
    is_ready: bool,
    backend: Option<String>,
    user: Option<Identity>,
}

pub async fn run(json: bool) -> Result<()> {
    let ctx = get_context("status").await?;
    let state = ctx.session.state();

    let report = StatusReport {
        phase: ctx.session.phase(),
        is_ready: state.is_ready,
        backend: ctx.session.backend_name().map(str::to_string),
        user: state.user,
    };

    if json {
        return print_json(report, HashMap::new());
    }

    println!("{}", "Session Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Phase", report.phase.as_str()]);
    table.add_row(vec!["Ready", if report.is_ready { "yes" } else { "no" }]);
    table.add_row(vec![
        "Backend",
        report.backend.as_deref().unwrap_or("not configured"),
    ]);
    if let Some(user) = &report.user {
        table.add_row(vec!["User", user.email.as_str()]);
        table.add_row(vec!["Name", user.display_name.as_deref().unwrap_or("-")]);
        table.add_row(vec!["UID", user.uid.as_str()]);
    }
    println!("{}", table);

    match report.phase {
        SessionPhase::Uninitialized => {
            println!();
            output::warning("Authentication is not configured.");
            println!(
                "Set {} or run {}",
                chronicles_core::config::API_KEY_ENV.bold(),
                "chron config set api-key <KEY>".bold()
            );
        }
        SessionPhase::Syncing => {
            println!();
            output::warning("Still waiting for the sign-in service; the user shown may be stale.");
        }
        SessionPhase::Anonymous => {
            println!();
            output::info("Not signed in. Run `chron login` or `chron signup`.");
        }
        SessionPhase::Authenticated => {}
    }

    Ok(())
}
