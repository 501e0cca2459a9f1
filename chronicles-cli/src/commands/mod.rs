//! CLI command implementations

pub mod config;
pub mod login;
pub mod logout;
pub mod logs;
pub mod signup;
pub mod status;

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use chronicles_core::services::EntryPoint;
use chronicles_core::{AuthError, ChroniclesContext, OperationResult};

use crate::output;

/// How long commands wait for the backend's first state callback
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Chronicles directory from `CHRONICLES_DIR` or `~/.chronicles`
pub fn get_chronicles_dir() -> Result<PathBuf> {
    chronicles_core::config::chronicles_dir()
}

/// Build the context and wait (bounded) until the session is authoritative
pub async fn get_context(command: &str) -> Result<ChroniclesContext> {
    let chronicles_dir = get_chronicles_dir()?;
    std::fs::create_dir_all(&chronicles_dir).with_context(|| {
        format!("Failed to create chronicles directory: {:?}", chronicles_dir)
    })?;

    let ctx = ChroniclesContext::new(&chronicles_dir, EntryPoint::Cli)
        .context("Failed to initialize chronicles context")?;
    if let Some(logger) = &ctx.logger {
        // Logging should never break the command
        let _ = logger.log_command(command);
    }

    if ctx.session.is_connected() {
        // A slow backend leaves the session syncing; commands report that as-is
        let _ = tokio::time::timeout(READY_TIMEOUT, ctx.session.wait_until_ready()).await;
    }

    Ok(ctx)
}

/// Spinner shown while a backend call is in flight; hidden for JSON output
pub fn spinner(message: &str, json: bool) -> ProgressBar {
    if json || atty::isnt(atty::Stream::Stderr) {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Print a success payload as an `OperationResult` envelope
pub fn print_json<T: Serialize>(data: T, context: HashMap<String, serde_json::Value>) -> Result<()> {
    let result = if context.is_empty() {
        OperationResult::ok(data)
    } else {
        OperationResult::ok_with_context(data, context)
    };
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Report an auth failure and turn it into the command's error
pub fn auth_failure(error: AuthError, json: bool) -> anyhow::Error {
    if json {
        let mut context = HashMap::new();
        context.insert("kind".to_string(), serde_json::json!(error.kind));
        let result = OperationResult::<()>::fail_with_context(error.user_message(), context);
        if let Ok(rendered) = serde_json::to_string_pretty(&result) {
            println!("{}", rendered);
        }
    } else {
        output::error(error.user_message());
    }
    anyhow::Error::new(error)
}
