//! Logout command - end the current session

use std::collections::HashMap;

use anyhow::Result;

use super::{auth_failure, get_context, print_json, spinner};
use crate::output;

pub async fn run(json: bool) -> Result<()> {
    let ctx = get_context("logout").await?;
    let previous = ctx.session.current_user();

    let pb = spinner("Signing out...", json);
    let result = ctx.session.logout().await;
    pb.finish_and_clear();

    result.map_err(|e| auth_failure(e, json))?;

    if json {
        return print_json(serde_json::json!({ "signedOut": previous.is_some() }), HashMap::new());
    }

    match previous {
        Some(user) => output::success(&format!("Signed out {}", user.label())),
        None => output::info("No one was signed in."),
    }
    Ok(())
}
