//! Login command - sign in with email and password

use std::collections::HashMap;

use anyhow::Result;
use dialoguer::{Input, Password};

use chronicles_core::AuthError;

use super::{auth_failure, get_context, print_json, spinner};
use crate::output;

/// Where to continue after signing in when the caller gives no target
pub const DEFAULT_RETURN_TO: &str = "/";

/// Prompt for whatever the flags did not supply
pub fn resolve_credentials(
    email: Option<String>,
    password: Option<String>,
) -> Result<(String, String)> {
    let email = match email {
        Some(e) => e,
        None => Input::new().with_prompt("Email").interact_text()?,
    };
    let password = match password {
        Some(p) => p,
        None => Password::new().with_prompt("Password").interact()?,
    };
    Ok((email, password))
}

pub async fn run(
    email: Option<String>,
    password: Option<String>,
    return_to: Option<String>,
    json: bool,
) -> Result<()> {
    let ctx = get_context("login").await?;
    if ctx.session.backend_name().is_none() {
        return Err(auth_failure(AuthError::unconfigured(), json));
    }
    let (email, password) = resolve_credentials(email, password)?;
    let return_to = return_to.unwrap_or_else(|| DEFAULT_RETURN_TO.to_string());

    let pb = spinner("Signing in...", json);
    let result = ctx.session.login(&email, &password).await;
    pb.finish_and_clear();

    let session = result.map_err(|e| auth_failure(e, json))?;

    if json {
        let mut context = HashMap::new();
        context.insert("returnTo".to_string(), serde_json::json!(return_to));
        return print_json(session, context);
    }

    output::success(&format!("Signed in as {}", session.identity.label()));
    output::info(&format!("Continue to {}", return_to));
    Ok(())
}
