//! Signup command - create an account, directly from flags or via the wizard

use std::collections::HashMap;

use anyhow::Result;
use colored::Colorize;
use dialoguer::{Input, MultiSelect, Password};

use chronicles_core::domain::signup_form::{SignupSubmission, INTERESTS, STEP_COUNT};
use chronicles_core::{AuthError, SignupForm, SignupOutcome};

use super::login::DEFAULT_RETURN_TO;
use super::{auth_failure, get_context, print_json, spinner};
use crate::output;

pub struct SignupArgs {
    pub email: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub return_to: Option<String>,
    pub json: bool,
}

/// Steps 1 and 2 re-prompt until the form accepts the input
fn run_wizard() -> Result<SignupSubmission> {
    let mut form = SignupForm::new();

    println!("{}", "Create your account".bold());
    println!();

    loop {
        println!("{}", output::step_header(form.step(), STEP_COUNT, "Personal info"));
        form.first_name = Input::new()
            .with_prompt("First name")
            .with_initial_text(form.first_name.clone())
            .interact_text()?;
        form.last_name = Input::new()
            .with_prompt("Last name")
            .with_initial_text(form.last_name.clone())
            .interact_text()?;
        form.email = Input::new()
            .with_prompt("Email")
            .with_initial_text(form.email.clone())
            .interact_text()?;
        match form.advance() {
            Ok(_) => break,
            Err(e) => output::error(&capitalize(&e.to_string())),
        }
    }

    loop {
        println!("{}", output::step_header(form.step(), STEP_COUNT, "Security"));
        form.password = Password::new().with_prompt("Password").interact()?;
        form.confirm_password = Password::new().with_prompt("Confirm password").interact()?;
        match form.advance() {
            Ok(_) => break,
            Err(e) => output::error(&capitalize(&e.to_string())),
        }
    }

    println!("{}", output::step_header(form.step(), STEP_COUNT, "Profile (optional)"));
    form.phone = Input::new()
        .with_prompt("Phone")
        .allow_empty(true)
        .interact_text()?;
    form.company = Input::new()
        .with_prompt("Company")
        .allow_empty(true)
        .interact_text()?;

    let picked = MultiSelect::new()
        .with_prompt("Interests (space to select, enter to confirm)")
        .items(INTERESTS)
        .interact()?;
    for index in picked {
        form.toggle_interest(INTERESTS[index])?;
    }

    Ok(form.submission()?)
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub async fn run(args: SignupArgs) -> Result<()> {
    let ctx = get_context("signup").await?;
    if ctx.session.backend_name().is_none() {
        return Err(auth_failure(AuthError::unconfigured(), args.json));
    }

    let submission = match (args.email, args.password) {
        (Some(email), Some(password)) => SignupSubmission {
            email,
            password,
            display_name: args.display_name,
        },
        _ if args.json => anyhow::bail!("--json requires --email and --password"),
        _ => run_wizard()?,
    };
    let return_to = args
        .return_to
        .unwrap_or_else(|| DEFAULT_RETURN_TO.to_string());

    let pb = spinner("Creating account...", args.json);
    let result = ctx
        .session
        .signup(
            &submission.email,
            &submission.password,
            submission.display_name.as_deref(),
        )
        .await;
    pb.finish_and_clear();

    let outcome = result.map_err(|e| auth_failure(e, args.json))?;

    if args.json {
        let mut context = HashMap::new();
        context.insert("returnTo".to_string(), serde_json::json!(return_to));
        return print_json(outcome, context);
    }

    match &outcome {
        SignupOutcome::Complete(session) => {
            output::success(&format!("Welcome, {}!", session.identity.label()));
        }
        SignupOutcome::PartialSuccess { session, warning } => {
            output::success(&format!("Account created for {}", session.identity.email));
            output::warning(warning.user_message());
        }
    }
    output::info(&format!("Continue to {}", return_to));
    Ok(())
}
