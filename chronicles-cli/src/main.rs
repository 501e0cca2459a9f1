//! Chronicles CLI - sign in, sign up and inspect your session from the terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{config, login, logout, logs, signup, status};

/// Chronicles - your account, in your terminal
#[derive(Parser)]
#[command(name = "chron", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the session phase and signed-in user
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sign in with email and password
    Login {
        /// Account email (prompted when omitted)
        email: Option<String>,
        /// Password (prompted when omitted)
        #[arg(short, long, env = "CHRONICLES_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Where to continue after signing in
        #[arg(long)]
        return_to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create an account (runs the signup wizard unless email and password are given)
    Signup {
        /// Account email
        #[arg(long)]
        email: Option<String>,
        /// Password
        #[arg(short, long, env = "CHRONICLES_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Display name to set on the new account
        #[arg(long)]
        display_name: Option<String>,
        /// Where to continue after signing up
        #[arg(long)]
        return_to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Sign out of the current session
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View or edit the identity backend configuration
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Auth failures were already reported by the command
            if e.downcast_ref::<chronicles_core::AuthError>().is_none() {
                eprintln!("{}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status { json } => status::run(json).await,
        Commands::Login {
            email,
            password,
            return_to,
            json,
        } => login::run(email, password, return_to, json).await,
        Commands::Signup {
            email,
            password,
            display_name,
            return_to,
            json,
        } => {
            signup::run(signup::SignupArgs {
                email,
                password,
                display_name,
                return_to,
                json,
            })
            .await
        }
        Commands::Logout { json } => logout::run(json).await,
        Commands::Config { command } => config::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}
