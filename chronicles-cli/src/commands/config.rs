//! Config command - inspect and edit the Firebase settings

use anyhow::Result;
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::json;

use chronicles_core::config::{Config, FirebaseConfig};

use super::get_chronicles_dir;
use crate::output;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the resolved configuration (environment overrides applied)
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a Firebase setting to settings.json (empty value clears it)
    Set {
        key: ConfigKey,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigKey {
    ApiKey,
    AuthDomain,
    ProjectId,
    AppId,
    EmulatorHost,
}

impl ConfigKey {
    fn field(self, firebase: &mut FirebaseConfig) -> &mut Option<String> {
        match self {
            ConfigKey::ApiKey => &mut firebase.api_key,
            ConfigKey::AuthDomain => &mut firebase.auth_domain,
            ConfigKey::ProjectId => &mut firebase.project_id,
            ConfigKey::AppId => &mut firebase.app_id,
            ConfigKey::EmulatorHost => &mut firebase.emulator_host,
        }
    }

    fn label(self) -> &'static str {
        match self {
            ConfigKey::ApiKey => "api-key",
            ConfigKey::AuthDomain => "auth-domain",
            ConfigKey::ProjectId => "project-id",
            ConfigKey::AppId => "app-id",
            ConfigKey::EmulatorHost => "emulator-host",
        }
    }
}

pub fn run(command: ConfigCommands) -> Result<()> {
    let chronicles_dir = get_chronicles_dir()?;

    match command {
        ConfigCommands::Show { json } => {
            let config = Config::load(&chronicles_dir)?;
            let firebase = &config.firebase;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "configured": firebase.is_configured(),
                        "apiKey": firebase.masked_api_key(),
                        "authDomain": firebase.auth_domain,
                        "projectId": firebase.project_id,
                        "appId": firebase.app_id,
                        "emulatorHost": firebase.emulator_host,
                        "settingsPath": chronicles_dir.join("settings.json").to_string_lossy(),
                    }))?
                );
                return Ok(());
            }

            println!("{}", "Firebase Configuration".bold());
            let masked = firebase.masked_api_key();
            let rows = [
                ("API key", masked.as_deref()),
                ("Auth domain", firebase.auth_domain.as_deref()),
                ("Project", firebase.project_id.as_deref()),
                ("App", firebase.app_id.as_deref()),
                ("Emulator", firebase.emulator_host.as_deref()),
            ];
            let mut table = output::create_table();
            for (name, value) in rows {
                table.add_row(vec![name, value.unwrap_or("-")]);
            }
            println!("{}", table);

            if !firebase.is_configured() {
                output::warning("No API key set; sign-in is unavailable.");
            }
        }
        ConfigCommands::Set { key, value } => {
            std::fs::create_dir_all(&chronicles_dir)?;
            let mut config = Config::load_with(&chronicles_dir, |_| None)?;

            let value = value.trim();
            *key.field(&mut config.firebase) = (!value.is_empty()).then(|| value.to_string());
            config.save(&chronicles_dir)?;

            if value.is_empty() {
                output::success(&format!("Cleared {}", key.label()));
            } else {
                output::success(&format!("Set {}", key.label()));
            }
        }
    }

    Ok(())
}
