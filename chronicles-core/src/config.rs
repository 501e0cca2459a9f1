//! Configuration management
//!
//! Settings live in `settings.json` inside the chronicles directory:
//! ```json
//! {
//!   "firebase": { "apiKey": "...", "authDomain": "...", "projectId": "...", "appId": "..." },
//!   ...
//! }
//! ```
//! Keys this crate does not manage are preserved when saving.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const API_KEY_ENV: &str = "CHRONICLES_FIREBASE_API_KEY";
pub const AUTH_DOMAIN_ENV: &str = "CHRONICLES_FIREBASE_AUTH_DOMAIN";
pub const PROJECT_ID_ENV: &str = "CHRONICLES_FIREBASE_PROJECT_ID";
pub const APP_ID_ENV: &str = "CHRONICLES_FIREBASE_APP_ID";
pub const EMULATOR_HOST_ENV: &str = "CHRONICLES_AUTH_EMULATOR_HOST";
pub const DIR_ENV: &str = "CHRONICLES_DIR";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    firebase: FirebaseConfig,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Firebase project settings (the web SDK's `firebaseConfig` subset used for auth)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// `host:port` of a local Auth emulator, e.g. `localhost:9099`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emulator_host: Option<String>,
}

impl FirebaseConfig {
    /// An API key is the minimum needed to reach Identity Toolkit
    pub fn is_configured(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// API key with all but the last four characters hidden
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_deref().map(|key| {
            let chars: Vec<char> = key.chars().collect();
            if chars.len() <= 4 {
                "*".repeat(chars.len())
            } else {
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("{}{}", "*".repeat(chars.len() - 4), tail)
            }
        })
    }
}

/// Chronicles configuration (simplified view of settings)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub firebase: FirebaseConfig,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Config {
    /// Load config from the chronicles directory
    ///
    /// Each Firebase field can be overridden with its `CHRONICLES_*`
    /// environment variable (useful for CI and the local emulator).
    pub fn load(chronicles_dir: &Path) -> Result<Self> {
        Self::load_with(chronicles_dir, |name| std::env::var(name).ok())
    }

    /// Load config using `lookup` in place of the process environment
    pub fn load_with(
        chronicles_dir: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let settings_path = chronicles_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let mut firebase = raw.firebase.clone();
        let overrides = [
            (API_KEY_ENV, &mut firebase.api_key),
            (AUTH_DOMAIN_ENV, &mut firebase.auth_domain),
            (PROJECT_ID_ENV, &mut firebase.project_id),
            (APP_ID_ENV, &mut firebase.app_id),
            (EMULATOR_HOST_ENV, &mut firebase.emulator_host),
        ];
        for (name, field) in overrides {
            if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                *field = Some(value.trim().to_string());
            }
        }

        Ok(Self {
            firebase,
            _raw_settings: raw,
        })
    }

    /// Save config to the chronicles directory
    /// Preserves other settings that this crate doesn't manage
    pub fn save(&self, chronicles_dir: &Path) -> Result<()> {
        let settings_path = chronicles_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        settings.firebase = self.firebase.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::create_dir_all(chronicles_dir)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}

/// Chronicles data directory: `CHRONICLES_DIR`, else `~/.chronicles`
pub fn chronicles_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".chronicles"))
        .context("Could not find home directory")
}
