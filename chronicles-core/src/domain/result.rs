//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Local failures of the core library (the session file)
///
/// Failures of the authentication operations themselves are reported as
/// [`AuthError`](super::AuthError); settings and the event log use `anyhow`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Session store error: {0}")]
    SessionStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn session_store(msg: impl Into<String>) -> Self {
        Self::SessionStore(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// JSON envelope the CLI prints for `--json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    pub fn ok_with_context(data: T, context: HashMap<String, serde_json::Value>) -> Self {
        Self {
            context: Some(context),
            ..Self::ok(data)
        }
    }

    /// Failure carrying a user-facing message plus machine-readable context
    /// (the CLI puts the auth error kind there)
    pub fn fail_with_context(
        error: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: Some(context),
        }
    }
}
