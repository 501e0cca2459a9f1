//! Authentication error taxonomy
//!
//! Backends report failures with their own codes (Firebase REST codes such as
//! `EMAIL_EXISTS`, or the web SDK's `auth/...` codes). The session façade
//! normalizes every code into an [`AuthErrorKind`] before it reaches callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Normalized kind of an authentication failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    /// Identifier or secret rejected by the backend
    InvalidCredentials,
    /// Signup with an identifier that already has an account
    IdentifierAlreadyInUse,
    /// Secret rejected by the backend's strength policy
    WeakSecret,
    /// Backend unreachable, throttled or timed out
    NetworkUnavailable,
    /// No backend in this execution context, or the backend rejects our project config
    BackendUnconfigured,
    /// Identity created but the profile update failed; the session is valid
    PartialSuccess,
    /// Empty identifier or secret, rejected before contacting the backend
    InvalidInput,
    Unknown,
}

impl AuthErrorKind {
    /// Map a backend error code onto the taxonomy.
    ///
    /// Firebase appends detail after `" : "` (`WEAK_PASSWORD : Password should
    /// be at least 6 characters`), so only the leading token is matched.
    pub fn from_backend_code(code: &str) -> Self {
        let code = code.split(" : ").next().unwrap_or_default().trim();

        match code {
            "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND"
            | "USER_DISABLED" | "INVALID_EMAIL" | "auth/invalid-credential"
            | "auth/wrong-password" | "auth/user-not-found" | "auth/invalid-email"
            | "auth/user-disabled" => Self::InvalidCredentials,
            "EMAIL_EXISTS" | "auth/email-already-in-use" => Self::IdentifierAlreadyInUse,
            "WEAK_PASSWORD" | "auth/weak-password" => Self::WeakSecret,
            "NETWORK_ERROR" | "TIMEOUT" | "TOO_MANY_ATTEMPTS_TRY_LATER" | "SERVICE_UNAVAILABLE"
            | "auth/network-request-failed" | "auth/too-many-requests" => Self::NetworkUnavailable,
            "CONFIGURATION_NOT_FOUND" | "API_KEY_INVALID" | "INVALID_API_KEY"
            | "PROJECT_NOT_FOUND" | "auth/invalid-api-key" | "auth/configuration-not-found" => {
                Self::BackendUnconfigured
            }
            _ => Self::Unknown,
        }
    }

    /// Stable machine-readable name (also used in the event log)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::IdentifierAlreadyInUse => "identifier_already_in_use",
            Self::WeakSecret => "weak_secret",
            Self::NetworkUnavailable => "network_unavailable",
            Self::BackendUnconfigured => "backend_unconfigured",
            Self::PartialSuccess => "partial_success",
            Self::InvalidInput => "invalid_input",
            Self::Unknown => "unknown",
        }
    }

    /// Human-readable text for presentation layers
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Login failed. Please check your credentials.",
            Self::IdentifierAlreadyInUse => "An account with this email already exists.",
            Self::WeakSecret => "Password is too weak. Use at least 6 characters.",
            Self::NetworkUnavailable => {
                "Could not reach the sign-in service. Check your connection and try again."
            }
            Self::BackendUnconfigured => "Sign-in is not available: authentication is not configured.",
            Self::PartialSuccess => "Your account was created, but your profile could not be updated.",
            Self::InvalidInput => "Email and password are required.",
            Self::Unknown => "Something went wrong. Please try again.",
        }
    }
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication failure surfaced by the session façade
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct AuthError {
    pub kind: AuthErrorKind,
    pub message: String,
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The façade has no backend in this execution context
    pub fn unconfigured() -> Self {
        Self::new(
            AuthErrorKind::BackendUnconfigured,
            "identity backend is not initialized",
        )
    }

    /// Missing identifier or secret
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::InvalidInput, msg)
    }

    /// Normalize a raw backend code and message
    pub fn from_backend(code: &str, message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::from_backend_code(code), message)
    }

    pub fn user_message(&self) -> &'static str {
        self.kind.user_message()
    }
}
