//! Session state model

use serde::{Deserialize, Serialize};

use super::{AuthError, Identity};

/// The façade's view of who is currently authenticated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub user: Option<Identity>,
    /// False until the first backend state callback has been applied.
    /// `user` is not authoritative while this is false.
    pub is_ready: bool,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.is_ready && self.user.is_some()
    }
}

/// Lifecycle phase of the session façade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No backend connection attempted (or no backend available)
    Uninitialized,
    /// Connected, waiting for the first state callback
    Syncing,
    Authenticated,
    Anonymous,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Syncing => "syncing",
            Self::Authenticated => "authenticated",
            Self::Anonymous => "anonymous",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to an established session, returned by login and signup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedSession {
    pub identity: Identity,
    pub backend: String,
}

impl AuthenticatedSession {
    pub fn new(identity: Identity, backend: impl Into<String>) -> Self {
        Self {
            identity,
            backend: backend.into(),
        }
    }
}

/// Result of a signup that established a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignupOutcome {
    Complete(AuthenticatedSession),
    /// Identity exists and the session is live, but the profile update
    /// failed. `warning.kind` is `PartialSuccess`.
    PartialSuccess {
        session: AuthenticatedSession,
        warning: AuthError,
    },
}

impl SignupOutcome {
    pub fn session(&self) -> &AuthenticatedSession {
        match self {
            Self::Complete(session) | Self::PartialSuccess { session, .. } => session,
        }
    }

    pub fn warning(&self) -> Option<&AuthError> {
        match self {
            Self::Complete(_) => None,
            Self::PartialSuccess { warning, .. } => Some(warning),
        }
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartialSuccess { .. })
    }
}
