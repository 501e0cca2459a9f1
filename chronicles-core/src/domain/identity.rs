//! Identity domain model

use serde::{Deserialize, Serialize};

/// Represents an authenticated user as reported by the identity backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Backend-assigned unique id
    pub uid: String,
    /// The identifier the user signs in with
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Name of the backend that issued this identity
    pub provider: String,
}

impl Identity {
    pub fn new(
        uid: impl Into<String>,
        email: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            display_name: None,
            provider: provider.into(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Display name when set, otherwise the identifier
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.email)
    }

    /// Whether two records describe the same account
    pub fn same_account(&self, other: &Identity) -> bool {
        self.uid == other.uid && self.provider == other.provider
    }
}

/// Profile fields that can be changed after account creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
}

impl ProfileUpdate {
    pub fn display_name(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
        }
    }
}
