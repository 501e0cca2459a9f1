//! Identity backend port - credential verification and account lifecycle

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AuthError, Identity, ProfileUpdate};

/// Callback invoked with the backend's current user whenever it changes
pub type StateListener = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

/// Error reported by a backend, in the backend's own vocabulary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BackendError {
    /// Backend-specific code, e.g. `EMAIL_EXISTS` or `NETWORK_ERROR`
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Transport-level failure
    pub fn network(message: impl Into<String>) -> Self {
        Self::new("NETWORK_ERROR", message)
    }
}

impl From<BackendError> for AuthError {
    fn from(e: BackendError) -> Self {
        AuthError::from_backend(&e.code, e.message)
    }
}

/// Registration with a backend's state-change channel
///
/// Dropping the guard (or calling [`release`](Self::release)) unregisters
/// the listener; no callback is delivered after release returns. Releasing
/// from inside the listener's own callback is not supported.
#[must_use = "dropping the guard unregisters the listener"]
pub struct ListenerGuard {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ListenerGuard {
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for ListenerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerGuard")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Identity backend abstraction
///
/// Implementations (adapters) talk to a real identity service. The session
/// façade only ever sees this trait.
#[async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Backend name (e.g., "firebase", "memory")
    fn name(&self) -> &str;

    /// Register for user changes. The backend reports its current user once
    /// (during registration or shortly after) and then on every change,
    /// including ones it originates itself such as remote revocation.
    fn on_state_change(&self, listener: StateListener) -> ListenerGuard;

    /// Verify credentials and start a session
    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Identity, BackendError>;

    /// Create an account and start a session for it
    async fn create_account(&self, identifier: &str, secret: &str)
        -> Result<Identity, BackendError>;

    /// Change profile fields of an existing identity, returning the updated record
    async fn update_profile(
        &self,
        identity: &Identity,
        update: &ProfileUpdate,
    ) -> Result<Identity, BackendError>;

    /// End the current session. Returns only once the backend has confirmed.
    async fn sign_out(&self) -> Result<(), BackendError>;
}
