//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - Firebase Identity Toolkit (REST) for IdentityBackend
//! - In-memory accounts for IdentityBackend (tests, offline use)
//! - Local filesystem for persisted sessions

pub mod firebase;
pub mod listeners;
pub mod memory;
pub mod session_store;

#[cfg(test)]
pub mod firebase_mock;

use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::ports::IdentityBackend;

use firebase::FirebaseBackend;
use session_store::SessionStore;

/// Build the identity backend for this execution context.
///
/// Returns `None` when no Firebase project is configured (or the client
/// cannot be built); the session façade then stays uninitialized and
/// reports every operation as `backend_unconfigured`.
pub fn initialize(config: &Config, chronicles_dir: &Path) -> Option<Arc<dyn IdentityBackend>> {
    if !config.firebase.is_configured() {
        return None;
    }

    let store = SessionStore::new(chronicles_dir);
    FirebaseBackend::new(&config.firebase, Some(store))
        .ok()
        .map(|backend| Arc::new(backend) as Arc<dyn IdentityBackend>)
}
