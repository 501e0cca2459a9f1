//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The session façade
//! depends only on these traits, not on concrete implementations.

mod identity_backend;

pub use identity_backend::{BackendError, IdentityBackend, ListenerGuard, StateListener};
