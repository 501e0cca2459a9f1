//! Chronicles Core - client-side session and authentication logic
//!
//! This crate implements the session façade following hexagonal architecture:
//!
//! - **domain**: Identities, session state, auth errors, the signup wizard
//! - **ports**: Trait definitions for external dependencies (IdentityBackend)
//! - **services**: The session façade and the structured event log
//! - **adapters**: Concrete backends (Firebase Identity Toolkit, in-memory)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use config::Config;
use services::{EntryPoint, LoggingService, SessionFacade};

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{
    AuthError, AuthErrorKind, AuthenticatedSession, Identity, SessionPhase, SessionState,
    SignupForm, SignupOutcome,
};
pub use services::Subscription;

/// Main context for Chronicles operations
///
/// Holds the configuration, the process's single session façade and the
/// event logger. Build one per process and hand out references.
pub struct ChroniclesContext {
    pub config: Config,
    pub chronicles_dir: PathBuf,
    pub session: Arc<SessionFacade>,
    pub logger: Option<Arc<LoggingService>>,
}

impl ChroniclesContext {
    /// Load config, build the identity backend and connect the façade.
    ///
    /// A missing Firebase configuration is not an error: the façade is
    /// created without a backend and reports `backend_unconfigured`.
    pub fn new(chronicles_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        std::fs::create_dir_all(chronicles_dir)?;
        let config = Config::load(chronicles_dir)?;

        // The event log is best-effort
        let logger = LoggingService::new(chronicles_dir, entry_point, env!("CARGO_PKG_VERSION"))
            .ok()
            .map(Arc::new);

        let backend = adapters::initialize(&config, chronicles_dir);
        let session = match &logger {
            Some(logger) => SessionFacade::with_logger(backend, Arc::clone(logger)),
            None => SessionFacade::new(backend),
        };
        session.connect();

        Ok(Self {
            config,
            chronicles_dir: chronicles_dir.to_path_buf(),
            session: Arc::new(session),
            logger,
        })
    }
}
