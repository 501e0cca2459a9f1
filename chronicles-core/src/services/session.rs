//! Session façade - single source of truth for who is signed in
//!
//! Wraps an [`IdentityBackend`] and owns the process's [`SessionState`].
//! The state changes only when a login/signup/logout call completes or
//! when the backend pushes a change through its state-change channel.
//! Observers receive every change in the order it was applied.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

use crate::domain::{
    AuthError, AuthErrorKind, AuthenticatedSession, Identity, ProfileUpdate, SessionPhase,
    SessionState, SignupOutcome,
};
use crate::ports::{IdentityBackend, ListenerGuard};
use crate::services::logging::{LogEvent, LoggingService};

type Observer = Box<dyn Fn(&SessionState) + Send + Sync>;

struct ObserverSlot {
    id: u64,
    active: AtomicBool,
    callback: Observer,
}

/// Where a user change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    /// The backend's state-change channel; the first one makes the session ready
    Backend,
    /// Completion of a login, signup or logout call
    Operation,
    /// A profile update; applies only while the same account is signed in
    Profile,
}

#[derive(Default)]
struct Inner {
    state: SessionState,
    connected: bool,
    observers: Vec<Arc<ObserverSlot>>,
    next_id: u64,
    pending: VecDeque<SessionState>,
    delivering: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    ready_tx: watch::Sender<bool>,
    logger: Option<Arc<LoggingService>>,
    backend_name: Option<String>,
    logouts_in_flight: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, user: Option<Identity>, source: Source) {
        let mut became_ready = false;
        let mut revoked = false;

        {
            let mut inner = self.lock();
            let mut changed = false;

            if source == Source::Backend && !inner.state.is_ready {
                inner.state.is_ready = true;
                became_ready = true;
                changed = true;
            }

            let applies = match source {
                Source::Profile => match (&inner.state.user, &user) {
                    (Some(current), Some(updated)) => current.same_account(updated),
                    _ => false,
                },
                _ => true,
            };

            if applies && inner.state.user != user {
                revoked = source == Source::Backend
                    && !became_ready
                    && inner.state.user.is_some()
                    && user.is_none()
                    && self.logouts_in_flight.load(Ordering::SeqCst) == 0;
                inner.state.user = user;
                changed = true;
            }

            if changed {
                let snapshot = inner.state.clone();
                inner.pending.push_back(snapshot);
            }
        }

        if became_ready {
            self.ready_tx.send_replace(true);
            self.log(LogEvent::new("session_ready"));
        }
        if revoked {
            self.log(LogEvent::new("session_revoked"));
        }

        self.flush();
    }

    /// Deliver pending snapshots to observers, outside the state lock.
    ///
    /// Only one caller drains at a time; a change applied while another
    /// thread (or an observer) is delivering is picked up by that drain.
    fn flush(&self) {
        {
            let mut inner = self.lock();
            if inner.delivering {
                return;
            }
            inner.delivering = true;
        }
        let mut draining = DrainGuard {
            shared: self,
            finished: false,
        };

        loop {
            let (state, observers) = {
                let mut inner = self.lock();
                match inner.pending.pop_front() {
                    Some(state) => (state, inner.observers.clone()),
                    None => {
                        inner.delivering = false;
                        draining.finished = true;
                        break;
                    }
                }
            };
            for slot in observers {
                if slot.active.load(Ordering::SeqCst) {
                    (slot.callback)(&state);
                }
            }
        }
    }

    fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            let event = match &self.backend_name {
                Some(name) => event.with_backend(name.clone()),
                None => event,
            };
            // Logging failures never affect the session
            let _ = logger.log(event);
        }
    }

    fn log_result<T>(&self, event: &str, result: &Result<T, AuthError>) {
        match result {
            Ok(_) => self.log(LogEvent::new(format!("{event}_succeeded"))),
            Err(e) => self.log(LogEvent::new(format!("{event}_failed")).with_auth_error(e)),
        }
    }

    fn remove_observer(&self, id: u64) {
        self.lock().observers.retain(|slot| slot.id != id);
    }
}

/// Clears the `delivering` flag if an observer panics mid-drain
struct DrainGuard<'a> {
    shared: &'a Shared,
    finished: bool,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.shared.lock().delivering = false;
        }
    }
}

/// Decrements the in-flight logout count on every exit path
struct LogoutInFlight<'a>(&'a AtomicUsize);

impl<'a> LogoutInFlight<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::SeqCst);
        Self(count)
    }
}

impl Drop for LogoutInFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Observer registration returned by [`SessionFacade::subscribe`]
///
/// Dropping it (or calling [`unsubscribe`](Self::unsubscribe)) stops all
/// further deliveries to the observer.
#[must_use = "dropping the subscription unsubscribes the observer"]
pub struct Subscription {
    slot: Arc<ObserverSlot>,
    shared: Weak<Shared>,
}

impl Subscription {
    pub fn unsubscribe(self) {}

    pub fn is_active(&self) -> bool {
        self.slot.active.load(Ordering::SeqCst)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.slot.active.store(false, Ordering::SeqCst);
        if let Some(shared) = self.shared.upgrade() {
            shared.remove_observer(self.slot.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.slot.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Authentication façade over an optional identity backend
///
/// One instance per process, shared by `Arc`. A façade built without a
/// backend stays `Uninitialized` and fails every operation with
/// [`AuthErrorKind::BackendUnconfigured`].
pub struct SessionFacade {
    backend: Option<Arc<dyn IdentityBackend>>,
    shared: Arc<Shared>,
    listener: Mutex<Option<ListenerGuard>>,
}

impl SessionFacade {
    pub fn new(backend: Option<Arc<dyn IdentityBackend>>) -> Self {
        Self::build(backend, None)
    }

    /// Façade that records session events to the given logger
    pub fn with_logger(
        backend: Option<Arc<dyn IdentityBackend>>,
        logger: Arc<LoggingService>,
    ) -> Self {
        Self::build(backend, Some(logger))
    }

    fn build(
        backend: Option<Arc<dyn IdentityBackend>>,
        logger: Option<Arc<LoggingService>>,
    ) -> Self {
        let (ready_tx, _) = watch::channel(false);
        let shared = Shared {
            inner: Mutex::new(Inner::default()),
            ready_tx,
            logger,
            backend_name: backend.as_ref().map(|b| b.name().to_string()),
            logouts_in_flight: AtomicUsize::new(0),
        };

        Self {
            backend,
            shared: Arc::new(shared),
            listener: Mutex::new(None),
        }
    }

    /// Attach to the backend's state-change channel.
    ///
    /// Returns false when there is no backend. Calling it again while
    /// connected is a no-op.
    pub fn connect(&self) -> bool {
        let Some(backend) = &self.backend else {
            return false;
        };

        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if listener.is_some() {
            return true;
        }

        self.shared.lock().connected = true;
        let shared = Arc::clone(&self.shared);
        *listener = Some(backend.on_state_change(Arc::new(move |user| {
            shared.apply(user, Source::Backend);
        })));
        true
    }

    /// Release the backend listener. The last known state is kept.
    pub fn disconnect(&self) {
        let guard = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(guard) = guard {
            guard.release();
            self.shared.lock().connected = false;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.lock().connected
    }

    /// Backend for an operation, connecting first if needed
    fn backend(&self) -> Result<Arc<dyn IdentityBackend>, AuthError> {
        let backend = self.backend.clone().ok_or_else(AuthError::unconfigured)?;
        self.connect();
        Ok(backend)
    }

    fn require_credentials(identifier: &str, secret: &str) -> Result<(), AuthError> {
        if identifier.trim().is_empty() {
            return Err(AuthError::invalid_input("identifier must not be empty"));
        }
        if secret.is_empty() {
            return Err(AuthError::invalid_input("secret must not be empty"));
        }
        Ok(())
    }

    /// Sign in with an identifier (email) and secret
    pub async fn login(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<AuthenticatedSession, AuthError> {
        let result = self.try_login(identifier, secret).await;
        self.shared.log_result("login", &result);
        result
    }

    async fn try_login(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<AuthenticatedSession, AuthError> {
        let backend = self.backend()?;
        Self::require_credentials(identifier, secret)?;

        let identity = backend.sign_in(identifier.trim(), secret).await?;
        self.shared.apply(Some(identity.clone()), Source::Operation);

        Ok(AuthenticatedSession::new(identity, backend.name()))
    }

    /// Create an account and sign it in, then attach `display_name` if given.
    ///
    /// A failed display-name update still leaves the new session in place
    /// and yields [`SignupOutcome::PartialSuccess`].
    pub async fn signup(
        &self,
        identifier: &str,
        secret: &str,
        display_name: Option<&str>,
    ) -> Result<SignupOutcome, AuthError> {
        let result = self.try_signup(identifier, secret, display_name).await;
        match &result {
            Ok(SignupOutcome::Complete(_)) => self.shared.log(LogEvent::new("signup_succeeded")),
            Ok(SignupOutcome::PartialSuccess { warning, .. }) => self
                .shared
                .log(LogEvent::new("signup_partial").with_auth_error(warning)),
            Err(e) => self
                .shared
                .log(LogEvent::new("signup_failed").with_auth_error(e)),
        }
        result
    }

    async fn try_signup(
        &self,
        identifier: &str,
        secret: &str,
        display_name: Option<&str>,
    ) -> Result<SignupOutcome, AuthError> {
        let backend = self.backend()?;
        Self::require_credentials(identifier, secret)?;

        let identity = backend.create_account(identifier.trim(), secret).await?;
        self.shared.apply(Some(identity.clone()), Source::Operation);

        let Some(name) = display_name.map(str::trim).filter(|n| !n.is_empty()) else {
            return Ok(SignupOutcome::Complete(AuthenticatedSession::new(
                identity,
                backend.name(),
            )));
        };

        match backend
            .update_profile(&identity, &ProfileUpdate::display_name(name))
            .await
        {
            Ok(updated) => {
                self.shared.apply(Some(updated.clone()), Source::Profile);
                Ok(SignupOutcome::Complete(AuthenticatedSession::new(
                    updated,
                    backend.name(),
                )))
            }
            Err(e) => Ok(SignupOutcome::PartialSuccess {
                session: AuthenticatedSession::new(identity, backend.name()),
                warning: AuthError::new(
                    AuthErrorKind::PartialSuccess,
                    format!("account created but display name was not saved: {}", e.message),
                ),
            }),
        }
    }

    /// End the session. State is cleared only once the backend confirms.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let result = self.try_logout().await;
        self.shared.log_result("logout", &result);
        result
    }

    async fn try_logout(&self) -> Result<(), AuthError> {
        let backend = self.backend()?;

        let signed_out = {
            let _in_flight = LogoutInFlight::enter(&self.shared.logouts_in_flight);
            backend.sign_out().await
        };

        match signed_out {
            Ok(()) => {
                self.shared.apply(None, Source::Operation);
                Ok(())
            }
            Err(e) => {
                let error = AuthError::from(e);
                if error.kind == AuthErrorKind::BackendUnconfigured {
                    Err(error)
                } else {
                    Err(AuthError::new(AuthErrorKind::NetworkUnavailable, error.message))
                }
            }
        }
    }

    /// Register an observer for every change of `user` or `is_ready`
    pub fn subscribe(
        &self,
        observer: impl Fn(&SessionState) + Send + Sync + 'static,
    ) -> Subscription {
        let slot = {
            let mut inner = self.shared.lock();
            let slot = Arc::new(ObserverSlot {
                id: inner.next_id,
                active: AtomicBool::new(true),
                callback: Box::new(observer),
            });
            inner.next_id += 1;
            inner.observers.push(Arc::clone(&slot));
            slot
        };

        Subscription {
            slot,
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        let inner = self.shared.lock();
        match (&inner.state.user, inner.state.is_ready, inner.connected) {
            (_, false, false) => SessionPhase::Uninitialized,
            (_, false, true) => SessionPhase::Syncing,
            (Some(_), true, _) => SessionPhase::Authenticated,
            (None, true, _) => SessionPhase::Anonymous,
        }
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.shared.lock().state.user.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.lock().state.is_ready
    }

    /// Resolve once the first backend callback has been applied.
    ///
    /// Never resolves for a façade without a backend.
    pub async fn wait_until_ready(&self) {
        let mut ready = self.shared.ready_tx.subscribe();
        let _ = ready.wait_for(|is_ready| *is_ready).await;
    }

    pub fn backend_name(&self) -> Option<&str> {
        self.shared.backend_name.as_deref()
    }
}

impl Drop for SessionFacade {
    fn drop(&mut self) {
        self.disconnect();
    }
}
