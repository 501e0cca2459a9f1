//! In-process identity backend
//!
//! Keeps accounts in memory and speaks the same error codes as Firebase
//! (`EMAIL_EXISTS`, `INVALID_LOGIN_CREDENTIALS`, `WEAK_PASSWORD`, ...), so
//! the façade's normalization is exercised the same way. Failure knobs let
//! tests drive the offline, partial-signup and failed-logout paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;

use super::listeners::ListenerRegistry;
use crate::domain::{Identity, ProfileUpdate};
use crate::ports::{BackendError, IdentityBackend, ListenerGuard, StateListener};

pub const MEMORY_BACKEND: &str = "memory";

/// Shortest secret accepted by `create_account` (Firebase's default policy)
pub const MIN_SECRET_LEN: usize = 6;

const UID_LEN: usize = 28;

fn generate_uid() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(UID_LEN)
        .map(char::from)
        .collect()
}

fn account_key(identifier: &str) -> String {
    identifier.trim().to_lowercase()
}

struct MemoryAccount {
    secret: String,
    identity: Identity,
}

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<String, MemoryAccount>,
    current: Option<Identity>,
    offline: bool,
    fail_profile_updates: bool,
    fail_sign_out: bool,
    defer_initial_state: bool,
    initial_state_emitted: bool,
}

/// Identity backend held entirely in memory
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    listeners: ListenerRegistry,
    latency: Option<Duration>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account up front
    pub fn with_account(self, identifier: &str, secret: &str) -> Self {
        {
            let mut state = self.lock();
            let identity = Identity::new(generate_uid(), identifier.trim(), MEMORY_BACKEND);
            state.accounts.insert(
                account_key(identifier),
                MemoryAccount {
                    secret: secret.to_string(),
                    identity,
                },
            );
        }
        self
    }

    /// Start with `identifier` already signed in, as if a previous session had been restored.
    /// The account must have been added with [`with_account`](Self::with_account).
    pub fn with_signed_in(self, identifier: &str) -> Self {
        {
            let mut state = self.lock();
            let current = state
                .accounts
                .get(&account_key(identifier))
                .map(|account| account.identity.clone());
            state.current = current;
        }
        self
    }

    /// Hold the first state callback until [`emit_initial_state`](Self::emit_initial_state)
    pub fn deferred_initial_state(self) -> Self {
        self.lock().defer_initial_state = true;
        self
    }

    /// Delay every operation, to make concurrent calls overlap
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn fail_profile_updates(&self, fail: bool) {
        self.lock().fail_profile_updates = fail;
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.lock().fail_sign_out = fail;
    }

    /// Deliver the deferred first callback to every registered listener
    pub fn emit_initial_state(&self) {
        let current = {
            let mut state = self.lock();
            state.initial_state_emitted = true;
            state.current.clone()
        };
        self.listeners.emit(current.as_ref());
    }

    /// End the current session from the backend side (e.g. an admin revoked it)
    pub fn revoke(&self) {
        self.lock().current = None;
        self.notify(None);
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.lock().current.clone()
    }

    pub fn account_count(&self) -> usize {
        self.lock().accounts.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Push a change unless the first callback is still being held back
    fn notify(&self, user: Option<&Identity>) {
        let hold = {
            let state = self.lock();
            state.defer_initial_state && !state.initial_state_emitted
        };
        if !hold {
            self.listeners.emit(user);
        }
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_online(state: &MemoryState) -> Result<(), BackendError> {
        if state.offline {
            return Err(BackendError::network("memory backend is offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityBackend for MemoryBackend {
    fn name(&self) -> &str {
        MEMORY_BACKEND
    }

    fn on_state_change(&self, listener: StateListener) -> ListenerGuard {
        let guard = self.listeners.register(Arc::clone(&listener));

        let initial = {
            let state = self.lock();
            let hold = state.defer_initial_state && !state.initial_state_emitted;
            (!hold).then(|| state.current.clone())
        };
        if let Some(current) = initial {
            listener(current);
        }

        guard
    }

    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Identity, BackendError> {
        self.simulate_latency().await;

        let identity = {
            let mut state = self.lock();
            Self::check_online(&state)?;

            let identity = match state.accounts.get(&account_key(identifier)) {
                Some(account) if account.secret == secret => account.identity.clone(),
                _ => {
                    return Err(BackendError::new(
                        "INVALID_LOGIN_CREDENTIALS",
                        "identifier or secret is incorrect",
                    ))
                }
            };
            state.current = Some(identity.clone());
            identity
        };

        self.notify(Some(&identity));
        Ok(identity)
    }

    async fn create_account(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<Identity, BackendError> {
        self.simulate_latency().await;

        let identity = {
            let mut state = self.lock();
            Self::check_online(&state)?;

            if secret.chars().count() < MIN_SECRET_LEN {
                return Err(BackendError::new(
                    format!("WEAK_PASSWORD : Password should be at least {MIN_SECRET_LEN} characters"),
                    "secret is too short",
                ));
            }

            let key = account_key(identifier);
            if state.accounts.contains_key(&key) {
                return Err(BackendError::new(
                    "EMAIL_EXISTS",
                    "identifier is already registered",
                ));
            }

            let identity = Identity::new(generate_uid(), identifier.trim(), MEMORY_BACKEND);
            state.accounts.insert(
                key,
                MemoryAccount {
                    secret: secret.to_string(),
                    identity: identity.clone(),
                },
            );
            state.current = Some(identity.clone());
            identity
        };

        self.notify(Some(&identity));
        Ok(identity)
    }

    async fn update_profile(
        &self,
        identity: &Identity,
        update: &ProfileUpdate,
    ) -> Result<Identity, BackendError> {
        self.simulate_latency().await;

        let mut state = self.lock();
        Self::check_online(&state)?;
        if state.fail_profile_updates {
            return Err(BackendError::new(
                "INTERNAL_ERROR",
                "profile update rejected",
            ));
        }

        let account = state
            .accounts
            .values_mut()
            .find(|account| account.identity.same_account(identity))
            .ok_or_else(|| BackendError::new("USER_NOT_FOUND", "no such account"))?;

        if let Some(name) = &update.display_name {
            account.identity.display_name = Some(name.clone());
        }
        let updated = account.identity.clone();

        if state
            .current
            .as_ref()
            .is_some_and(|current| current.same_account(&updated))
        {
            state.current = Some(updated.clone());
        }

        // Profile edits are not session transitions; listeners are not told.
        Ok(updated)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        self.simulate_latency().await;

        {
            let mut state = self.lock();
            Self::check_online(&state)?;
            if state.fail_sign_out {
                return Err(BackendError::network("sign-out was not acknowledged"));
            }
            state.current = None;
        }

        self.notify(None);
        Ok(())
    }
}
