//! Firebase Auth backend
//!
//! Talks to the Identity Toolkit REST API (the same service the web SDK's
//! `signInWithEmailAndPassword`, `createUserWithEmailAndPassword` and
//! `updateProfile` call). Works against the Auth emulator when an emulator
//! host is configured.
//!
//! API Documentation: https://firebase.google.com/docs/reference/rest/auth

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::listeners::ListenerRegistry;
use super::session_store::{SessionStore, StoredSession};
use crate::config::FirebaseConfig;
use crate::domain::{Identity, ProfileUpdate};
use crate::ports::{BackendError, IdentityBackend, ListenerGuard, StateListener};

pub const FIREBASE_BACKEND: &str = "firebase";

/// Default production API URL
pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fallback token lifetime when the response omits `expiresIn`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

// =============================================================================
// API Request/Response Models
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    return_secure_token: bool,
}

/// Response of `accounts:signInWithPassword` and `accounts:signUp`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    id_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<String>,
}

/// Response of `accounts:update`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateResponse {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Extract the error code from an Identity Toolkit error message.
///
/// Messages look like `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be
/// at least 6 characters`; an invalid API key comes back as prose.
fn error_code(message: &str) -> String {
    if message.starts_with("API key not valid") {
        return "API_KEY_INVALID".to_string();
    }
    message
        .split(" : ")
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Identity Toolkit base URL for the given configuration
pub fn base_url_for(config: &FirebaseConfig) -> String {
    match config.emulator_host.as_deref().map(str::trim) {
        Some(host) if !host.is_empty() => {
            let host = host.trim_start_matches("http://").trim_end_matches('/');
            format!("http://{host}/identitytoolkit.googleapis.com/v1")
        }
        _ => IDENTITY_TOOLKIT_URL.to_string(),
    }
}

// =============================================================================
// Firebase Backend
// =============================================================================

/// Firebase Identity Toolkit client
pub struct FirebaseBackend {
    client: Client,
    api_key: String,
    base_url: String,
    store: Option<SessionStore>,
    current: Mutex<Option<StoredSession>>,
    listeners: ListenerRegistry,
}

impl FirebaseBackend {
    /// Create a backend for the configured project, restoring any stored session
    pub fn new(config: &FirebaseConfig, store: Option<SessionStore>) -> Result<Self> {
        let api_key = config.api_key.as_deref().unwrap_or_default();
        Self::new_with_base_url(api_key, &base_url_for(config), store)
    }

    /// Create a backend against a custom base URL
    pub fn new_with_base_url(
        api_key: &str,
        base_url: &str,
        store: Option<SessionStore>,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("Firebase API key cannot be empty");
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        let restored = store
            .as_ref()
            .and_then(|store| store.load().ok().flatten());

        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            current: Mutex::new(restored),
            listeners: ListenerRegistry::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn current(&self) -> MutexGuard<'_, Option<StoredSession>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn endpoint(&self, method: &str) -> Result<Url, BackendError> {
        let mut url = Url::parse(&format!("{}/accounts:{}", self.base_url, method))
            .map_err(|e| BackendError::new("CONFIGURATION_NOT_FOUND", e.to_string()))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    /// reqwest errors render their URL, and the URL carries the API key
    fn map_request_error(e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::new("TIMEOUT", "request to Identity Toolkit timed out")
        } else {
            let e = e.without_url();
            BackendError::network(format!("request to Identity Toolkit failed: {e}"))
        }
    }

    async fn post<T, R>(&self, method: &str, body: &T) -> Result<R, BackendError>
    where
        T: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.endpoint(method)?)
            .json(body)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, &text));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| BackendError::new("INVALID_RESPONSE", e.without_url().to_string()))
    }

    fn status_error(status: StatusCode, body: &str) -> BackendError {
        if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
            return BackendError::new(error_code(&parsed.error.message), parsed.error.message);
        }
        match status {
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
                BackendError::new("SERVICE_UNAVAILABLE", format!("Identity Toolkit returned {status}"))
            }
            StatusCode::TOO_MANY_REQUESTS => BackendError::new(
                "TOO_MANY_ATTEMPTS_TRY_LATER",
                format!("Identity Toolkit returned {status}"),
            ),
            _ => BackendError::new("UNKNOWN", format!("Identity Toolkit returned {status}: {body}")),
        }
    }

    fn to_stored(response: AuthResponse) -> StoredSession {
        let lifetime = response
            .expires_in
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        let mut identity = Identity::new(response.local_id, response.email, FIREBASE_BACKEND);
        identity.display_name = response.display_name.filter(|n| !n.is_empty());

        StoredSession {
            identity,
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(lifetime),
        }
    }

    /// Make `session` the current one and tell listeners
    fn establish(&self, session: StoredSession) -> Identity {
        let identity = session.identity.clone();
        if let Some(store) = &self.store {
            // The backend session exists either way; a failed write only
            // means the next process starts signed out.
            let _ = store.save(&session);
        }
        // Emitting under the lock keeps registration and emission ordered
        let mut current = self.current();
        *current = Some(session);
        self.listeners.emit(Some(&identity));
        drop(current);
        identity
    }

    async fn password_call(
        &self,
        method: &str,
        identifier: &str,
        secret: &str,
    ) -> Result<Identity, BackendError> {
        let request = PasswordRequest {
            email: identifier,
            password: secret,
            return_secure_token: true,
        };
        let response: AuthResponse = self.post(method, &request).await?;
        Ok(self.establish(Self::to_stored(response)))
    }
}

#[async_trait]
impl IdentityBackend for FirebaseBackend {
    fn name(&self) -> &str {
        FIREBASE_BACKEND
    }

    fn on_state_change(&self, listener: StateListener) -> ListenerGuard {
        // No emission can land between the snapshot and its delivery
        let current = self.current();
        let guard = self.listeners.register(Arc::clone(&listener));
        listener(current.as_ref().map(|s| s.identity.clone()));
        drop(current);
        guard
    }

    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Identity, BackendError> {
        self.password_call("signInWithPassword", identifier, secret).await
    }

    async fn create_account(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<Identity, BackendError> {
        self.password_call("signUp", identifier, secret).await
    }

    async fn update_profile(
        &self,
        identity: &Identity,
        update: &ProfileUpdate,
    ) -> Result<Identity, BackendError> {
        let id_token = match self.current().as_ref() {
            Some(s) if !s.identity.same_account(identity) => {
                return Err(BackendError::new("INVALID_ID_TOKEN", "identity is not signed in"));
            }
            Some(s) if s.is_expired(Utc::now()) => {
                return Err(BackendError::new("TOKEN_EXPIRED", "stored id token has expired"));
            }
            Some(s) => s.id_token.clone(),
            None => {
                return Err(BackendError::new("INVALID_ID_TOKEN", "identity is not signed in"));
            }
        };

        let request = UpdateRequest {
            id_token: &id_token,
            display_name: update.display_name.as_deref(),
            return_secure_token: false,
        };
        let response: UpdateResponse = self.post("update", &request).await?;

        let mut updated = identity.clone();
        updated.display_name = response.display_name.or_else(|| update.display_name.clone());

        let mut current = self.current();
        if let Some(session) = current.as_mut().filter(|s| s.identity.same_account(&updated)) {
            session.identity = updated.clone();
            if let Some(store) = &self.store {
                let _ = store.save(session);
            }
        }

        Ok(updated)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        // Identity Toolkit has no sign-out call; the session ends when the
        // stored tokens are gone.
        if let Some(store) = &self.store {
            store
                .clear()
                .map_err(|e| BackendError::new("SESSION_STORE_ERROR", e.to_string()))?;
        }
        let mut current = self.current();
        *current = None;
        self.listeners.emit(None);
        Ok(())
    }
}
