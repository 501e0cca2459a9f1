//! Integration tests for the session façade
//!
//! Every scenario runs the real façade against the in-memory identity
//! backend, which speaks Firebase's error codes.
//!
//! Run with: cargo test --test session_facade_test -- --nocapture

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chronicles_core::adapters::memory::MemoryBackend;
use chronicles_core::ports::IdentityBackend;
use chronicles_core::services::SessionFacade;
use chronicles_core::{AuthErrorKind, SessionPhase, SessionState, SignupOutcome, Subscription};

// ============================================================================
// Test Helpers
// ============================================================================

fn facade(backend: MemoryBackend) -> (SessionFacade, Arc<MemoryBackend>) {
    let backend = Arc::new(backend);
    let facade = SessionFacade::new(Some(Arc::clone(&backend) as Arc<dyn IdentityBackend>));
    (facade, backend)
}

/// Façade connected to a backend that already knows `user@example.com`
fn connected_with_user() -> (SessionFacade, Arc<MemoryBackend>) {
    let (facade, backend) =
        facade(MemoryBackend::new().with_account("user@example.com", "correct-pw"));
    assert!(facade.connect());
    (facade, backend)
}

fn record(facade: &SessionFacade) -> (Subscription, Arc<Mutex<Vec<SessionState>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = facade.subscribe(move |state| sink.lock().unwrap().push(state.clone()));
    (subscription, seen)
}

fn emails(seen: &Mutex<Vec<SessionState>>) -> Vec<Option<String>> {
    seen.lock()
        .unwrap()
        .iter()
        .map(|s| s.user.as_ref().map(|u| u.email.clone()))
        .collect()
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_success_sets_user_and_ready() {
    let (facade, _backend) = connected_with_user();

    let session = facade.login("user@example.com", "correct-pw").await.unwrap();

    let state = facade.state();
    assert!(state.is_ready);
    assert_eq!(state.user.as_ref(), Some(&session.identity));
    assert_eq!(session.identity.email, "user@example.com");
    assert_eq!(session.backend, "memory");
    assert_eq!(facade.phase(), SessionPhase::Authenticated);
}

#[tokio::test]
async fn test_login_wrong_secret_is_invalid_credentials() {
    let (facade, _backend) = connected_with_user();

    let err = facade.login("user@example.com", "wrong-pw").await.unwrap_err();

    assert_eq!(err.kind, AuthErrorKind::InvalidCredentials);
    assert!(facade.current_user().is_none());
    assert_eq!(facade.phase(), SessionPhase::Anonymous);
}

#[tokio::test]
async fn test_login_offline_is_network_unavailable() {
    let (facade, backend) = connected_with_user();
    backend.set_offline(true);

    let err = facade.login("user@example.com", "correct-pw").await.unwrap_err();
    assert_eq!(err.kind, AuthErrorKind::NetworkUnavailable);
    assert!(facade.current_user().is_none());
}

#[tokio::test]
async fn test_login_produces_exactly_one_notification() {
    let (facade, _backend) = connected_with_user();
    let (_subscription, seen) = record(&facade);

    facade.login("user@example.com", "correct-pw").await.unwrap();

    assert_eq!(emails(&seen), vec![Some("user@example.com".to_string())]);
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_success_clears_user() {
    let (facade, _backend) = connected_with_user();
    facade.login("user@example.com", "correct-pw").await.unwrap();

    facade.logout().await.unwrap();

    assert!(facade.current_user().is_none());
    assert!(facade.is_ready());
    assert_eq!(facade.phase(), SessionPhase::Anonymous);
}

#[tokio::test]
async fn test_logout_failure_leaves_user_unchanged() {
    let (facade, backend) = connected_with_user();
    facade.login("user@example.com", "correct-pw").await.unwrap();
    let before = facade.current_user();
    let (_subscription, seen) = record(&facade);

    backend.set_offline(true);
    let err = facade.logout().await.unwrap_err();

    assert_eq!(err.kind, AuthErrorKind::NetworkUnavailable);
    assert_eq!(facade.current_user(), before);
    assert!(seen.lock().unwrap().is_empty());
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn test_unsubscribe_before_any_notification() {
    let (facade, _backend) = connected_with_user();
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);

    let subscription = facade.subscribe(move |_| *counter.lock().unwrap() += 1);
    subscription.unsubscribe();

    facade.login("user@example.com", "correct-pw").await.unwrap();
    facade.logout().await.unwrap();

    assert_eq!(*calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_dropped_subscription_is_released() {
    let (facade, _backend) = connected_with_user();
    let calls = Arc::new(Mutex::new(0));

    {
        let counter = Arc::clone(&calls);
        let _subscription = facade.subscribe(move |_| *counter.lock().unwrap() += 1);
    }

    facade.login("user@example.com", "correct-pw").await.unwrap();
    assert_eq!(*calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_observers_called_in_registration_order() {
    let (facade, _backend) = connected_with_user();
    let order = Arc::new(Mutex::new(Vec::new()));

    let first_sink = Arc::clone(&order);
    let _first = facade.subscribe(move |_| first_sink.lock().unwrap().push("first"));
    let second_sink = Arc::clone(&order);
    let _second = facade.subscribe(move |_| second_sink.lock().unwrap().push("second"));

    facade.login("user@example.com", "correct-pw").await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
}

#[tokio::test]
async fn test_remote_revocation_reaches_observers() {
    let (facade, backend) = connected_with_user();
    facade.login("user@example.com", "correct-pw").await.unwrap();
    let (_subscription, seen) = record(&facade);

    backend.revoke();

    assert_eq!(emails(&seen), vec![None]);
    assert!(facade.current_user().is_none());
}

// ============================================================================
// Readiness
// ============================================================================

#[tokio::test]
async fn test_not_ready_before_first_backend_callback() {
    let (facade, backend) = facade(
        MemoryBackend::new()
            .with_account("user@example.com", "correct-pw")
            .deferred_initial_state(),
    );
    facade.connect();
    let (_subscription, seen) = record(&facade);

    facade.login("user@example.com", "correct-pw").await.unwrap();
    facade.login("user@example.com", "wrong-pw").await.unwrap_err();
    facade.signup("other@example.com", "StrongPass1", None).await.unwrap();

    assert!(!facade.is_ready());
    assert_eq!(facade.phase(), SessionPhase::Syncing);
    assert!(seen.lock().unwrap().iter().all(|s| !s.is_ready));

    backend.emit_initial_state();

    assert!(facade.is_ready());
    assert!(seen.lock().unwrap().last().unwrap().is_ready);
    assert_eq!(
        facade.current_user().unwrap().email,
        "other@example.com"
    );
}

#[tokio::test]
async fn test_ready_flips_once() {
    let (facade, backend) = facade(MemoryBackend::new().deferred_initial_state());
    facade.connect();
    let (_subscription, seen) = record(&facade);

    backend.emit_initial_state();
    backend.emit_initial_state();

    assert_eq!(seen.lock().unwrap().len(), 1);
    assert!(facade.is_ready());
}

// ============================================================================
// Signup
// ============================================================================

#[tokio::test]
async fn test_signup_with_failed_profile_update_is_partial_success() {
    let (facade, backend) = facade(MemoryBackend::new());
    facade.connect();
    backend.fail_profile_updates(true);

    let outcome = facade
        .signup("new@example.com", "StrongPass1", Some("Alice"))
        .await
        .unwrap();

    assert!(outcome.is_partial());
    assert_eq!(outcome.warning().unwrap().kind, AuthErrorKind::PartialSuccess);
    assert_eq!(outcome.session().identity.email, "new@example.com");
    assert_eq!(
        facade.current_user().unwrap().email,
        "new@example.com"
    );
    assert_eq!(facade.current_user().unwrap().display_name, None);
}

#[tokio::test]
async fn test_signup_existing_identifier_fails() {
    let (facade, _backend) =
        facade(MemoryBackend::new().with_account("existing@example.com", "AnyPass1"));
    facade.connect();

    let err = facade
        .signup("existing@example.com", "AnyPass1", None)
        .await
        .unwrap_err();

    assert_eq!(err.kind, AuthErrorKind::IdentifierAlreadyInUse);
    assert!(facade.current_user().is_none());
}

#[tokio::test]
async fn test_signup_weak_secret_fails() {
    let (facade, backend) = facade(MemoryBackend::new());

    let err = facade.signup("new@example.com", "abc", None).await.unwrap_err();

    assert_eq!(err.kind, AuthErrorKind::WeakSecret);
    assert_eq!(backend.account_count(), 0);
}

#[tokio::test]
async fn test_signup_complete_with_display_name() {
    let (facade, _backend) = facade(MemoryBackend::new());

    let outcome = facade
        .signup("new@example.com", "StrongPass1", Some("Alice"))
        .await
        .unwrap();

    match outcome {
        SignupOutcome::Complete(session) => {
            assert_eq!(session.identity.display_name.as_deref(), Some("Alice"));
            assert_eq!(session.identity.label(), "Alice");
        }
        other => panic!("expected a complete signup, got {other:?}"),
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operations_last_completion_wins() {
    let backend = Arc::new(
        MemoryBackend::new()
            .with_account("a@example.com", "secret-a")
            .with_account("b@example.com", "secret-b")
            .with_latency(Duration::from_millis(20)),
    );
    let facade = Arc::new(SessionFacade::new(Some(
        Arc::clone(&backend) as Arc<dyn IdentityBackend>
    )));
    facade.connect();

    let completed = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for (email, secret) in [("a@example.com", "secret-a"), ("b@example.com", "secret-b")] {
        let facade = Arc::clone(&facade);
        let completed = Arc::clone(&completed);
        handles.push(tokio::spawn(async move {
            let session = facade.login(email, secret).await.unwrap();
            completed.lock().unwrap().push(session.identity.email);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Both resolved independently; neither was cancelled or coalesced
    let completed = completed.lock().unwrap();
    assert_eq!(completed.len(), 2);
    let current = facade.current_user().unwrap();
    assert!(completed.contains(&current.email));
    assert!(backend.current_user().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_notifications_are_not_interleaved() {
    let (facade, _backend) = facade(
        MemoryBackend::new()
            .with_account("user@example.com", "correct-pw")
            .with_latency(Duration::from_millis(5)),
    );
    let facade = Arc::new(facade);
    facade.connect();
    let (_subscription, seen) = record(&facade);

    for _ in 0..5 {
        facade.login("user@example.com", "correct-pw").await.unwrap();
        facade.logout().await.unwrap();
    }

    let seen = emails(&seen);
    assert_eq!(seen.len(), 10);
    for pair in seen.chunks(2) {
        assert_eq!(pair[0].as_deref(), Some("user@example.com"));
        assert_eq!(pair[1], None);
    }
}

#[test]
fn test_disconnect_stops_backend_pushes() {
    let (facade, backend) = connected_with_user();
    assert_eq!(backend.listener_count(), 1);

    facade.disconnect();
    assert_eq!(backend.listener_count(), 0);
    assert!(!facade.is_connected());

    let (_subscription, seen) = record(&facade);
    backend.revoke();
    assert!(seen.lock().unwrap().is_empty());
}
