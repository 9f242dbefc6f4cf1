use super::*;
use crate::auth::store::AuthState;
use crate::identity::memory::MemoryIdentity;
use crate::identity::test_helpers::{self, ScriptedIdentity};
use crate::identity::{AuthListener, Role, Subscription};
use tokio::time::{Duration, timeout};

struct Harness {
    orchestrator: AuthOrchestrator,
    store: Arc<SessionStore>,
    _sub: Subscription,
}

fn harness(client: Arc<dyn IdentityClient>) -> Harness {
    let store = SessionStore::new(Arc::clone(&client));
    let sub = store.subscribe();
    let orchestrator = AuthOrchestrator::new(client, Arc::clone(&store), Arc::new(AuthConfig::default()));
    Harness { orchestrator, store, _sub: sub }
}

fn scripted() -> (Arc<ScriptedIdentity>, Harness) {
    let identity = Arc::new(ScriptedIdentity::new());
    let h = harness(Arc::clone(&identity) as Arc<dyn IdentityClient>);
    (identity, h)
}

// =============================================================================
// login
// =============================================================================

#[tokio::test]
async fn blank_fields_fail_locally() {
    let (identity, h) = scripted();

    for (email, password) in [("", "pw"), ("a@b.com", ""), ("   ", "pw")] {
        let err = h.orchestrator.login(email, password, None).await.unwrap_err();
        assert_eq!(err, LoginError::MissingFields);
        assert_eq!(err.to_string(), "Please fill in all fields");
    }
    assert_eq!(ScriptedIdentity::calls(&identity.sign_in_calls), 0);
    assert_eq!(h.store.snapshot(), AuthState::unknown());
}

#[tokio::test]
async fn whitespace_password_goes_to_provider() {
    let (identity, h) = scripted();

    let err = h.orchestrator.login("a@b.com", "   ", None).await.unwrap_err();
    assert_eq!(err, LoginError::InvalidCredentials);
    assert_eq!(ScriptedIdentity::calls(&identity.sign_in_calls), 1);
}

#[tokio::test]
async fn rejected_credentials_set_generic_error() {
    let (identity, h) = scripted();

    let err = h.orchestrator.login("a@b.com", "wrong", None).await.unwrap_err();
    assert_eq!(err, LoginError::InvalidCredentials);
    assert_eq!(ScriptedIdentity::calls(&identity.sign_in_calls), 1);

    let state = h.store.snapshot();
    assert_eq!(state.error.as_deref(), Some("Invalid credentials"));
    assert!(!state.loading);
    assert!(state.user.is_none());
}

#[tokio::test]
async fn provider_failure_is_reported_generically() {
    let (identity, h) = scripted();
    identity.push_sign_in(Err(IdentityError::Api { status: 500, message: "db down at 10.0.0.3".into() }));

    let err = h.orchestrator.login("a@b.com", "pw", None).await.unwrap_err();
    assert_eq!(err, LoginError::Service(GENERIC_LOGIN_FAILURE));
    assert_eq!(err.to_string(), "Invalid credentials");
    assert_eq!(h.store.snapshot().error.as_deref(), Some("Invalid credentials"));
}

#[tokio::test]
async fn unusable_session_counts_as_failure() {
    let (identity, h) = scripted();
    let mut session = test_helpers::session_for(test_helpers::user("u1"));
    session.access_token.clear();
    identity.push_sign_in(Ok(session));

    let err = h.orchestrator.login("a@b.com", "pw", None).await.unwrap_err();
    assert_eq!(err, LoginError::Service(GENERIC_LOGIN_FAILURE));
    assert!(!h.store.snapshot().loading);
}

#[tokio::test]
async fn success_redirects_to_requested_page() {
    let (identity, h) = scripted();
    identity.push_sign_in(Ok(test_helpers::session_for(test_helpers::user("u1"))));

    let ok = h.orchestrator.login(" a@b.com ", "pw", Some("%2Fdashboard%2Fsettings")).await.unwrap();
    assert_eq!(ok.redirect, "/dashboard/settings");
    assert_eq!(ok.user.id, "u1");

    let state = h.store.snapshot();
    assert_eq!(state.user.map(|u| u.id), Some("u1".to_owned()));
    assert!(!state.loading);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn success_ignores_unsafe_or_auth_only_targets() {
    for target in [None, Some("http://evil.com"), Some("//evil.com"), Some("%2Fauth%2Flogin")] {
        let (identity, h) = scripted();
        identity.push_sign_in(Ok(test_helpers::session_for(test_helpers::user("u1"))));
        let ok = h.orchestrator.login("a@b.com", "pw", target).await.unwrap();
        assert_eq!(ok.redirect, "/dashboard", "{target:?}");
    }
}

#[tokio::test]
async fn new_attempt_clears_previous_error() {
    let (identity, h) = scripted();
    h.orchestrator.login("a@b.com", "wrong", None).await.unwrap_err();
    assert!(h.store.snapshot().error.is_some());

    identity.push_sign_in(Ok(test_helpers::session_for(test_helpers::user("u1"))));
    h.orchestrator.login("a@b.com", "right", None).await.unwrap();
    assert!(h.store.snapshot().error.is_none());
}

#[tokio::test]
async fn login_is_loading_while_in_flight() {
    let (identity, h) = scripted();
    let gate = identity.gate_sign_in();
    let h = Arc::new(h);

    let call = tokio::spawn({
        let h = Arc::clone(&h);
        async move { h.orchestrator.login("a@b.com", "pw", None).await }
    });
    while ScriptedIdentity::calls(&identity.sign_in_calls) == 0 {
        tokio::task::yield_now().await;
    }
    assert!(h.store.snapshot().loading);

    gate.send(Ok(test_helpers::session_for(test_helpers::user("u1")))).unwrap();
    call.await.unwrap().unwrap();
    assert!(!h.store.snapshot().loading);
}

#[tokio::test]
async fn dropped_caller_still_settles_store() {
    let (identity, h) = scripted();
    let gate = identity.gate_sign_in();
    let h = Arc::new(h);

    let call = tokio::spawn({
        let h = Arc::clone(&h);
        async move { h.orchestrator.login("a@b.com", "pw", None).await }
    });
    while ScriptedIdentity::calls(&identity.sign_in_calls) == 0 {
        tokio::task::yield_now().await;
    }
    call.abort();
    assert!(call.await.unwrap_err().is_cancelled());
    assert!(h.store.snapshot().loading);

    let mut rx = h.store.watch();
    gate.send(Ok(test_helpers::session_for(test_helpers::user("u1")))).unwrap();
    timeout(Duration::from_millis(500), rx.wait_for(|s| !s.loading && s.user.is_some()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.store.user().map(|u| u.id), Some("u1".to_owned()));
}

// =============================================================================
// logout
// =============================================================================

#[tokio::test]
async fn logout_from_protected_page_goes_to_login() {
    let (identity, h) = scripted();
    identity.emit(crate::identity::AuthEvent::SignedIn, Some(test_helpers::session_for(test_helpers::user("u1"))));

    let outcome = h.orchestrator.logout("/dashboard").await;
    assert_eq!(outcome, LogoutOutcome::Redirect("/auth/login".into()));
    assert_eq!(h.store.user(), None);
    assert!(!h.store.snapshot().loading);
}

#[tokio::test]
async fn logout_from_public_page_stays() {
    let (identity, h) = scripted();
    identity.emit(crate::identity::AuthEvent::SignedIn, Some(test_helpers::session_for(test_helpers::user("u1"))));

    assert_eq!(h.orchestrator.logout("/blog").await, LogoutOutcome::Stay);
    assert_eq!(h.store.user(), None);
}

#[tokio::test]
async fn failed_logout_keeps_user_and_error() {
    let (identity, h) = scripted();
    identity.emit(crate::identity::AuthEvent::SignedIn, Some(test_helpers::session_for(test_helpers::user("u1"))));
    identity.push_sign_out(Err(IdentityError::Network("offline".into())));

    assert_eq!(h.orchestrator.logout("/dashboard").await, LogoutOutcome::Failed);
    let state = h.store.snapshot();
    assert_eq!(state.user.map(|u| u.id), Some("u1".to_owned()));
    assert!(!state.loading);
    assert!(state.error.is_none());
}

// =============================================================================
// register
// =============================================================================

#[tokio::test]
async fn register_validates_locally() {
    let (_identity, h) = scripted();
    let cases = [
        (("", "password1", "password1"), LoginError::MissingFields),
        (("a@b.com", "password1", ""), LoginError::MissingFields),
        (("a@b.com", "password1", "password2"), LoginError::PasswordMismatch),
        (("a@b.com", "short", "short"), LoginError::WeakPassword),
    ];
    for ((email, password, confirm), expected) in cases {
        assert_eq!(h.orchestrator.register(email, password, confirm, None).await, Err(expected));
    }
    assert_eq!(LoginError::WeakPassword.to_string(), "Password must be at least 8 characters");
    assert_eq!(h.store.snapshot(), AuthState::unknown());
}

#[tokio::test]
async fn register_signs_in_with_memory_provider() {
    let h = harness(Arc::new(MemoryIdentity::default()));

    let outcome = h.orchestrator.register("new@example.com", "password1", "password1", None).await.unwrap();
    assert_eq!(outcome, RegisterOutcome::SignedIn { redirect: "/dashboard".into() });
    assert_eq!(h.store.user().map(|u| u.email), Some("new@example.com".to_owned()));
}

#[tokio::test]
async fn register_duplicate_reports_conflict() {
    let identity = Arc::new(MemoryIdentity::default());
    identity.add_user("taken@example.com", "password1", None, Role::User).unwrap();
    let h = harness(identity);

    let err = h.orchestrator.register("taken@example.com", "password1", "password1", None).await.unwrap_err();
    assert_eq!(err.to_string(), "An account with this email already exists");
    assert!(!h.store.snapshot().loading);
    assert!(h.store.user().is_none());
}

#[tokio::test]
async fn register_unsupported_by_provider() {
    let (_identity, h) = scripted();
    let err = h.orchestrator.register("a@b.com", "password1", "password1", None).await.unwrap_err();
    assert_eq!(err, LoginError::Service("This action is not available"));
}

/// Provider that accepts sign-ups but holds them for email confirmation.
struct ConfirmFirst(ScriptedIdentity);

#[async_trait::async_trait]
impl IdentityClient for ConfirmFirst {
    async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        self.0.get_session().await
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        self.0.sign_in_with_password(email, password).await
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.0.sign_out().await
    }

    async fn sign_up(&self, _email: &str, _password: &str) -> Result<Option<Session>, IdentityError> {
        Ok(None)
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription {
        self.0.on_auth_state_change(listener)
    }
}

#[tokio::test]
async fn register_pending_confirmation_goes_to_verify_page() {
    let h = harness(Arc::new(ConfirmFirst(ScriptedIdentity::new())));
    let outcome = h.orchestrator.register("a@b.com", "password1", "password1", None).await.unwrap();
    assert_eq!(outcome, RegisterOutcome::ConfirmationRequired { redirect: "/auth/verify-email".into() });
    assert!(!h.store.snapshot().loading);
}
