//! Scripted identity client and fixtures shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use time::{Duration, OffsetDateTime};
use tokio::sync::oneshot;

use super::{
    AuthChange, AuthEvent, AuthListener, IdentityClient, IdentityError, ListenerRegistry, Role, Session,
    Subscription, User,
};

type SessionResult = Result<Option<Session>, IdentityError>;
type SignInResult = Result<Session, IdentityError>;

pub(crate) fn user(id: &str) -> User {
    User { id: id.to_owned(), email: format!("{id}@example.com"), display_name: None, role: Role::User }
}

pub(crate) fn admin(id: &str) -> User {
    User { role: Role::Admin, ..user(id) }
}

pub(crate) fn session_for(user: User) -> Session {
    Session {
        access_token: format!("token-{}", user.id),
        refresh_token: Some(format!("refresh-{}", user.id)),
        expires_at: OffsetDateTime::now_utc() + Duration::hours(1),
        user,
    }
}

/// Identity client whose answers are queued up front by the test.
///
/// Gated calls park until the test resolves the matching sender, which lets a
/// test choose the completion order of overlapping requests.
#[derive(Default)]
pub(crate) struct ScriptedIdentity {
    pub listeners: ListenerRegistry,
    session_results: Mutex<VecDeque<SessionResult>>,
    session_gates: Mutex<VecDeque<oneshot::Receiver<SessionResult>>>,
    sign_in_results: Mutex<VecDeque<SignInResult>>,
    sign_in_gates: Mutex<VecDeque<oneshot::Receiver<SignInResult>>>,
    sign_out_results: Mutex<VecDeque<Result<(), IdentityError>>>,
    pub session_calls: AtomicUsize,
    pub sign_in_calls: AtomicUsize,
    pub sign_out_calls: AtomicUsize,
}

impl ScriptedIdentity {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_session(&self, result: SessionResult) {
        self.session_results.lock().unwrap_or_else(PoisonError::into_inner).push_back(result);
    }

    pub(crate) fn gate_session(&self) -> oneshot::Sender<SessionResult> {
        let (tx, rx) = oneshot::channel();
        self.session_gates.lock().unwrap_or_else(PoisonError::into_inner).push_back(rx);
        tx
    }

    pub(crate) fn push_sign_in(&self, result: SignInResult) {
        self.sign_in_results.lock().unwrap_or_else(PoisonError::into_inner).push_back(result);
    }

    pub(crate) fn gate_sign_in(&self) -> oneshot::Sender<SignInResult> {
        let (tx, rx) = oneshot::channel();
        self.sign_in_gates.lock().unwrap_or_else(PoisonError::into_inner).push_back(rx);
        tx
    }

    pub(crate) fn push_sign_out(&self, result: Result<(), IdentityError>) {
        self.sign_out_results.lock().unwrap_or_else(PoisonError::into_inner).push_back(result);
    }

    pub(crate) fn emit(&self, event: AuthEvent, session: Option<Session>) {
        self.listeners.emit(&AuthChange { event, session });
    }

    pub(crate) fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityClient for ScriptedIdentity {
    async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.session_gates.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        if let Some(gate) = gate {
            return gate.await.unwrap_or_else(|_| Err(IdentityError::Network("gate dropped".into())));
        }
        let queued = self.session_results.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        queued.unwrap_or(Ok(None))
    }

    async fn sign_in_with_password(&self, _email: &str, _password: &str) -> Result<Session, IdentityError> {
        self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.sign_in_gates.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        let result = match gate {
            Some(gate) => gate.await.unwrap_or_else(|_| Err(IdentityError::Network("gate dropped".into()))),
            None => self
                .sign_in_results
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or(Err(IdentityError::InvalidCredentials)),
        };
        if let Ok(session) = &result {
            self.emit(AuthEvent::SignedIn, Some(session.clone()));
        }
        result
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        let result = self
            .sign_out_results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Ok(()));
        if result.is_ok() {
            self.emit(AuthEvent::SignedOut, None);
        }
        result
    }

    fn on_auth_state_change(&self, listener: AuthListener) -> Subscription {
        self.listeners.register(listener)
    }
}
