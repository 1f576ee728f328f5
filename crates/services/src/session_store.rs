//! Single source of truth for the current authenticated identity.
//!
//! State only changes through explicit operations (`initialize`, `login`,
//! `update_auth_state`, `sign_out`), every transition is pushed to
//! registered listeners, and credentials are persisted through a
//! [`CredentialStore`] so a restart can rehydrate optimistically before
//! the token is validated against the backend.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use cert_core::Clock;
use cert_core::model::{AuthToken, SessionState, User};

use crate::api::AuthApi;
use crate::credentials::{CookieAttributes, CredentialStore, PersistedCredentials};
use crate::error::CredentialStoreError;

type Listener = Arc<dyn Fn(&SessionState) + Send + Sync>;

/// Identifies a registered listener so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Process-wide session/auth state with notification-based propagation.
pub struct SessionStore {
    state: Mutex<SessionState>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
    credentials: Arc<dyn CredentialStore>,
    auth_api: Arc<dyn AuthApi>,
    clock: Clock,
    initialized: AtomicBool,
}

impl SessionStore {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        auth_api: Arc<dyn AuthApi>,
        clock: Clock,
    ) -> Self {
        Self {
            state: Mutex::new(SessionState::unauthenticated()),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            credentials,
            auth_api,
            clock,
            initialized: AtomicBool::new(false),
        }
    }

    /// Current state, cloned.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.state.lock().expect("session state poisoned").clone()
    }

    /// Register a callback receiving every subsequent transition.
    pub fn subscribe(&self, listener: impl Fn(&SessionState) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .expect("session listeners poisoned")
            .push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.listeners
            .lock()
            .expect("session listeners poisoned")
            .retain(|(listener_id, _)| *listener_id != id);
    }

    /// Rehydrate persisted credentials and validate them in the
    /// background-visible `Loading` state.
    ///
    /// Idempotent: only the first call performs validation. Token
    /// rejection and network failure are handled identically (fail
    /// closed to `Unauthenticated`) and never propagate to subscribers
    /// as errors.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        let loaded = match self.credentials.load() {
            Ok(loaded) => loaded,
            Err(err) => {
                warn!(error = %err, "failed to read persisted credentials");
                None
            }
        };
        let Some(creds) = loaded else {
            self.set_state(SessionState::unauthenticated());
            return;
        };
        if creds.is_expired(self.clock.now()) {
            debug!("persisted credentials expired, clearing");
            self.clear_credentials();
            self.set_state(SessionState::unauthenticated());
            return;
        }

        // show the cached user while the token is validated, so a reload
        // does not flash signed-out
        let token = creds.token.clone();
        self.set_state(SessionState::loading(
            Some(creds.user.clone()),
            Some(token.clone()),
        ));

        match self.auth_api.me(&token).await {
            Ok(user) => {
                let refreshed = PersistedCredentials::new(
                    token.clone(),
                    user.clone(),
                    creds.attributes.clone(),
                );
                if let Err(err) = self.credentials.save(&refreshed) {
                    warn!(error = %err, "failed to refresh persisted credentials");
                }
                self.set_state(SessionState::authenticated(user, token));
            }
            Err(err) => {
                debug!(error = %err, "token validation failed, signing out locally");
                self.clear_credentials();
                self.set_state(SessionState::unauthenticated());
            }
        }
    }

    /// Enter the authenticated state with credentials the caller already
    /// obtained (the OAuth exchange happens elsewhere). Synchronous, no
    /// server round trip.
    ///
    /// The in-memory state is live even if persistence fails; the error
    /// only means the session will not survive a restart.
    ///
    /// # Errors
    ///
    /// Returns `CredentialStoreError` if the credentials cannot be
    /// persisted.
    pub fn login(&self, user: User, token: AuthToken) -> Result<(), CredentialStoreError> {
        self.set_state(SessionState::authenticated(user.clone(), token.clone()));
        self.credentials.save(&PersistedCredentials::new(
            token,
            user,
            CookieAttributes::standard(self.clock.now()),
        ))
    }

    /// OAuth-callback entry point: routes to `login` or `sign_out`
    /// depending on the flag. A `true` flag without full credentials
    /// fails closed.
    ///
    /// # Errors
    ///
    /// Returns `CredentialStoreError` from the underlying `login`.
    pub async fn update_auth_state(
        &self,
        authenticated: bool,
        user: Option<User>,
        token: Option<AuthToken>,
    ) -> Result<(), CredentialStoreError> {
        match (authenticated, user, token) {
            (true, Some(user), Some(token)) => self.login(user, token),
            _ => {
                self.sign_out().await;
                Ok(())
            }
        }
    }

    /// Clear the session locally, then notify the backend best-effort.
    ///
    /// The local sign-out never waits on the network: the logout call is
    /// spawned fire-and-forget and its failure is only logged.
    pub async fn sign_out(&self) {
        let token = self.snapshot().token().cloned();
        self.clear_credentials();
        self.set_state(SessionState::unauthenticated());

        if let Some(token) = token {
            let api = Arc::clone(&self.auth_api);
            tokio::spawn(async move {
                if let Err(err) = api.logout(&token).await {
                    debug!(error = %err, "backend logout failed (ignored)");
                }
            });
        }
    }

    /// Headers to attach to outbound requests. Never fails; when no token
    /// is held the map simply has no `Authorization` entry.
    #[must_use]
    pub fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = self.snapshot().token() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token.expose())) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    fn clear_credentials(&self) {
        if let Err(err) = self.credentials.clear() {
            warn!(error = %err, "failed to clear persisted credentials");
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().expect("session state poisoned") = state.clone();
        // clone the listener list out so callbacks may re-enter the store
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .expect("session listeners poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&state);
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
