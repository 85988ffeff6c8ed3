//! Session client: login, refresh, logout against the identity service.
//!
//! The client is the only writer of the credential store and the only
//! component that moves [`SessionState`] between statuses.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use landreg_auth::{AuthStatus, Credentials, Registration, Session, UserProfile};
use landreg_core::{SessionError, SessionResult, StoreError};

use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::identity::IdentityService;
use crate::state::{SessionState, Transition};
use crate::store::CredentialStore;

type SharedRefresh = Shared<BoxFuture<'static, SessionResult<Session>>>;

/// Cheap-to-clone handle; clones share the same session.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

struct Inner {
    identity: Arc<dyn IdentityService>,
    store: Arc<CredentialStore>,
    state: Arc<SessionState>,
    timeout: Duration,
    lifecycle: Mutex<Lifecycle>,
}

/// Bookkeeping that orders login/refresh/logout against each other.
#[derive(Default)]
struct Lifecycle {
    /// Bumped whenever the session is replaced or ended. A refresh started
    /// under an older epoch must not commit.
    epoch: u64,
    refresh_seq: u64,
    in_flight: Option<InFlightRefresh>,
}

struct InFlightRefresh {
    seq: u64,
    future: SharedRefresh,
}

impl SessionClient {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        store: Arc<CredentialStore>,
        state: Arc<SessionState>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                identity,
                store,
                state,
                timeout: DEFAULT_REQUEST_TIMEOUT,
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    /// Client whose state is restored from `store` (see [`SessionState::restore`]).
    pub fn restore(identity: Arc<dyn IdentityService>, store: Arc<CredentialStore>) -> Self {
        let state = Arc::new(SessionState::restore(&store));
        Self::new(identity, store, state)
    }

    /// Bound applied to every identity-service call.
    ///
    /// Must be called before the client is cloned.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.timeout = timeout,
            None => tracing::warn!("timeout not applied: session client already shared"),
        }
        self
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.inner.state
    }

    pub fn status(&self) -> AuthStatus {
        self.inner.state.current()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.is_authenticated()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.state.current().user().cloned()
    }

    /// The persisted session, read through the credential store.
    pub fn current_session(&self) -> SessionResult<Option<Session>> {
        Ok(self.inner.store.load()?)
    }

    /// Access token to attach to outgoing requests, if any.
    pub fn access_token(&self) -> Option<String> {
        match self.inner.store.load() {
            Ok(session) => session.map(|s| s.access_token),
            Err(err) => {
                tracing::warn!(error = %err, "credential store unreadable; sending unauthenticated");
                None
            }
        }
    }

    /// Exchange credentials for tokens, fetch the profile, persist.
    ///
    /// Never retries. On failure the previous status is restored.
    pub async fn login(&self, identifier: &str, secret: &str) -> SessionResult<Session> {
        // A signed-in user keeps their status (and view) during a re-login.
        let previous = self.inner.state.current();
        if previous == AuthStatus::Absent {
            self.inner.state.set(AuthStatus::Authenticating);
        }

        let credentials = Credentials::new(identifier, secret);
        let outcome = match self.inner.exchange_credentials(&credentials).await {
            Ok(session) => self.inner.commit_login(session),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(session) => {
                tracing::info!(
                    user_id = %session.user.id,
                    role = %session.role(),
                    "login succeeded"
                );
                Ok(session)
            }
            Err(err) => {
                tracing::warn!(identifier, error = %err, "login failed");
                if self.inner.state.current() == AuthStatus::Authenticating {
                    self.inner.state.set(previous);
                }
                Err(err)
            }
        }
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Calls made while a refresh is in flight wait for that refresh instead
    /// of starting another one. `RefreshExpired` ends the session (store
    /// cleared, status `Absent`) before it is returned; `Network` leaves the
    /// session untouched. If the session is ended or replaced while the
    /// exchange is in flight the result is discarded and `RefreshCancelled`
    /// is returned.
    pub async fn refresh(&self) -> SessionResult<Session> {
        let future = {
            let mut lifecycle = self.inner.lifecycle();
            match &lifecycle.in_flight {
                Some(in_flight) => {
                    tracing::debug!(seq = in_flight.seq, "joining in-flight refresh");
                    in_flight.future.clone()
                }
                None => {
                    lifecycle.refresh_seq += 1;
                    let (epoch, seq) = (lifecycle.epoch, lifecycle.refresh_seq);
                    let future = self.inner.clone().run_refresh(epoch, seq).boxed().shared();
                    lifecycle.in_flight = Some(InFlightRefresh {
                        seq,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }

    /// End the session. Idempotent.
    ///
    /// Any in-flight refresh is invalidated. The status becomes `Absent` even
    /// if clearing the store fails; that failure is returned.
    pub fn logout(&self) -> SessionResult<()> {
        let (cleared, transition) = {
            let mut lifecycle = self.inner.lifecycle();
            self.inner.end_session(&mut lifecycle)
        };
        transition.deliver();
        tracing::info!("logged out");
        Ok(cleared?)
    }

    /// End the session if it is still the one that sent `access_token`.
    ///
    /// A session replaced by a newer login is left alone.
    pub(crate) fn expire(&self, access_token: &str) -> SessionResult<()> {
        let (cleared, transition) = {
            let mut lifecycle = self.inner.lifecycle();
            match self.inner.store.load() {
                Ok(Some(current)) if current.access_token != access_token => return Ok(()),
                _ => self.inner.end_session(&mut lifecycle),
            }
        };
        transition.deliver();
        tracing::info!("session expired");
        Ok(cleared?)
    }

    /// Create an account. Does not sign the new user in.
    pub async fn register(&self, registration: &Registration) -> SessionResult<UserProfile> {
        let user = self
            .inner
            .bounded("register", self.inner.identity.register(registration))
            .await?;
        tracing::info!(user_id = %user.id, role = %user.role, "account registered");
        Ok(user)
    }
}

impl core::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionClient")
            .field("status", &self.inner.state.current())
            .field("timeout", &self.inner.timeout)
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn bounded<T, F>(&self, op: &'static str, call: F) -> SessionResult<T>
    where
        F: Future<Output = SessionResult<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout = ?self.timeout, "identity service call timed out");
                Err(SessionError::network(format!(
                    "{op} timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }

    async fn exchange_credentials(&self, credentials: &Credentials) -> SessionResult<Session> {
        let tokens = self
            .bounded("token", self.identity.issue_token(credentials))
            .await?;
        let user = self
            .bounded("current user", self.identity.current_user(&tokens.access_token))
            .await?;
        Ok(Session::new(tokens, user))
    }

    fn commit_login(&self, session: Session) -> SessionResult<Session> {
        let transition = {
            let mut lifecycle = self.lifecycle();
            lifecycle.epoch += 1;
            lifecycle.in_flight = None;
            self.store.save(&session)?;
            self.state
                .replace(AuthStatus::authenticated(session.user.clone()))
        };
        transition.deliver();
        Ok(session)
    }

    async fn exchange_refresh(&self) -> SessionResult<Session> {
        let Some(current) = self.store.load()? else {
            return Err(SessionError::RefreshExpired);
        };
        let refreshed = self
            .bounded("refresh", self.identity.refresh_token(&current.refresh_token))
            .await?;
        Ok(current.with_refreshed(refreshed))
    }

    async fn run_refresh(self: Arc<Self>, epoch: u64, seq: u64) -> SessionResult<Session> {
        let result = self.exchange_refresh().await;

        let mut lifecycle = self.lifecycle();
        if lifecycle.in_flight.as_ref().is_some_and(|f| f.seq == seq) {
            lifecycle.in_flight = None;
        }

        if lifecycle.epoch != epoch {
            tracing::warn!(seq, "discarding refresh outcome: session changed while it was in flight");
            return Err(SessionError::RefreshCancelled);
        }

        match result {
            Ok(session) => {
                self.store.save(&session)?;
                let transition = self
                    .state
                    .replace(AuthStatus::authenticated(session.user.clone()));
                drop(lifecycle);
                transition.deliver();
                tracing::info!(seq, user_id = %session.user.id, "access token refreshed");
                Ok(session)
            }
            Err(SessionError::RefreshExpired) => {
                let (cleared, transition) = self.end_session(&mut lifecycle);
                drop(lifecycle);
                transition.deliver();
                if let Err(err) = cleared {
                    tracing::error!(error = %err, "failed to clear credentials after expired refresh");
                }
                tracing::warn!(seq, "refresh token rejected; session ended");
                Err(SessionError::RefreshExpired)
            }
            Err(err) => {
                tracing::warn!(seq, error = %err, "refresh failed; session kept");
                Err(err)
            }
        }
    }

    fn end_session(&self, lifecycle: &mut Lifecycle) -> (Result<(), StoreError>, Transition) {
        lifecycle.epoch += 1;
        lifecycle.in_flight = None;
        let cleared = self.store.clear();
        let transition = self.state.replace(AuthStatus::Absent);
        (cleared, transition)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use landreg_auth::Role;

    use super::*;
    use crate::fakes::{FakeIdentity, RefreshMode};
    use crate::store::{InMemoryKeyValueStore, KeyValueStore};

    struct Harness {
        identity: Arc<FakeIdentity>,
        backend: Arc<InMemoryKeyValueStore>,
        store: Arc<CredentialStore>,
        client: SessionClient,
    }

    fn harness() -> Harness {
        let identity = Arc::new(FakeIdentity::new());
        let backend = Arc::new(InMemoryKeyValueStore::new());
        let store = Arc::new(CredentialStore::new(backend.clone()));
        let client = SessionClient::restore(identity.clone(), store.clone())
            .with_timeout(Duration::from_millis(200));
        Harness {
            identity,
            backend,
            store,
            client,
        }
    }

    #[tokio::test]
    async fn login_persists_session_and_authenticates() {
        let h = harness();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        h.client
            .state()
            .subscribe(move |s| sink.lock().unwrap().push(s.clone()));

        let session = h.client.login("admin@x.com", "correct-horse").await.unwrap();

        assert_eq!(session.role(), Role::Admin);
        assert_eq!(h.client.status().role(), Some(Role::Admin));
        assert_eq!(h.store.load().unwrap(), Some(session.clone()));
        assert_eq!(h.backend.len(), 3);
        assert_eq!(h.identity.me_calls.load(Ordering::SeqCst), 1);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&AuthStatus::Authenticating));
        assert_eq!(seen.last().and_then(|s| s.role()), Some(Role::Admin));
    }

    #[tokio::test]
    async fn rejected_login_restores_previous_status() {
        let h = harness();
        let err = h.client.login("admin@x.com", "wrong").await.unwrap_err();

        assert_eq!(err, SessionError::InvalidCredentials);
        assert_eq!(h.client.status(), AuthStatus::Absent);
        assert!(h.backend.is_empty());
        assert_eq!(h.identity.issue_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_identity_service_surfaces_network_error() {
        let h = harness();
        h.identity.set_login_delay(Duration::from_secs(5));

        let err = h.client.login("admin@x.com", "correct-horse").await.unwrap_err();
        assert!(matches!(err, SessionError::Network(_)));
        assert_eq!(h.client.status(), AuthStatus::Absent);
    }

    #[tokio::test]
    async fn relogin_does_not_drop_signed_in_status() {
        let h = harness();
        h.client.login("officer@x.com", "correct-horse").await.unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        h.client
            .state()
            .subscribe(move |s| sink.lock().unwrap().push(s.clone()));

        let err = h.client.login("officer@x.com", "wrong").await.unwrap_err();
        assert_eq!(err, SessionError::InvalidCredentials);
        assert_eq!(h.client.status().role(), Some(Role::LandOfficer));
        assert!(seen.lock().unwrap().is_empty());

        h.client.login("admin@x.com", "correct-horse").await.unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].role(), Some(Role::Admin));
    }

    #[tokio::test]
    async fn logout_twice_is_harmless() {
        let h = harness();
        h.client.login("citizen@x.com", "correct-horse").await.unwrap();

        h.client.logout().unwrap();
        h.client.logout().unwrap();

        assert_eq!(h.client.status(), AuthStatus::Absent);
        assert!(h.backend.is_empty());
        assert_eq!(h.client.access_token(), None);
    }

    #[tokio::test]
    async fn refresh_keeps_refresh_token_unless_rotated() {
        let h = harness();
        let first = h.client.login("officer@x.com", "correct-horse").await.unwrap();

        let renewed = h.client.refresh().await.unwrap();
        assert_ne!(renewed.access_token, first.access_token);
        assert_eq!(renewed.refresh_token, first.refresh_token);

        h.identity.set_refresh_mode(RefreshMode::Rotate);
        let rotated = h.client.refresh().await.unwrap();
        assert_ne!(rotated.refresh_token, first.refresh_token);
        assert_eq!(h.store.load().unwrap(), Some(rotated));
    }

    #[tokio::test]
    async fn expired_refresh_ends_session() {
        let h = harness();
        h.client.login("officer@x.com", "correct-horse").await.unwrap();
        h.identity.set_refresh_mode(RefreshMode::Expired);

        let err = h.client.refresh().await.unwrap_err();
        assert_eq!(err, SessionError::RefreshExpired);
        assert_eq!(h.client.status(), AuthStatus::Absent);
        assert!(h.backend.is_empty());
    }

    #[tokio::test]
    async fn network_failure_during_refresh_keeps_session() {
        let h = harness();
        let session = h.client.login("officer@x.com", "correct-horse").await.unwrap();
        h.identity.set_refresh_mode(RefreshMode::NetworkDown);

        let err = h.client.refresh().await.unwrap_err();
        assert!(matches!(err, SessionError::Network(_)));
        assert!(h.client.is_authenticated());
        assert_eq!(h.store.load().unwrap(), Some(session));
    }

    #[tokio::test]
    async fn refresh_without_session_is_expired() {
        let h = harness();
        assert_eq!(h.client.refresh().await.unwrap_err(), SessionError::RefreshExpired);
        assert_eq!(h.identity.refreshes(), 0);
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_exchange() {
        let h = harness();
        h.client.login("admin@x.com", "correct-horse").await.unwrap();
        h.identity.set_refresh_delay(Duration::from_millis(30));

        let (a, b, c) = tokio::join!(h.client.refresh(), h.client.refresh(), h.client.refresh());

        assert_eq!(h.identity.refreshes(), 1);
        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(a, c.unwrap());
    }

    #[tokio::test]
    async fn logout_cancels_in_flight_refresh() {
        let h = harness();
        h.client.login("admin@x.com", "correct-horse").await.unwrap();
        h.identity.set_refresh_delay(Duration::from_millis(50));

        let refreshing = {
            let client = h.client.clone();
            tokio::spawn(async move { client.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        h.client.logout().unwrap();

        let outcome = refreshing.await.unwrap();
        assert_eq!(outcome.unwrap_err(), SessionError::RefreshCancelled);
        assert_eq!(h.client.status(), AuthStatus::Absent);
        assert!(h.backend.is_empty());
    }

    #[tokio::test]
    async fn register_does_not_sign_in() {
        let h = harness();
        let registration = Registration {
            username: "yaw".into(),
            email: "yaw@x.com".into(),
            password: "s3cret-pass".into(),
            first_name: "Yaw".into(),
            last_name: "Boateng".into(),
            national_id: "NID-100".into(),
            phone_number: None,
            role: Role::Citizen,
        };

        let user = h.client.register(&registration).await.unwrap();
        assert_eq!(user.display_name(), "Yaw Boateng");
        assert!(!h.client.is_authenticated());

        let dup = Registration {
            email: "admin@x.com".into(),
            ..registration
        };
        assert!(matches!(
            h.client.register(&dup).await,
            Err(SessionError::Api { status: 400, .. })
        ));
    }

    #[test]
    fn restore_picks_up_stored_session() {
        let identity = Arc::new(FakeIdentity::new());
        let backend = Arc::new(InMemoryKeyValueStore::new());
        let store = Arc::new(CredentialStore::new(backend.clone()));
        store
            .save(&Session::new(
                landreg_auth::TokenPair::new("a", "r"),
                UserProfile::new(landreg_core::UserId::new(4), "n@x.com", Role::Notary),
            ))
            .unwrap();

        let client = SessionClient::restore(identity, store);
        assert_eq!(client.status().role(), Some(Role::Notary));
        assert_eq!(client.access_token().as_deref(), Some("a"));
        assert!(backend.get("token").unwrap().is_some());
    }
}
