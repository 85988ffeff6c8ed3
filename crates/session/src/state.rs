//! Process-wide observable authentication status.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use landreg_auth::AuthStatus;

use crate::store::CredentialStore;

/// Handle returned by [`SessionState::subscribe`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&AuthStatus) + Send + Sync>;

/// The single observable [`AuthStatus`] for the running client.
///
/// Only the session client changes it (login, refresh, logout). Listeners are
/// called synchronously, in subscription order, before the triggering call
/// returns. A listener may read [`SessionState::current`] or subscribe and
/// unsubscribe; no lock is held while it runs.
pub struct SessionState {
    current: RwLock<AuthStatus>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
}

impl SessionState {
    pub fn new(initial: AuthStatus) -> Self {
        Self {
            current: RwLock::new(initial),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Initial status from the credential store.
    ///
    /// Optimistic: a stored record yields `Authenticated` without asking the
    /// server; a stale access token is caught by the dispatcher's first 401.
    /// A corrupt record is cleared and treated as absent.
    pub fn restore(store: &CredentialStore) -> Self {
        let initial = match store.load() {
            Ok(Some(session)) => {
                tracing::info!(user_id = %session.user.id, role = %session.role(), "restored stored session");
                AuthStatus::authenticated(session.user)
            }
            Ok(None) => AuthStatus::Absent,
            Err(err) => {
                tracing::warn!(error = %err, "discarding unreadable credential record");
                if let Err(err) = store.clear() {
                    tracing::error!(error = %err, "failed to clear unreadable credential record");
                }
                AuthStatus::Absent
            }
        };
        Self::new(initial)
    }

    pub fn current(&self) -> AuthStatus {
        match self.current.read() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_authenticated()
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&AuthStatus) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push((id, Arc::new(listener)));
        }
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        match self.listeners.lock() {
            Ok(mut listeners) => {
                let before = listeners.len();
                listeners.retain(|(lid, _)| *lid != id);
                listeners.len() != before
            }
            Err(_) => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or_default()
    }

    /// Replace the status and notify listeners.
    pub(crate) fn set(&self, status: AuthStatus) {
        self.replace(status).deliver();
    }

    /// Replace the status; listeners are notified when the returned
    /// [`Transition`] is delivered.
    ///
    /// Lets the client swap the value while holding its own commit lock and
    /// notify after releasing it.
    pub(crate) fn replace(&self, status: AuthStatus) -> Transition {
        match self.current.write() {
            Ok(mut current) => *current = status.clone(),
            Err(poisoned) => *poisoned.into_inner() = status.clone(),
        }

        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .map(|l| l.iter().map(|(_, f)| f.clone()).collect())
            .unwrap_or_default();

        Transition { status, listeners }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(AuthStatus::Absent)
    }
}

impl core::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionState")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}

/// A status change whose listeners have not been notified yet.
#[must_use = "listeners are only notified once the transition is delivered"]
pub(crate) struct Transition {
    status: AuthStatus,
    listeners: Vec<Listener>,
}

impl Transition {
    pub(crate) fn deliver(self) {
        for listener in &self.listeners {
            listener(&self.status);
        }
    }
}
