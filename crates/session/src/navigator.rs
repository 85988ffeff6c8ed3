//! Portal navigation driven by the route table and the session state.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;

use landreg_auth::routes::LANDING_PATH;
use landreg_auth::{AuthStatus, Destination, RouteTable};

use crate::state::{ListenerId, SessionState};

/// Guards against redirect cycles in a misconfigured table.
const MAX_REDIRECTS: usize = 4;

/// Navigation events kept; older ones are dropped.
pub const HISTORY_LIMIT: usize = 64;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationCause {
    /// `navigate` was called.
    Requested,
    /// The session changed under the current view.
    SessionChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationEvent {
    pub requested: String,
    /// Where the user ended up after following redirects.
    pub destination: Destination,
    pub cause: NavigationCause,
}

#[derive(Debug)]
struct Location {
    destination: Destination,
    history: VecDeque<NavigationEvent>,
}

impl Location {
    fn record(&mut self, event: NavigationEvent) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(event);
    }
}

#[derive(Debug)]
struct Shared {
    routes: Arc<RouteTable>,
    location: Mutex<Location>,
}

impl Shared {
    fn location(&self) -> MutexGuard<'_, Location> {
        self.location.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_session_changed(&self, status: &AuthStatus) {
        let mut location = self.location();
        let here = location.destination.path().to_string();
        let destination = settle(&self.routes, &here, status);
        if destination == location.destination {
            return;
        }

        tracing::info!(from = %here, to = %destination.path(), "session change moved the current view");
        location.destination = destination.clone();
        location.record(NavigationEvent {
            requested: here,
            destination,
            cause: NavigationCause::SessionChanged,
        });
    }
}

/// Follow redirects from `path` to the view that is finally shown.
fn settle(routes: &RouteTable, path: &str, status: &AuthStatus) -> Destination {
    let mut destination = routes.route_to(path, status);
    for _ in 0..MAX_REDIRECTS {
        match &destination {
            Destination::Redirect(next) => destination = routes.route_to(next, status),
            _ => return destination,
        }
    }
    tracing::warn!(path, "redirect limit reached");
    destination
}

/// Tracks the current view and keeps it consistent with the session.
///
/// Every [`Navigator::navigate`] runs the route guard; every session change
/// re-runs it for the current view, so a background logout leaves a
/// protected view immediately.
#[derive(Debug)]
pub struct Navigator {
    shared: Arc<Shared>,
    state: Arc<SessionState>,
    listener: ListenerId,
}

impl Navigator {
    /// Starts at the landing page.
    pub fn new(state: Arc<SessionState>, routes: Arc<RouteTable>) -> Self {
        let initial = settle(&routes, LANDING_PATH, &state.current());
        let shared = Arc::new(Shared {
            routes,
            location: Mutex::new(Location {
                destination: initial,
                history: VecDeque::new(),
            }),
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let listener = state.subscribe(move |status| {
            if let Some(shared) = weak.upgrade() {
                shared.on_session_changed(status);
            }
        });

        Self {
            shared,
            state,
            listener,
        }
    }

    pub fn navigate(&self, path: &str) -> Destination {
        let destination = settle(&self.shared.routes, path, &self.state.current());
        tracing::debug!(path, to = %destination.path(), "navigate");

        let mut location = self.shared.location();
        location.destination = destination.clone();
        location.record(NavigationEvent {
            requested: path.to_string(),
            destination: destination.clone(),
            cause: NavigationCause::Requested,
        });
        destination
    }

    /// Path of the view currently shown.
    pub fn location(&self) -> String {
        self.shared.location().destination.path().to_string()
    }

    pub fn current(&self) -> Destination {
        self.shared.location().destination.clone()
    }

    /// Most recent events, oldest first (at most [`HISTORY_LIMIT`]).
    pub fn history(&self) -> Vec<NavigationEvent> {
        self.shared.location().history.iter().cloned().collect()
    }
}

impl Drop for Navigator {
    fn drop(&mut self) {
        self.state.unsubscribe(self.listener);
    }
}
