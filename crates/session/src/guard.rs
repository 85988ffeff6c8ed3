//! Route guard bound to the live session state.

use std::sync::Arc;

use landreg_auth::{Destination, GuardDecision, Role, RouteTable, guard};

use crate::state::SessionState;

/// Evaluates view requirements against the current [`SessionState`].
#[derive(Debug, Clone)]
pub struct RouteGuard {
    state: Arc<SessionState>,
    routes: Arc<RouteTable>,
}

impl RouteGuard {
    pub fn new(state: Arc<SessionState>, routes: Arc<RouteTable>) -> Self {
        Self { state, routes }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decision for a view requiring one of `required` (empty = any signed-in user).
    pub fn evaluate(&self, required: &[Role]) -> GuardDecision {
        let status = self.state.current();
        let decision = guard::evaluate(&status, required);
        if !decision.is_allowed() {
            tracing::debug!(
                ?decision,
                reason = %guard::explain(&status, required),
                "route guard refused"
            );
        }
        decision
    }

    /// Where the guard sends the user instead, or `None` when allowed.
    pub fn redirect(&self, required: &[Role]) -> Option<String> {
        self.routes
            .redirect_for(self.evaluate(required))
            .map(str::to_string)
    }

    /// Resolve navigation to a portal path under the current status.
    pub fn route_to(&self, path: &str) -> Destination {
        self.routes.route_to(path, &self.state.current())
    }
}
