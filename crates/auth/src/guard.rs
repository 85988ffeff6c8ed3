//! Route guard decision (pure policy check).

use serde::Serialize;

use crate::{AuthStatus, Role};

/// Outcome of evaluating a view's role requirement against the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardDecision {
    Allow,
    RedirectToLogin,
    RedirectToUnauthorized,
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }
}

/// Decide whether a view requiring `required` roles is reachable.
///
/// An empty `required` means "any authenticated user". An absent or
/// in-progress session always goes to login, never to the unauthorized view.
///
/// - No IO
/// - No panics
pub fn evaluate(status: &AuthStatus, required: &[Role]) -> GuardDecision {
    let Some(role) = status.role() else {
        return GuardDecision::RedirectToLogin;
    };

    if required.is_empty() || required.contains(&role) {
        GuardDecision::Allow
    } else {
        GuardDecision::RedirectToUnauthorized
    }
}

/// Human-readable reason for a decision (logs and the unauthorized view).
pub fn explain(status: &AuthStatus, required: &[Role]) -> String {
    match (evaluate(status, required), status.role()) {
        (GuardDecision::RedirectToLogin, _) => "not signed in".to_string(),
        (GuardDecision::Allow, Some(role)) if required.is_empty() => {
            format!("signed in as {role}; view open to any signed-in user")
        }
        (GuardDecision::Allow, Some(role)) => format!("role {role} is permitted"),
        (GuardDecision::RedirectToUnauthorized, Some(role)) => {
            let wanted: Vec<&str> = required.iter().map(Role::as_str).collect();
            format!("role {role} is not one of [{}]", wanted.join(", "))
        }
        (_, None) => "not signed in".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use landreg_core::UserId;
    use proptest::prelude::*;

    use super::*;
    use crate::UserProfile;

    fn signed_in(role: Role) -> AuthStatus {
        AuthStatus::authenticated(UserProfile::new(UserId::new(1), "u@x.com", role))
    }

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    #[test]
    fn absent_redirects_to_login() {
        assert_eq!(evaluate(&AuthStatus::Absent, &[]), GuardDecision::RedirectToLogin);
        assert_eq!(
            evaluate(&AuthStatus::Absent, &[Role::Admin]),
            GuardDecision::RedirectToLogin
        );
    }

    #[test]
    fn authenticating_is_treated_as_absent() {
        assert_eq!(
            evaluate(&AuthStatus::Authenticating, &[Role::Citizen]),
            GuardDecision::RedirectToLogin
        );
    }

    #[test]
    fn empty_requirement_allows_any_signed_in_user() {
        for role in Role::ALL {
            assert_eq!(evaluate(&signed_in(role), &[]), GuardDecision::Allow);
        }
    }

    #[test]
    fn admin_scenario() {
        let admin = signed_in(Role::Admin);
        assert_eq!(evaluate(&admin, &[Role::Admin]), GuardDecision::Allow);
        assert_eq!(
            evaluate(&admin, &[Role::LandOfficer]),
            GuardDecision::RedirectToUnauthorized
        );
    }

    #[test]
    fn explanation_names_the_missing_roles() {
        let msg = explain(&signed_in(Role::Citizen), &[Role::Admin, Role::LandOfficer]);
        assert_eq!(msg, "role CITIZEN is not one of [ADMIN, LAND_OFFICER]");
        assert_eq!(explain(&AuthStatus::Absent, &[Role::Admin]), "not signed in");
    }

    proptest! {
        /// Property: without a session, every requirement redirects to login.
        #[test]
        fn absent_never_reaches_unauthorized_view(
            required in prop::collection::vec(any_role(), 0..4)
        ) {
            prop_assert_eq!(evaluate(&AuthStatus::Absent, &required), GuardDecision::RedirectToLogin);
        }

        /// Property: a signed-in user is allowed iff the requirement is empty or names their role.
        #[test]
        fn signed_in_decision_matches_membership(
            role in any_role(),
            required in prop::collection::vec(any_role(), 0..4)
        ) {
            let decision = evaluate(&signed_in(role), &required);
            let expected = if required.is_empty() || required.contains(&role) {
                GuardDecision::Allow
            } else {
                GuardDecision::RedirectToUnauthorized
            };
            prop_assert_eq!(decision, expected);
        }
    }
}
