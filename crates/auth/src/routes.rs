//! Portal route table: which views exist and who may see them.

use std::borrow::Cow;

use serde::Serialize;

use crate::guard::{self, GuardDecision};
use crate::{AuthStatus, Role};

pub const LANDING_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const ADMIN_DASHBOARD_PATH: &str = "/admin/dashboard";

/// Who may reach a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "roles")]
pub enum Access {
    /// Anyone, signed in or not.
    Public,
    /// Only visitors without a session; signed-in users are sent to their home.
    GuestOnly,
    /// Signed-in users holding one of the roles (empty = any role).
    Protected(Vec<Role>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub path: Cow<'static, str>,
    pub access: Access,
}

impl Route {
    pub fn new(path: impl Into<Cow<'static, str>>, access: Access) -> Self {
        Self {
            path: path.into(),
            access,
        }
    }
}

/// Where navigation to a path ends up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "path")]
pub enum Destination {
    Render(String),
    Redirect(String),
    NotFound(String),
}

impl Destination {
    pub fn path(&self) -> &str {
        match self {
            Destination::Render(p) | Destination::Redirect(p) | Destination::NotFound(p) => p,
        }
    }
}

/// Landing view after sign-in for a role.
pub fn home_for(role: Role) -> &'static str {
    match role {
        Role::Admin => ADMIN_DASHBOARD_PATH,
        _ => DASHBOARD_PATH,
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
    login_path: String,
    unauthorized_path: String,
}

impl RouteTable {
    pub fn new(login_path: impl Into<String>, unauthorized_path: impl Into<String>) -> Self {
        Self {
            routes: Vec::new(),
            login_path: login_path.into(),
            unauthorized_path: unauthorized_path.into(),
        }
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn with_routes(mut self, routes: impl IntoIterator<Item = Route>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// The land-registry portal's views.
    pub fn portal() -> Self {
        let any = || Access::Protected(Vec::new());
        let admin = || Access::Protected(vec![Role::Admin]);

        Self::new(LOGIN_PATH, UNAUTHORIZED_PATH)
            .with_route(Route::new(LANDING_PATH, Access::GuestOnly))
            .with_route(Route::new(LOGIN_PATH, Access::GuestOnly))
            .with_route(Route::new("/register", Access::GuestOnly))
            .with_route(Route::new("/verify", Access::Public))
            .with_route(Route::new(UNAUTHORIZED_PATH, Access::Public))
            .with_route(Route::new(DASHBOARD_PATH, any()))
            .with_route(Route::new("/profile", any()))
            .with_route(Route::new("/land-parcels", any()))
            .with_route(Route::new("/transactions", any()))
            .with_route(Route::new("/documents", any()))
            .with_route(Route::new(ADMIN_DASHBOARD_PATH, admin()))
            .with_route(Route::new("/admin/users", admin()))
            .with_route(Route::new("/admin/settings", admin()))
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn unauthorized_path(&self) -> &str {
        &self.unauthorized_path
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Exact-match lookup; a trailing slash (other than on "/") is ignored.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        let path = normalize(path);
        self.routes.iter().find(|r| r.path == path)
    }

    /// Map a guard decision to a concrete path.
    pub fn redirect_for(&self, decision: GuardDecision) -> Option<&str> {
        match decision {
            GuardDecision::Allow => None,
            GuardDecision::RedirectToLogin => Some(&self.login_path),
            GuardDecision::RedirectToUnauthorized => Some(&self.unauthorized_path),
        }
    }

    /// Resolve navigation to `path` under the given status.
    pub fn route_to(&self, path: &str, status: &AuthStatus) -> Destination {
        let Some(route) = self.resolve(path) else {
            return Destination::NotFound(normalize(path).to_string());
        };

        match &route.access {
            Access::Public => Destination::Render(route.path.to_string()),
            Access::GuestOnly => match status.role() {
                Some(role) => Destination::Redirect(home_for(role).to_string()),
                None => Destination::Render(route.path.to_string()),
            },
            Access::Protected(required) => {
                let decision = guard::evaluate(status, required);
                match self.redirect_for(decision) {
                    None => Destination::Render(route.path.to_string()),
                    Some(target) => Destination::Redirect(target.to_string()),
                }
            }
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::portal()
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}
