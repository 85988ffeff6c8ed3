//! `landreg-auth`: pure authentication/authorization model for the portal.
//!
//! This crate is intentionally decoupled from HTTP and storage: it defines
//! what a session is and which views a session may reach.

pub mod guard;
pub mod roles;
pub mod routes;
pub mod session;
pub mod user;

pub use guard::{GuardDecision, evaluate};
pub use roles::{Role, UnknownRole};
pub use routes::{Access, Destination, Route, RouteTable, home_for};
pub use session::{AuthStatus, Credentials, RefreshedToken, Session, TokenPair};
pub use user::{Registration, UserProfile};
