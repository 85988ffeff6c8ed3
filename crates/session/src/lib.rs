//! `landreg-session`
//!
//! **Responsibility:** the client-side session layer of the land-registry
//! portal.
//!
//! This crate provides:
//! - Credential persistence (`CredentialStore` over a key-value backend)
//! - Login / refresh / logout against the identity service (`SessionClient`)
//! - Authenticated API calls with refresh-on-401 (`RequestDispatcher`)
//! - The observable authentication status (`SessionState`)
//! - Route guarding and navigation (`RouteGuard`, `Navigator`)

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod guard;
pub mod http;
pub mod identity;
pub mod navigator;
pub mod state;
pub mod store;
pub mod transport;

#[cfg(test)]
mod fakes;

pub use client::SessionClient;
pub use config::{ClientConfig, ConfigError};
pub use dispatcher::{Attempt, PendingRequest, RequestDispatcher};
pub use guard::RouteGuard;
pub use http::{HttpIdentityService, HttpTransport};
pub use identity::IdentityService;
pub use navigator::{NavigationCause, NavigationEvent, Navigator};
pub use state::{ListenerId, SessionState};
pub use store::{CredentialStore, FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};
pub use transport::{ApiRequest, ApiResponse, ApiTransport, Method};
