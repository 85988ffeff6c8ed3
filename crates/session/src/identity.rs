//! Identity service boundary (token issue, refresh, current user).

use std::sync::Arc;

use async_trait::async_trait;

use landreg_auth::{Credentials, RefreshedToken, Registration, TokenPair, UserProfile};
use landreg_core::SessionResult;

/// Remote service that issues and refreshes tokens.
///
/// Implementations map failures onto the session taxonomy:
/// - `issue_token`: rejection → `InvalidCredentials`
/// - `refresh_token`: rejection → `RefreshExpired`
/// - transport failure or timeout → `Network`
/// - anything else → `Api { status, body }` / `Decode`
///
/// Implementations never retry.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn issue_token(&self, credentials: &Credentials) -> SessionResult<TokenPair>;

    async fn refresh_token(&self, refresh_token: &str) -> SessionResult<RefreshedToken>;

    async fn current_user(&self, access_token: &str) -> SessionResult<UserProfile>;

    async fn register(&self, registration: &Registration) -> SessionResult<UserProfile>;
}

#[async_trait]
impl<S> IdentityService for Arc<S>
where
    S: IdentityService + ?Sized,
{
    async fn issue_token(&self, credentials: &Credentials) -> SessionResult<TokenPair> {
        (**self).issue_token(credentials).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> SessionResult<RefreshedToken> {
        (**self).refresh_token(refresh_token).await
    }

    async fn current_user(&self, access_token: &str) -> SessionResult<UserProfile> {
        (**self).current_user(access_token).await
    }

    async fn register(&self, registration: &Registration) -> SessionResult<UserProfile> {
        (**self).register(registration).await
    }
}
