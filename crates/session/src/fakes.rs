//! In-memory identity service and API used by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use landreg_auth::{Credentials, RefreshedToken, Registration, Role, TokenPair, UserProfile};
use landreg_core::{SessionError, SessionResult, UserId};

use crate::identity::IdentityService;
use crate::transport::{ApiRequest, ApiResponse, ApiTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// New access token, refresh token unchanged.
    Renew,
    /// New access and refresh tokens.
    Rotate,
    Expired,
    NetworkDown,
}

pub struct FakeIdentity {
    accounts: HashMap<String, (String, UserProfile)>,
    refresh_mode: Mutex<RefreshMode>,
    refresh_delay: Mutex<Duration>,
    login_delay: Mutex<Duration>,
    issued: AtomicUsize,
    pub issue_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub me_calls: AtomicUsize,
    /// Access tokens the fake API currently accepts, with their owners.
    live: Mutex<Vec<(String, UserProfile)>>,
    refresh_tokens: Mutex<Vec<(String, UserProfile)>>,
}

impl FakeIdentity {
    pub fn new() -> Self {
        let mut accounts = HashMap::new();
        for (id, email, role) in [
            (1, "admin@x.com", Role::Admin),
            (2, "officer@x.com", Role::LandOfficer),
            (3, "citizen@x.com", Role::Citizen),
        ] {
            let user = UserProfile::new(UserId::new(id), email, role);
            accounts.insert(email.to_string(), ("correct-horse".to_string(), user));
        }

        Self {
            accounts,
            refresh_mode: Mutex::new(RefreshMode::Renew),
            refresh_delay: Mutex::new(Duration::ZERO),
            login_delay: Mutex::new(Duration::ZERO),
            issued: AtomicUsize::new(0),
            issue_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            me_calls: AtomicUsize::new(0),
            live: Mutex::new(Vec::new()),
            refresh_tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock().unwrap() = mode;
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    pub fn set_login_delay(&self, delay: Duration) {
        *self.login_delay.lock().unwrap() = delay;
    }

    /// Expire every issued access token without touching refresh tokens.
    pub fn expire_access(&self) {
        self.live.lock().unwrap().clear();
    }

    pub fn accepts(&self, access: &str) -> bool {
        self.owner(access).is_some()
    }

    fn owner(&self, access: &str) -> Option<UserProfile> {
        self.live
            .lock()
            .unwrap()
            .iter()
            .find(|(t, _)| t == access)
            .map(|(_, u)| u.clone())
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn mint(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl IdentityService for FakeIdentity {
    async fn issue_token(&self, credentials: &Credentials) -> SessionResult<TokenPair> {
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.login_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let Some((secret, user)) = self.accounts.get(&credentials.identifier) else {
            return Err(SessionError::InvalidCredentials);
        };
        if *secret != credentials.secret {
            return Err(SessionError::InvalidCredentials);
        }

        let pair = TokenPair::new(self.mint("access"), self.mint("refresh"));
        self.live
            .lock()
            .unwrap()
            .push((pair.access_token.clone(), user.clone()));
        self.refresh_tokens
            .lock()
            .unwrap()
            .push((pair.refresh_token.clone(), user.clone()));
        Ok(pair)
    }

    async fn refresh_token(&self, refresh_token: &str) -> SessionResult<RefreshedToken> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.refresh_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mode = *self.refresh_mode.lock().unwrap();
        match mode {
            RefreshMode::Expired => return Err(SessionError::RefreshExpired),
            RefreshMode::NetworkDown => return Err(SessionError::network("connection refused")),
            RefreshMode::Renew | RefreshMode::Rotate => {}
        }

        let user = self
            .refresh_tokens
            .lock()
            .unwrap()
            .iter()
            .find(|(t, _)| t == refresh_token)
            .map(|(_, u)| u.clone())
            .ok_or(SessionError::RefreshExpired)?;

        let access = self.mint("access");
        self.live.lock().unwrap().push((access.clone(), user.clone()));

        if mode == RefreshMode::Rotate {
            let rotated = self.mint("refresh");
            let mut tokens = self.refresh_tokens.lock().unwrap();
            tokens.retain(|(t, _)| t != refresh_token);
            tokens.push((rotated.clone(), user));
            Ok(RefreshedToken::rotated(access, rotated))
        } else {
            Ok(RefreshedToken::new(access))
        }
    }

    async fn current_user(&self, access_token: &str) -> SessionResult<UserProfile> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);
        self.owner(access_token)
            .ok_or_else(|| SessionError::api(401, "token not valid"))
    }

    async fn register(&self, registration: &Registration) -> SessionResult<UserProfile> {
        if self.accounts.contains_key(&registration.email) {
            return Err(SessionError::api(400, r#"{"email":["already registered"]}"#));
        }
        Ok(
            UserProfile::new(UserId::new(100), registration.email.clone(), registration.role)
                .with_name(registration.first_name.clone(), registration.last_name.clone()),
        )
    }
}

/// API that accepts any access token the identity service has live.
///
/// - `/public` answers 200 without auth
/// - `/broken` answers 500
/// - `/locked` always answers 401
pub struct FakeApi {
    identity: std::sync::Arc<FakeIdentity>,
    pub calls: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeApi {
    pub fn new(identity: std::sync::Arc<FakeIdentity>) -> Self {
        Self {
            identity,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .count()
    }

    pub fn bearers(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
    }
}

#[async_trait]
impl ApiTransport for FakeApi {
    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> SessionResult<ApiResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((request.path.clone(), bearer.map(str::to_string)));

        let response = match request.path.as_str() {
            "/public" => ApiResponse::new(200, r#"{"public":true}"#),
            "/broken" => ApiResponse::new(500, "internal error"),
            "/locked" => ApiResponse::new(401, "locked"),
            path => match bearer {
                Some(token) if self.identity.accepts(token) => {
                    ApiResponse::new(200, format!(r#"{{"path":"{path}"}}"#))
                }
                _ => ApiResponse::new(401, "unauthorized"),
            },
        };
        Ok(response)
    }
}
