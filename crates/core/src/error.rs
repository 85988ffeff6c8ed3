//! Error taxonomy for the session layer.

use thiserror::Error;

/// Result type used by the session client and dispatcher.
pub type SessionResult<T> = Result<T, SessionError>;

/// Failure surfaced by the session client or the request dispatcher.
///
/// The first four variants are the user-facing taxonomy; the rest carry
/// failures the session layer does not interpret (they pass through unchanged).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The identity service rejected the login credentials.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The refresh token itself is invalid or expired; the session is over.
    #[error("refresh token expired")]
    RefreshExpired,

    /// Transport failure or timeout. Transient: the session is left intact.
    #[error("network error: {0}")]
    Network(String),

    /// The dispatcher could not recover a request through refresh.
    #[error("session expired")]
    SessionExpired,

    /// The session was closed (or replaced) while a refresh was in flight.
    #[error("session closed while refresh was in flight")]
    RefreshCancelled,

    /// Non-authorization HTTP failure, passed through as received.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The identity service or API answered with a body we could not decode.
    #[error("decode error: {0}")]
    Decode(String),

    /// The credential store failed.
    #[error("credential store error: {0}")]
    Storage(#[from] StoreError),
}

impl SessionError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    /// True when the failure means the user has to sign in again.
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            Self::RefreshExpired | Self::SessionExpired | Self::RefreshCancelled
        )
    }

    /// How the UI should present this failure.
    pub fn user_notice(&self) -> UserNotice {
        match self {
            Self::InvalidCredentials => UserNotice::InlineFormError,
            Self::Network(_) => UserNotice::TransientNotice,
            Self::RefreshExpired | Self::SessionExpired | Self::RefreshCancelled => {
                UserNotice::SignInAgain
            }
            Self::Api { .. } | Self::Decode(_) | Self::Storage(_) => UserNotice::None,
        }
    }
}

/// User-visible treatment of a [`SessionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserNotice {
    /// Shown next to the login form; user-correctable.
    InlineFormError,
    /// Short-lived notice; state unchanged.
    TransientNotice,
    /// Forced navigation to login with a "please sign in again" notice.
    SignInAgain,
    /// Left to the calling view.
    None,
}

/// Failure of the backing key-value store.
///
/// "Not found" is never an error; it is signalled with `None`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("corrupt credential record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

/// An identifier failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid identifier: {0}")]
pub struct InvalidId(String);

impl InvalidId {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
