//! `landreg-core`: identifiers and the error taxonomy shared by the
//! session layer.
//!
//! This crate is pure (no IO, no async).

pub mod error;
pub mod id;

pub use error::{InvalidId, SessionError, SessionResult, StoreError, UserNotice};
pub use id::{RequestId, UserId};
