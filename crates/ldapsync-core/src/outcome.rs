//! Result variants returned by every remote account operation
//!
//! Expected server answers ("already exists", "token expired", a rejected
//! request) are values, not errors, so callers branch on them explicitly.

use std::fmt;

/// Error details reported by the remote system for a rejected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRejection {
    pub status: u16,
    pub errcode: Option<String>,
    pub error: Option<String>,
}

impl fmt::Display for RemoteRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(errcode) = &self.errcode {
            write!(f, " {}", errcode)?;
        }
        if let Some(error) = &self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

/// Outcome of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteOutcome<T = ()> {
    Success(T),
    /// The account being registered already exists.
    AlreadyExists,
    /// The bearer token is no longer accepted.
    TokenExpired,
    /// The remote system answered with an error.
    Rejected(RemoteRejection),
    /// The call did not produce a usable answer (network failure, malformed body).
    Transient(String),
}

impl<T> RemoteOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_token_expired(&self) -> bool {
        matches!(self, Self::TokenExpired)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RemoteOutcome<U> {
        match self {
            Self::Success(value) => RemoteOutcome::Success(f(value)),
            Self::AlreadyExists => RemoteOutcome::AlreadyExists,
            Self::TokenExpired => RemoteOutcome::TokenExpired,
            Self::Rejected(rejection) => RemoteOutcome::Rejected(rejection),
            Self::Transient(message) => RemoteOutcome::Transient(message),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> RemoteOutcome<U>) -> RemoteOutcome<U> {
        match self {
            Self::Success(value) => f(value),
            Self::AlreadyExists => RemoteOutcome::AlreadyExists,
            Self::TokenExpired => RemoteOutcome::TokenExpired,
            Self::Rejected(rejection) => RemoteOutcome::Rejected(rejection),
            Self::Transient(message) => RemoteOutcome::Transient(message),
        }
    }

    /// Human-readable description of a non-success outcome.
    pub fn describe(&self) -> String {
        match self {
            Self::Success(_) => "success".to_string(),
            Self::AlreadyExists => "account already exists".to_string(),
            Self::TokenExpired => "access token has expired".to_string(),
            Self::Rejected(rejection) => rejection.to_string(),
            Self::Transient(message) => format!("transient failure: {}", message),
        }
    }
}
