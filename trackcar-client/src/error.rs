//! Service error types.
//!
//! Backend failures never reach callers verbatim: they are logged with full
//! detail and replaced by a short message naming the operation that failed.

use std::fmt;
use thiserror::Error;
use tracing::error;
use trackcar_store::{StoreError, StoreResult};

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("you must be signed in")]
    Unauthenticated,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("a vehicle with plate {0} is already registered")]
    DuplicatePlate(String),

    #[error("{0}")]
    Upstream(String),

    #[error(transparent)]
    Auth(#[from] AuthFailure),
}

impl ServiceError {
    /// Logs `err` and reduces it to `context`.
    pub fn upstream(context: &str, err: impl fmt::Display) -> Self {
        error!(error = %err, "{context}");
        Self::Upstream(context.to_string())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Reduces store errors at the service boundary.
pub(crate) trait StoreResultExt<T> {
    fn or_upstream(self, context: &str) -> ServiceResult<T>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn or_upstream(self, context: &str) -> ServiceResult<T> {
        self.map_err(|err| ServiceError::upstream(context, err))
    }
}

/// How a failed live listener is treated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenFailure {
    /// Permission denied after sign-out: the server had not yet dropped the
    /// listener. Expected.
    BenignRace,
    Fault,
}

impl ListenFailure {
    pub fn classify(err: &StoreError, principal_present: bool) -> Self {
        if err.is_permission_denied() && !principal_present {
            Self::BenignRace
        } else {
            Self::Fault
        }
    }
}

/// Auth provider failures, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("no account found for this e-mail")]
    UserNotFound,

    #[error("incorrect password")]
    WrongPassword,

    #[error("invalid e-mail or password")]
    InvalidCredentials,

    #[error("invalid e-mail address")]
    InvalidEmail,

    #[error("this account has been disabled")]
    UserDisabled,

    #[error("too many attempts, try again later")]
    TooManyRequests,

    #[error("this e-mail is already in use")]
    EmailInUse,

    #[error("password is too weak")]
    WeakPassword,

    #[error("sign in again to continue")]
    RequiresRecentLogin,

    #[error("network error, check your connection")]
    Network,

    #[error("unknown error")]
    Unknown,
}

impl AuthFailure {
    /// Maps a provider error code. Accepts both the REST form
    /// (`EMAIL_NOT_FOUND`, optionally followed by ` : detail`) and the SDK
    /// form (`auth/user-not-found`).
    pub fn from_code(code: &str) -> Self {
        let code = code.split(':').next().unwrap_or_default().trim();
        match code {
            "EMAIL_NOT_FOUND" | "auth/user-not-found" => Self::UserNotFound,
            "INVALID_PASSWORD" | "auth/wrong-password" => Self::WrongPassword,
            "INVALID_LOGIN_CREDENTIALS" | "auth/invalid-credential" => Self::InvalidCredentials,
            "INVALID_EMAIL" | "MISSING_EMAIL" | "auth/invalid-email" => Self::InvalidEmail,
            "USER_DISABLED" | "auth/user-disabled" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" | "auth/too-many-requests" => Self::TooManyRequests,
            "EMAIL_EXISTS" | "auth/email-already-in-use" => Self::EmailInUse,
            "WEAK_PASSWORD" | "auth/weak-password" => Self::WeakPassword,
            "CREDENTIAL_TOO_OLD_LOGIN_AGAIN"
            | "TOKEN_EXPIRED"
            | "INVALID_ID_TOKEN"
            | "USER_NOT_FOUND"
            | "auth/requires-recent-login" => Self::RequiresRecentLogin,
            "auth/network-request-failed" => Self::Network,
            _ => Self::Unknown,
        }
    }
}
