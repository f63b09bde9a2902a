/// Error Handling Module
///
/// Unified error types for the authentication core:
/// 1. `AuthError` - the single error type returned by `AuthService`
/// 2. `ErrorKind` - stable, transport-neutral classification with string codes
/// 3. Collaborator errors (`EmailError`, `ConfigError`) kept separate so that
///    failures in optional side effects never leak into auth results
///
/// Nothing in this module knows about HTTP. The transport boundary maps
/// `ErrorKind` to its own status vocabulary (see `routes::errors`).

use thiserror::Error;

use crate::store::StoreError;
use crate::validators::ValidationError;

/// ============================================================================
/// 1. AUTH SERVICE ERROR
/// ============================================================================

/// Every failure an `AuthService` operation can report.
///
/// `Display` output is safe to show to callers; internal detail carried by
/// `Internal` is only ever logged.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Inactive user")]
    InactiveAccount,
    #[error("Email address has not been verified")]
    EmailNotVerified,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Refresh token not found or expired")]
    TokenNotFound,
    #[error("User not found or inactive")]
    UserUnavailable,
    #[error("Invalid verification token")]
    VerificationNotFound,
    #[error("Verification token expired")]
    VerificationExpired,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Internal server error")]
    Internal(String),
}

/// Transport-neutral error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DuplicateEmail,
    InvalidCredentials,
    InactiveAccount,
    EmailNotVerified,
    InvalidToken,
    TokenNotFound,
    UserUnavailable,
    VerificationNotFound,
    VerificationExpired,
    Validation,
    Internal,
}

impl ErrorKind {
    /// Stable code for clients; never changes once published.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::DuplicateEmail => "DUPLICATE_EMAIL",
            ErrorKind::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorKind::InactiveAccount => "ACCOUNT_INACTIVE",
            ErrorKind::EmailNotVerified => "EMAIL_NOT_VERIFIED",
            ErrorKind::InvalidToken => "TOKEN_INVALID",
            ErrorKind::TokenNotFound => "TOKEN_NOT_FOUND",
            ErrorKind::UserUnavailable => "USER_UNAVAILABLE",
            ErrorKind::VerificationNotFound => "VERIFICATION_NOT_FOUND",
            ErrorKind::VerificationExpired => "VERIFICATION_EXPIRED",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::DuplicateEmail => ErrorKind::DuplicateEmail,
            AuthError::InvalidCredentials => ErrorKind::InvalidCredentials,
            AuthError::InactiveAccount => ErrorKind::InactiveAccount,
            AuthError::EmailNotVerified => ErrorKind::EmailNotVerified,
            AuthError::InvalidToken => ErrorKind::InvalidToken,
            AuthError::TokenNotFound => ErrorKind::TokenNotFound,
            AuthError::UserUnavailable => ErrorKind::UserUnavailable,
            AuthError::VerificationNotFound => ErrorKind::VerificationNotFound,
            AuthError::VerificationExpired => ErrorKind::VerificationExpired,
            AuthError::Validation(_) => ErrorKind::Validation,
            AuthError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message that may cross the service boundary.
    pub fn safe_message(&self) -> String {
        self.to_string()
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        AuthError::Internal(detail.into())
    }
}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Persistence error");
        AuthError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!(error = %err, "Blocking task failed");
        AuthError::Internal(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!(error = %err, "Password hashing failed");
        AuthError::Internal(err.to_string())
    }
}

/// ============================================================================
/// 2. COLLABORATOR ERRORS
/// ============================================================================

/// Email delivery errors. Always non-fatal for auth operations.
#[derive(Debug, Clone, Error)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
    #[error("Email service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<reqwest::Error> for EmailError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            EmailError::ServiceUnavailable(err.to_string())
        } else {
            EmailError::SendFailed(err.to_string())
        }
    }
}

/// Configuration errors raised while building components from `Settings`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Config load error: {0}")]
    Load(#[from] config::ConfigError),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}
