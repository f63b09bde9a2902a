/// HTTP mapping for `AuthError`
///
/// The service reports transport-neutral kinds; this is the only place that
/// knows which status code each kind becomes.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;

use crate::error::{AuthError, ErrorKind};

/// Standardized error body returned to clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for correlating with server logs
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::DuplicateEmail => StatusCode::CONFLICT,
        ErrorKind::InvalidCredentials
        | ErrorKind::InvalidToken
        | ErrorKind::TokenNotFound
        | ErrorKind::UserUnavailable => StatusCode::UNAUTHORIZED,
        ErrorKind::InactiveAccount | ErrorKind::EmailNotVerified => StatusCode::FORBIDDEN,
        ErrorKind::VerificationNotFound
        | ErrorKind::VerificationExpired
        | ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        status_for(self.kind())
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        let status = self.status_code();

        match self {
            AuthError::Internal(detail) => {
                tracing::error!(error_id = %error_id, error = %detail, "Internal error");
            }
            _ => {
                tracing::warn!(
                    error_id = %error_id,
                    code = self.kind().code(),
                    error = %self,
                    "Request rejected"
                );
            }
        }

        HttpResponse::build(status).json(ErrorResponse::new(
            error_id,
            self.safe_message(),
            self.kind().code().to_string(),
            status.as_u16(),
        ))
    }
}
