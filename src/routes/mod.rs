mod auth;
mod errors;
mod health_check;

pub use auth::{
    login, logout, logout_all, me, refresh, register, resend_verification, verify_email,
    MessageResponse, TokenResponse, UserResponse, VerifyEmailResponse,
};
pub use errors::{status_for, ErrorResponse};
pub use health_check::health_check;
