/// Authentication Routes
///
/// Thin adapters from JSON requests to `AuthService` operations. All auth
/// decisions are made by the service; errors render through `routes::errors`.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::Claims;
use crate::error::AuthError;
use crate::service::{AuthService, TokenPair};
use crate::user::User;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `/auth/refresh` and `/auth/logout`
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct ResendVerificationRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct VerifyEmailQuery {
    pub token: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Public view of an account; never includes the password hash.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_active: user.is_active,
            is_verified: user.is_verified,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct VerifyEmailResponse {
    pub success: bool,
    pub message: String,
}

/// POST /auth/register
///
/// # Errors
/// - 400: Validation errors (invalid email/password/name)
/// - 409: Email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    let user = service
        .register(&form.email, &form.password, &form.first_name, &form.last_name)
        .await?;

    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// POST /auth/login
///
/// # Errors
/// - 401: Invalid credentials (unknown email or wrong password, same message)
/// - 403: Account inactive, or email unverified when verified login is required
pub async fn login(
    form: web::Json<LoginRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    let session = service.authenticate(&form.email, &form.password).await?;
    Ok(HttpResponse::Ok().json(TokenResponse::from(session.tokens)))
}

/// POST /auth/refresh
///
/// The presented refresh token is revoked and a new pair returned.
///
/// # Errors
/// - 401: Invalid, revoked, reused or expired refresh token, or unavailable user
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    let tokens = service.refresh(&form.refresh_token).await?;
    Ok(HttpResponse::Ok().json(TokenResponse::from(tokens)))
}

/// POST /auth/logout
pub async fn logout(
    form: web::Json<RefreshRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    service.logout(&form.refresh_token).await?;
    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Successfully logged out".to_string(),
    }))
}

/// GET /auth/verify-email?token=...
pub async fn verify_email(
    query: web::Query<VerifyEmailQuery>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    let outcome = service.verify_email(&query.token).await?;
    let body = VerifyEmailResponse {
        success: outcome.is_verified(),
        message: outcome.message().to_string(),
    };

    if body.success {
        Ok(HttpResponse::Ok().json(body))
    } else {
        Ok(HttpResponse::BadRequest().json(body))
    }
}

/// POST /auth/resend-verification
///
/// Always 202 so the response does not reveal whether the email is registered.
pub async fn resend_verification(
    form: web::Json<ResendVerificationRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    service.resend_verification(&form.email).await?;
    Ok(HttpResponse::Accepted().json(MessageResponse {
        message: "If the account exists and is unverified, a new email has been sent".to_string(),
    }))
}

/// GET /users/me
///
/// Requires `Authorization: Bearer <access_token>`; claims are injected by
/// `JwtMiddleware`.
pub async fn me(
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    let user = service.user_for_claims(&claims).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// POST /users/me/logout-all
pub async fn logout_all(
    claims: web::ReqData<Claims>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    let revoked = service.logout_all(claims.user_id).await?;
    tracing::info!(user_id = %claims.user_id, revoked, "Revoked all sessions");

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: format!("Revoked {} session(s)", revoked),
    }))
}
