/// Auth Service
///
/// Orchestrates registration, login, refresh-token rotation, logout and
/// email verification on top of the credential hasher, the token codec, the
/// two token stores and the user directory.
///
/// Refresh token lifecycle: issued -> valid -> (rotated out | revoked by
/// logout | expired). A token never returns to `valid`.
use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::auth::{
    Claims, CredentialHasher, RefreshTokens, TokenCodec, TokenSubject, VerificationTokens,
};
use crate::configuration::{Settings, VerificationSettings};
use crate::error::{AuthError, ConfigError, EmailError};
use crate::notifier::Notifier;
use crate::store::{Redemption, Repositories, StoreError, UserRepository};
use crate::user::{NewUser, User};
use crate::validators::{is_valid_email, is_valid_name, is_valid_password};

/// Thirty days.
pub const MAX_VERIFICATION_TOKEN_HOURS: i64 = 30 * 24;

/// Login and verification policy.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    require_verified_login: bool,
    verification_token_ttl_hours: i64,
}

impl AuthPolicy {
    /// # Errors
    /// Returns `ConfigError` unless `verification_token_ttl_hours` is between
    /// 1 and `MAX_VERIFICATION_TOKEN_HOURS`.
    pub fn new(
        require_verified_login: bool,
        verification_token_ttl_hours: i64,
    ) -> Result<Self, ConfigError> {
        if !(1..=MAX_VERIFICATION_TOKEN_HOURS).contains(&verification_token_ttl_hours) {
            return Err(ConfigError::invalid(
                "verification.token_expire_hours",
                format!("must be between 1 and {}", MAX_VERIFICATION_TOKEN_HOURS),
            ));
        }

        Ok(Self {
            require_verified_login,
            verification_token_ttl_hours,
        })
    }

    /// Reject active but unverified accounts at login.
    pub fn require_verified_login(&self) -> bool {
        self.require_verified_login
    }

    pub fn verification_token_ttl_hours(&self) -> i64 {
        self.verification_token_ttl_hours
    }
}

impl TryFrom<&VerificationSettings> for AuthPolicy {
    type Error = ConfigError;

    fn try_from(settings: &VerificationSettings) -> Result<Self, Self::Error> {
        Self::new(settings.require_verified_login, settings.token_expire_hours)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub tokens: TokenPair,
}

/// Result of presenting an email verification token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailVerification {
    Verified(User),
    NotFound,
    Expired,
    UserMissing,
}

impl EmailVerification {
    pub fn is_verified(&self) -> bool {
        matches!(self, EmailVerification::Verified(_))
    }

    pub fn message(&self) -> &'static str {
        match self {
            EmailVerification::Verified(_) => "Email verified successfully",
            EmailVerification::NotFound => "Invalid token",
            EmailVerification::Expired => "Token expired",
            EmailVerification::UserMissing => "User not found",
        }
    }

    pub fn into_result(self) -> Result<User, AuthError> {
        match self {
            EmailVerification::Verified(user) => Ok(user),
            EmailVerification::NotFound => Err(AuthError::VerificationNotFound),
            EmailVerification::Expired => Err(AuthError::VerificationExpired),
            EmailVerification::UserMissing => Err(AuthError::UserUnavailable),
        }
    }
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    refresh_tokens: RefreshTokens,
    verification_tokens: VerificationTokens,
    hasher: CredentialHasher,
    codec: TokenCodec,
    notifier: Arc<dyn Notifier>,
    policy: AuthPolicy,
}

impl AuthService {
    pub fn new(
        repositories: Repositories,
        hasher: CredentialHasher,
        codec: TokenCodec,
        notifier: Arc<dyn Notifier>,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            users: repositories.users,
            refresh_tokens: RefreshTokens::new(repositories.refresh_tokens),
            verification_tokens: VerificationTokens::new(repositories.verification_tokens),
            hasher,
            codec,
            notifier,
            policy,
        }
    }

    pub fn from_settings(
        settings: &Settings,
        repositories: Repositories,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            repositories,
            CredentialHasher::new(&settings.password)?,
            TokenCodec::new(&settings.jwt)?,
            notifier,
            AuthPolicy::try_from(&settings.verification)?,
        ))
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Create an unverified, inactive account and send its verification email.
    ///
    /// # Errors
    /// - `Validation` for malformed email, names or password
    /// - `DuplicateEmail` if the email (exact match) is already registered
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, AuthError> {
        let email = is_valid_email(email)?;
        let first_name = is_valid_name("first_name", first_name)?;
        let last_name = is_valid_name("last_name", last_name)?;
        is_valid_password(password)?;

        if self.users.find_user_by_email(&email).await?.is_some() {
            tracing::warn!("Registration rejected: email already registered");
            return Err(AuthError::DuplicateEmail);
        }

        let password_hash = self.hash_password(password).await?;

        // The unique index is the final arbiter when two registrations race.
        let user = match self
            .users
            .insert_user(NewUser {
                email,
                password_hash,
                first_name,
                last_name,
            })
            .await
        {
            Ok(user) => user,
            Err(StoreError::UniqueViolation(_)) => {
                tracing::warn!("Registration rejected: concurrent duplicate email");
                return Err(AuthError::DuplicateEmail);
            }
            Err(e) => return Err(e.into()),
        };

        let token = self
            .verification_tokens
            .issue(user.id, self.policy.verification_token_ttl_hours)
            .await?;
        self.send_verification(&user, token);

        tracing::info!(user_id = %user.id, "User registered successfully");
        Ok(user)
    }

    /// Check credentials and issue an access/refresh token pair.
    ///
    /// Unknown email and wrong password both yield `InvalidCredentials`.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let user = match self.users.find_user_by_email(email.trim()).await? {
            Some(user) => user,
            None => {
                // Burn a hash so unknown emails cost about as much as wrong passwords.
                let _ = self.hash_password(password).await;
                tracing::warn!("Login failed: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self.verify_password(password, &user.password_hash).await? {
            tracing::warn!(user_id = %user.id, "Login failed: invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Login rejected: account inactive");
            return Err(AuthError::InactiveAccount);
        }

        if self.policy.require_verified_login && !user.is_verified {
            tracing::warn!(user_id = %user.id, "Login rejected: email not verified");
            return Err(AuthError::EmailNotVerified);
        }

        let tokens = self.issue_pair(&user)?;
        self.refresh_tokens
            .store(user.id, &tokens.refresh_token, self.codec.refresh_ttl())
            .await?;

        tracing::info!(user_id = %user.id, "User logged in successfully");
        Ok(AuthSession { user, tokens })
    }

    /// Rotate a refresh token: the presented token is revoked and a new pair
    /// issued, so a replayed token can never succeed twice.
    ///
    /// # Errors
    /// - `InvalidToken` if the token is not a well-formed, unexpired refresh token
    /// - `TokenNotFound` if no live record backs it
    /// - `UserUnavailable` if the user is missing or inactive
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.codec.verify_refresh(refresh_token).map_err(|reason| {
            tracing::warn!(reason = %reason, "Refresh token rejected");
            AuthError::InvalidToken
        })?;

        let record = self
            .refresh_tokens
            .find_valid(refresh_token)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %claims.user_id, "Refresh token not found, revoked or expired");
                AuthError::TokenNotFound
            })?;

        if record.user_id != claims.user_id {
            tracing::warn!(
                user_id = %record.user_id,
                claimed_user_id = %claims.user_id,
                "Refresh token owner mismatch"
            );
            return Err(AuthError::InvalidToken);
        }

        let user = self
            .users
            .find_user_by_id(record.user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| {
                tracing::warn!(user_id = %record.user_id, "Refresh rejected: user missing or inactive");
                AuthError::UserUnavailable
            })?;

        let tokens = self.issue_pair(&user)?;
        let rotated = self
            .refresh_tokens
            .rotate(
                refresh_token,
                user.id,
                &tokens.refresh_token,
                self.codec.refresh_ttl(),
            )
            .await?;

        if rotated.is_none() {
            tracing::warn!(user_id = %user.id, "Refresh token already rotated by a concurrent request");
            return Err(AuthError::TokenNotFound);
        }

        tracing::info!(user_id = %user.id, "Token refreshed successfully");
        Ok(tokens)
    }

    /// Revoke a refresh token. Unknown or already revoked tokens are not an error.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if self.refresh_tokens.revoke(refresh_token).await? {
            tracing::info!("Refresh token revoked on logout");
        } else {
            tracing::debug!("Logout with unknown or already revoked token");
        }
        Ok(())
    }

    /// Revoke every live refresh token of a user.
    pub async fn logout_all(&self, user_id: Uuid) -> Result<u64, AuthError> {
        Ok(self.refresh_tokens.revoke_all(user_id).await?)
    }

    /// Consume a verification token and activate the account it belongs to.
    ///
    /// Rejections are reported as `EmailVerification` variants, not errors.
    pub async fn verify_email(&self, token: &str) -> Result<EmailVerification, AuthError> {
        match self.verification_tokens.redeem(token).await? {
            Redemption::Verified(user) => {
                tracing::info!(user_id = %user.id, "Email verified");
                self.send_welcome(&user);
                Ok(EmailVerification::Verified(user))
            }
            Redemption::NotFound => {
                tracing::warn!("Email verification with unknown token");
                Ok(EmailVerification::NotFound)
            }
            Redemption::Expired { .. } => Ok(EmailVerification::Expired),
            Redemption::UserMissing { user_id } => {
                tracing::warn!(user_id = %user_id, "Verification token for missing user");
                Ok(EmailVerification::UserMissing)
            }
        }
    }

    /// Issue a fresh verification token for an unverified account.
    ///
    /// Succeeds silently for unknown or already verified emails.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let user = match self.users.find_user_by_email(email.trim()).await? {
            Some(user) if !user.is_verified => user,
            _ => return Ok(()),
        };

        let token = self
            .verification_tokens
            .issue(user.id, self.policy.verification_token_ttl_hours)
            .await?;
        self.send_verification(&user, token);

        tracing::info!(user_id = %user.id, "Verification token reissued");
        Ok(())
    }

    /// Resolve the user behind an access token.
    pub async fn resolve_user(&self, access_token: &str) -> Result<User, AuthError> {
        let claims = self.codec.verify_access(access_token).map_err(|reason| {
            tracing::warn!(reason = %reason, "Access token rejected");
            AuthError::InvalidToken
        })?;
        self.user_for_claims(&claims).await
    }

    /// Load the user named by already-verified access claims.
    pub async fn user_for_claims(&self, claims: &Claims) -> Result<User, AuthError> {
        self.users
            .find_user_by_email(&claims.sub)
            .await?
            .filter(|user| user.id == claims.user_id)
            .ok_or(AuthError::InvalidToken)
    }

    fn issue_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        let subject = TokenSubject::new(user.id, user.email.as_str());
        let access_token = self
            .codec
            .create_access_token(&subject, None)
            .map_err(|e| AuthError::internal(e.to_string()))?;
        let refresh_token = self
            .codec
            .create_refresh_token(&subject)
            .map_err(|e| AuthError::internal(e.to_string()))?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password)).await??;
        Ok(hash)
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        Ok(tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await?)
    }

    fn send_verification(&self, user: &User, token: String) {
        let notifier = self.notifier.clone();
        let email = user.email.clone();
        let name = user.display_name().to_string();
        dispatch("verification", user.id, async move {
            notifier.send_verification(&email, &name, &token).await
        });
    }

    fn send_welcome(&self, user: &User) {
        let notifier = self.notifier.clone();
        let email = user.email.clone();
        let name = user.display_name().to_string();
        dispatch("welcome", user.id, async move {
            notifier.send_welcome(&email, &name).await
        });
    }
}

/// Fire-and-forget delivery; failures are logged and never reach the caller.
fn dispatch<F>(kind: &'static str, user_id: Uuid, send: F)
where
    F: Future<Output = Result<(), EmailError>> + Send + 'static,
{
    tokio::spawn(async move {
        match send.await {
            Ok(()) => tracing::info!(user_id = %user_id, email_kind = kind, "Email sent"),
            Err(e) => tracing::error!(
                user_id = %user_id,
                email_kind = kind,
                error = %e,
                "Failed to send email"
            ),
        }
    });
}
