/// Persistence contract consumed by the auth core.
///
/// Each trait is a narrow set of primitives; the invariants (single live
/// verification token, revoke-once, atomic rotation and redemption) are
/// enforced by the implementation inside one lock or transaction.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{NewRefreshToken, RefreshToken, VerificationToken};
use crate::user::{NewUser, User};

pub mod memory;
pub mod postgres;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Duplicate entry: {0}")]
    UniqueViolation(String),
    #[error("Database error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            // 23505: unique_violation
            if db_err.code().as_deref() == Some("23505") {
                return StoreError::UniqueViolation(db_err.message().to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Fails with `UniqueViolation` if the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

}

#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn insert_refresh_token(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshToken, StoreError>;

    /// Non-revoked record with `expires_at > now`.
    async fn find_active_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError>;

    /// Compare-and-swap on `is_revoked`; `true` only if this call flipped it.
    async fn revoke_refresh_token(&self, token_hash: &str) -> Result<bool, StoreError>;

    /// Revoke the live record for `presented_hash` and insert `replacement`
    /// atomically. `None` (and no writes) if the presented record is not live.
    async fn rotate_refresh_token(
        &self,
        presented_hash: &str,
        replacement: NewRefreshToken,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError>;

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait VerificationTokenRepository: Send + Sync {
    /// Delete every token of `token.user_id`, then insert `token`.
    async fn replace_verification_token(
        &self,
        token: VerificationToken,
    ) -> Result<VerificationToken, StoreError>;

    /// Delete and return the row for `token`, if present.
    async fn take_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<VerificationToken>, StoreError>;

    /// Take `token` and, if it is still live at `now`, set `is_verified` and
    /// `is_active` on its user, all in one unit of work. If the user update
    /// fails nothing is written and the token stays redeemable.
    async fn redeem_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Redemption, StoreError>;
}

/// Result of redeeming a verification token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redemption {
    NotFound,
    Expired { user_id: Uuid },
    Verified(User),
    UserMissing { user_id: Uuid },
}

/// The three repositories the auth service is wired with.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub verification_tokens: Arc<dyn VerificationTokenRepository>,
}

impl Repositories {
    /// Use one backend for all three repositories.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: UserRepository + RefreshTokenRepository + VerificationTokenRepository + 'static,
    {
        Self {
            users: store.clone(),
            refresh_tokens: store.clone(),
            verification_tokens: store,
        }
    }
}
