/// Refresh Token Store
///
/// Persisted, revocable records backing issued refresh tokens:
/// - Only the SHA-256 digest of the token string is stored
/// - A record is live while `is_revoked = false` and `expires_at` is in the future
/// - Revocation is one-way and idempotent; rows are never deleted
/// - Rotation revokes the presented record and inserts its successor atomically

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::store::{RefreshTokenRepository, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl RefreshToken {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

impl NewRefreshToken {
    pub fn new(user_id: Uuid, token: &str, ttl: Duration) -> Self {
        Self {
            user_id,
            token_hash: hash_token(token),
            expires_at: expiry_after(Utc::now(), ttl),
        }
    }

    pub fn into_record(self, now: DateTime<Utc>) -> RefreshToken {
        RefreshToken {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            token_hash: self.token_hash,
            expires_at: self.expires_at,
            is_revoked: false,
            created_at: now,
            revoked_at: None,
        }
    }
}

/// `now + ttl`, saturating at the latest representable instant.
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Hash a refresh token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct RefreshTokens {
    repository: Arc<dyn RefreshTokenRepository>,
}

impl RefreshTokens {
    pub fn new(repository: Arc<dyn RefreshTokenRepository>) -> Self {
        Self { repository }
    }

    /// Persist a freshly issued token for `user_id`.
    pub async fn store(
        &self,
        user_id: Uuid,
        token: &str,
        ttl: Duration,
    ) -> Result<RefreshToken, StoreError> {
        self.repository
            .insert_refresh_token(NewRefreshToken::new(user_id, token, ttl))
            .await
    }

    /// The live record for `token`, if any. Revoked and expired rows are absent.
    pub async fn find_valid(&self, token: &str) -> Result<Option<RefreshToken>, StoreError> {
        self.repository
            .find_active_refresh_token(&hash_token(token), Utc::now())
            .await
    }

    /// Revoke `token`. Unknown or already revoked tokens are a no-op.
    ///
    /// Returns `true` only for the call that performed the revocation.
    pub async fn revoke(&self, token: &str) -> Result<bool, StoreError> {
        self.repository.revoke_refresh_token(&hash_token(token)).await
    }

    /// Revoke `presented` and store `replacement` in one unit of work.
    ///
    /// Returns `None` if `presented` was no longer live, in which case
    /// nothing is written.
    pub async fn rotate(
        &self,
        presented: &str,
        user_id: Uuid,
        replacement: &str,
        ttl: Duration,
    ) -> Result<Option<RefreshToken>, StoreError> {
        self.repository
            .rotate_refresh_token(
                &hash_token(presented),
                NewRefreshToken::new(user_id, replacement, ttl),
                Utc::now(),
            )
            .await
    }

    /// Revoke every live token of a user. Returns how many were revoked.
    pub async fn revoke_all(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let revoked = self.repository.revoke_user_refresh_tokens(user_id).await?;
        tracing::info!(user_id = %user_id, revoked, "All refresh tokens revoked for user");
        Ok(revoked)
    }
}
