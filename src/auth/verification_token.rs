/// Email verification tokens: generation, issue and redemption.
///
/// Issuing a token replaces any earlier ones for the same user. A token is
/// removed by its first use, whether or not it had expired.
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

use crate::auth::refresh_token::expiry_after;
use crate::store::{Redemption, StoreError, VerificationTokenRepository};

const TOKEN_BYTES: usize = 32;

/// Single-use, expiring proof of email ownership.
#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct VerificationToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn new(user_id: Uuid, ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            token: generate_token(),
            user_id,
            expires_at: expiry_after(created_at, ttl),
            created_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// 32 bytes from the OS CSPRNG, URL-safe base64 without padding.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Verified(Uuid),
    NotFound,
    Expired,
}

#[derive(Clone)]
pub struct VerificationTokens {
    repository: Arc<dyn VerificationTokenRepository>,
}

impl VerificationTokens {
    pub fn new(repository: Arc<dyn VerificationTokenRepository>) -> Self {
        Self { repository }
    }

    /// Issue a token for `user_id`, discarding any earlier ones.
    pub async fn issue(&self, user_id: Uuid, ttl_hours: i64) -> Result<String, StoreError> {
        let token = VerificationToken::new(user_id, Duration::hours(ttl_hours));
        let stored = self.repository.replace_verification_token(token).await?;
        Ok(stored.token)
    }

    /// Consume `token`. The row is removed whatever the outcome.
    pub async fn consume(&self, token: &str) -> Result<VerificationOutcome, StoreError> {
        match self.repository.take_verification_token(token).await? {
            None => Ok(VerificationOutcome::NotFound),
            Some(record) if record.is_expired() => {
                tracing::info!(user_id = %record.user_id, "Verification token expired");
                Ok(VerificationOutcome::Expired)
            }
            Some(record) => Ok(VerificationOutcome::Verified(record.user_id)),
        }
    }

    /// Consume `token` and verify its user in the same unit of work.
    pub async fn redeem(&self, token: &str) -> Result<Redemption, StoreError> {
        let redemption = self
            .repository
            .redeem_verification_token(token, Utc::now())
            .await?;
        if let Redemption::Expired { user_id } = &redemption {
            tracing::info!(user_id = %user_id, "Verification token expired");
        }
        Ok(redemption)
    }
}
