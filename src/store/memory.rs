/// In-process implementation of the persistence contract.
///
/// All tables live behind one async mutex, so every trait method is a single
/// atomic unit of work. Used by tests and for running without Postgres.
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    Redemption, RefreshTokenRepository, StoreError, UserRepository, VerificationTokenRepository,
};
use crate::auth::{NewRefreshToken, RefreshToken, VerificationToken};
use crate::user::{NewUser, User};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    // token_hash -> record
    refresh_tokens: HashMap<String, RefreshToken>,
    // token -> record
    verification_tokens: HashMap<String, VerificationToken>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn verification_tokens_for(&self, user_id: Uuid) -> Vec<VerificationToken> {
        let tables = self.tables.lock().await;
        tables
            .verification_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn refresh_tokens_for(&self, user_id: Uuid) -> Vec<RefreshToken> {
        let tables = self.tables.lock().await;
        tables
            .refresh_tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }
}

impl Tables {
    fn insert_refresh(&mut self, token: NewRefreshToken) -> Result<RefreshToken, StoreError> {
        if self.refresh_tokens.contains_key(&token.token_hash) {
            return Err(StoreError::UniqueViolation("refresh_tokens.token_hash".to_string()));
        }
        let record = token.into_record(Utc::now());
        self.refresh_tokens
            .insert(record.token_hash.clone(), record.clone());
        Ok(record)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation("users.email".to_string()));
        }
        let user = user.into_user(Utc::now());
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryStore {
    async fn insert_refresh_token(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshToken, StoreError> {
        self.tables.lock().await.insert_refresh(token)
    }

    async fn find_active_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .refresh_tokens
            .get(token_hash)
            .filter(|t| t.is_live(now))
            .cloned())
    }

    async fn revoke_refresh_token(&self, token_hash: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.refresh_tokens.get_mut(token_hash) {
            Some(record) if !record.is_revoked => {
                record.is_revoked = true;
                record.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rotate_refresh_token(
        &self,
        presented_hash: &str,
        replacement: NewRefreshToken,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError> {
        let mut tables = self.tables.lock().await;

        let live = tables
            .refresh_tokens
            .get(presented_hash)
            .map(|t| t.is_live(now))
            .unwrap_or(false);
        if !live {
            return Ok(None);
        }

        // Insert first so a collision leaves the presented token untouched.
        let record = tables.insert_refresh(replacement)?;
        if let Some(presented) = tables.refresh_tokens.get_mut(presented_hash) {
            presented.is_revoked = true;
            presented.revoked_at = Some(now);
        }
        Ok(Some(record))
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let mut revoked = 0;
        for record in tables
            .refresh_tokens
            .values_mut()
            .filter(|t| t.user_id == user_id && !t.is_revoked)
        {
            record.is_revoked = true;
            record.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }
}

#[async_trait]
impl VerificationTokenRepository for InMemoryStore {
    async fn replace_verification_token(
        &self,
        token: VerificationToken,
    ) -> Result<VerificationToken, StoreError> {
        let mut tables = self.tables.lock().await;
        tables
            .verification_tokens
            .retain(|_, t| t.user_id != token.user_id);
        if tables.verification_tokens.contains_key(&token.token) {
            return Err(StoreError::UniqueViolation(
                "verification_tokens.token".to_string(),
            ));
        }
        tables
            .verification_tokens
            .insert(token.token.clone(), token.clone());
        Ok(token)
    }

    async fn take_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<VerificationToken>, StoreError> {
        Ok(self.tables.lock().await.verification_tokens.remove(token))
    }

    async fn redeem_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Redemption, StoreError> {
        let mut tables = self.tables.lock().await;
        let record = match tables.verification_tokens.remove(token) {
            Some(record) => record,
            None => return Ok(Redemption::NotFound),
        };
        if record.expires_at < now {
            return Ok(Redemption::Expired {
                user_id: record.user_id,
            });
        }
        Ok(match tables.users.get_mut(&record.user_id) {
            Some(user) => {
                user.is_verified = true;
                user.is_active = true;
                user.updated_at = now;
                Redemption::Verified(user.clone())
            }
            None => Redemption::UserMissing {
                user_id: record.user_id,
            },
        })
    }
}
