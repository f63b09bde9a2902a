/// Postgres implementation of the persistence contract on a `sqlx` pool.
///
/// Schema lives in `migrations/`. Uniqueness of user email, refresh token
/// digest and verification token is enforced by unique indexes. Rotation,
/// verification-token replacement and redemption run inside a transaction.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    Redemption, RefreshTokenRepository, StoreError, UserRepository, VerificationTokenRepository,
};
use crate::auth::{NewRefreshToken, RefreshToken, VerificationToken};
use crate::user::{NewUser, User};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending migrations from `./migrations`.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name,
                   is_active, is_verified, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name,
                   is_active, is_verified, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.into_user(Utc::now());

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, first_name, last_name,
                               is_active, is_verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, email, password_hash, first_name, last_name,
                      is_active, is_verified, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_active)
        .bind(user.is_verified)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}

#[async_trait]
impl RefreshTokenRepository for PgStore {
    async fn insert_refresh_token(
        &self,
        token: NewRefreshToken,
    ) -> Result<RefreshToken, StoreError> {
        let record = token.into_record(Utc::now());

        let stored = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, is_revoked, created_at)
            VALUES ($1, $2, $3, $4, false, $5)
            RETURNING id, user_id, token_hash, expires_at, is_revoked, created_at, revoked_at
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.token_hash)
        .bind(record.expires_at)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn find_active_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError> {
        let record = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, user_id, token_hash, expires_at, is_revoked, created_at, revoked_at
            FROM refresh_tokens
            WHERE token_hash = $1 AND is_revoked = false AND expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn revoke_refresh_token(&self, token_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = true, revoked_at = $1
            WHERE token_hash = $2 AND is_revoked = false
            "#,
        )
        .bind(Utc::now())
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn rotate_refresh_token(
        &self,
        presented_hash: &str,
        replacement: NewRefreshToken,
        now: DateTime<Utc>,
    ) -> Result<Option<RefreshToken>, StoreError> {
        let mut transaction = self.pool.begin().await?;

        // The row lock taken here serializes concurrent rotations of the
        // same token; the loser re-evaluates the WHERE clause and matches nothing.
        let revoked = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = true, revoked_at = $1
            WHERE token_hash = $2 AND is_revoked = false AND expires_at > $1
            "#,
        )
        .bind(now)
        .bind(presented_hash)
        .execute(&mut transaction)
        .await?;

        if revoked.rows_affected() == 0 {
            transaction.rollback().await?;
            return Ok(None);
        }

        let record = replacement.into_record(now);
        let stored = sqlx::query_as::<_, RefreshToken>(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, is_revoked, created_at)
            VALUES ($1, $2, $3, $4, false, $5)
            RETURNING id, user_id, token_hash, expires_at, is_revoked, created_at, revoked_at
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.token_hash)
        .bind(record.expires_at)
        .bind(record.created_at)
        .fetch_one(&mut transaction)
        .await?;

        transaction.commit().await?;
        Ok(Some(stored))
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = true, revoked_at = $1
            WHERE user_id = $2 AND is_revoked = false
            "#,
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl VerificationTokenRepository for PgStore {
    async fn replace_verification_token(
        &self,
        token: VerificationToken,
    ) -> Result<VerificationToken, StoreError> {
        let mut transaction = self.pool.begin().await?;

        sqlx::query("DELETE FROM verification_tokens WHERE user_id = $1")
            .bind(token.user_id)
            .execute(&mut transaction)
            .await?;

        let stored = sqlx::query_as::<_, VerificationToken>(
            r#"
            INSERT INTO verification_tokens (id, token, user_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, token, user_id, expires_at, created_at
            "#,
        )
        .bind(token.id)
        .bind(&token.token)
        .bind(token.user_id)
        .bind(token.expires_at)
        .bind(token.created_at)
        .fetch_one(&mut transaction)
        .await?;

        transaction.commit().await?;
        Ok(stored)
    }

    async fn take_verification_token(
        &self,
        token: &str,
    ) -> Result<Option<VerificationToken>, StoreError> {
        let record = sqlx::query_as::<_, VerificationToken>(
            r#"
            DELETE FROM verification_tokens
            WHERE token = $1
            RETURNING id, token, user_id, expires_at, created_at
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn redeem_verification_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Redemption, StoreError> {
        let mut transaction = self.pool.begin().await?;

        let record = sqlx::query_as::<_, VerificationToken>(
            r#"
            DELETE FROM verification_tokens
            WHERE token = $1
            RETURNING id, token, user_id, expires_at, created_at
            "#,
        )
        .bind(token)
        .fetch_optional(&mut transaction)
        .await?;

        let record = match record {
            Some(record) => record,
            None => {
                transaction.rollback().await?;
                return Ok(Redemption::NotFound);
            }
        };
        if record.expires_at < now {
            transaction.commit().await?;
            return Ok(Redemption::Expired {
                user_id: record.user_id,
            });
        }

        // An error here drops the transaction, which rolls the delete back.
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET is_verified = true, is_active = true, updated_at = $1
            WHERE id = $2
            RETURNING id, email, password_hash, first_name, last_name,
                      is_active, is_verified, created_at, updated_at
            "#,
        )
        .bind(now)
        .bind(record.user_id)
        .fetch_optional(&mut transaction)
        .await?;

        transaction.commit().await?;

        Ok(match user {
            Some(user) => Redemption::Verified(user),
            None => Redemption::UserMissing {
                user_id: record.user_id,
            },
        })
    }
}
