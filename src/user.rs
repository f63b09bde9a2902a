use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Account record as persisted by the user directory.
///
/// Created unverified and inactive at registration; email verification
/// flips both flags. Never deleted by the auth core.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> &str {
        &self.first_name
    }
}

/// Fields supplied when creating an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

impl NewUser {
    /// Materializes the initial unverified, inactive record.
    pub fn into_user(self, now: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            is_active: false,
            is_verified: false,
            created_at: now,
            updated_at: now,
        }
    }
}
