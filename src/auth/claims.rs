/// Signed token claims
///
/// Payload shared by access and refresh tokens. `type` distinguishes the two
/// and every verification site must check it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Access => write!(f, "access"),
            TokenType::Refresh => write!(f, "refresh"),
        }
    }
}

/// Identity a token is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSubject {
    pub user_id: Uuid,
    pub email: String,
}

impl TokenSubject {
    pub fn new(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user email)
    pub sub: String,
    pub user_id: Uuid,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
    /// Unique token id
    pub jti: Uuid,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

impl Claims {
    pub fn new(
        subject: &TokenSubject,
        token_type: TokenType,
        ttl: chrono::Duration,
        issuer: &str,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: subject.email.clone(),
            user_id: subject.user_id,
            exp: now.saturating_add(ttl.num_seconds()),
            iat: now,
            iss: issuer.to_string(),
            jti: Uuid::new_v4(),
            token_type,
        }
    }

    pub fn subject(&self) -> TokenSubject {
        TokenSubject::new(self.user_id, self.sub.clone())
    }

    pub fn is_expired(&self) -> bool {
        self.exp < chrono::Utc::now().timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let subject = TokenSubject::new(Uuid::new_v4(), "test@example.com");
        let claims = Claims::new(&subject, TokenType::Access, chrono::Duration::minutes(30), "test");

        assert_eq!(claims.sub, "test@example.com");
        assert_eq!(claims.user_id, subject.user_id);
        assert_eq!(claims.exp - claims.iat, 1800);
        assert_eq!(claims.subject(), subject);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_type_claim_wire_name() {
        let subject = TokenSubject::new(Uuid::new_v4(), "test@example.com");
        let claims = Claims::new(&subject, TokenType::Refresh, chrono::Duration::days(7), "test");
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["type"], "refresh");
        assert!(json.get("token_type").is_none());
    }

    #[test]
    fn test_each_claim_set_is_unique() {
        let subject = TokenSubject::new(Uuid::new_v4(), "test@example.com");
        let a = Claims::new(&subject, TokenType::Refresh, chrono::Duration::days(7), "test");
        let b = Claims::new(&subject, TokenType::Refresh, chrono::Duration::days(7), "test");

        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_negative_ttl_is_expired() {
        let subject = TokenSubject::new(Uuid::new_v4(), "test@example.com");
        let claims = Claims::new(&subject, TokenType::Access, chrono::Duration::seconds(-10), "test");
        assert!(claims.is_expired());
    }
}
