/// Signed Token Codec
///
/// Issues and verifies HMAC-signed JWTs for access and refresh tokens.
/// The secret, algorithm, issuer and both lifetimes come from `JwtSettings`.

use std::str::FromStr;

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenSubject, TokenType};
use crate::configuration::JwtSettings;
use crate::error::ConfigError;

/// One week.
pub const MAX_ACCESS_TOKEN_MINUTES: i64 = 7 * 24 * 60;
/// Ten years.
pub const MAX_REFRESH_TOKEN_DAYS: i64 = 3650;

/// Why a token was rejected.
///
/// Only for logging; callers collapse every variant into the same
/// "invalid token" response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token claims rejected")]
    InvalidClaims,
    #[error("expected {expected} token, got {found}")]
    WrongType {
        expected: TokenType,
        found: TokenType,
    },
    #[error("token could not be signed")]
    Signing,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidClaims,
            _ => TokenError::Malformed,
        }
    }
}

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    /// Build a codec from settings.
    ///
    /// # Errors
    /// Returns error if the algorithm is not an HMAC variant, the secret is
    /// empty, or a lifetime is outside its allowed range.
    pub fn new(config: &JwtSettings) -> Result<Self, ConfigError> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .map_err(|_| ConfigError::invalid("jwt.algorithm", config.algorithm.clone()))?;

        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(ConfigError::invalid(
                "jwt.algorithm",
                "only HS256, HS384 and HS512 are supported",
            ));
        }

        if config.secret.is_empty() {
            return Err(ConfigError::invalid("jwt.secret", "must not be empty"));
        }

        if !(1..=MAX_ACCESS_TOKEN_MINUTES).contains(&config.access_token_expire_minutes) {
            return Err(ConfigError::invalid(
                "jwt.access_token_expire_minutes",
                format!("must be between 1 and {}", MAX_ACCESS_TOKEN_MINUTES),
            ));
        }

        if !(1..=MAX_REFRESH_TOKEN_DAYS).contains(&config.refresh_token_expire_days) {
            return Err(ConfigError::invalid(
                "jwt.refresh_token_expire_days",
                format!("must be between 1 and {}", MAX_REFRESH_TOKEN_DAYS),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            algorithm,
            issuer: config.issuer.clone(),
            access_ttl: Duration::minutes(config.access_token_expire_minutes),
            refresh_ttl: Duration::days(config.refresh_token_expire_days),
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue an access token, using the configured lifetime unless `ttl` is given.
    pub fn create_access_token(
        &self,
        subject: &TokenSubject,
        ttl: Option<Duration>,
    ) -> Result<String, TokenError> {
        let claims = Claims::new(
            subject,
            TokenType::Access,
            ttl.unwrap_or(self.access_ttl),
            &self.issuer,
        );
        self.sign(&claims)
    }

    pub fn create_refresh_token(&self, subject: &TokenSubject) -> Result<String, TokenError> {
        let claims = Claims::new(subject, TokenType::Refresh, self.refresh_ttl, &self.issuer);
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "Token signing failed");
            TokenError::Signing
        })
    }

    /// Check signature, structure, issuer and expiry. Does not check `type`.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_kind(token, TokenType::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_kind(token, TokenType::Refresh)
    }

    fn verify_kind(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.token_type != expected {
            return Err(TokenError::WrongType {
                expected,
                found: claims.token_type,
            });
        }
        Ok(claims)
    }
}
