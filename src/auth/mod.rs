/// Authentication module
///
/// Credential hashing, signed token issuance/validation, and the refresh and
/// email-verification token stores.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod verification_token;

pub use claims::{Claims, TokenSubject, TokenType};
pub use jwt::{TokenCodec, TokenError};
pub use password::CredentialHasher;
pub use refresh_token::{hash_token, NewRefreshToken, RefreshToken, RefreshTokens};
pub use verification_token::{
    generate_token, VerificationOutcome, VerificationToken, VerificationTokens,
};
