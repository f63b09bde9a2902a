/// Password Hashing and Verification
///
/// Argon2id with externally configured costs. Hashes are PHC strings
/// (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so verification reads the
/// algorithm and parameters from the stored hash instead of from settings.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::configuration::PasswordSettings;
use crate::error::ConfigError;

const MIN_SALT_LENGTH: usize = 8;
// Base64 of 48 bytes is 64 characters, the PHC salt ceiling.
const MAX_SALT_LENGTH: usize = 48;

#[derive(Clone, Debug)]
pub struct CredentialHasher {
    params: Params,
    salt_length: usize,
}

impl CredentialHasher {
    /// Build a hasher from settings, rejecting out-of-range costs up front.
    pub fn new(settings: &PasswordSettings) -> Result<Self, ConfigError> {
        let params = Params::new(
            settings.memory_cost,
            settings.time_cost,
            settings.parallelism,
            Some(settings.hash_length),
        )
        .map_err(|e| ConfigError::invalid("password", e.to_string()))?;

        if !(MIN_SALT_LENGTH..=MAX_SALT_LENGTH).contains(&settings.salt_length) {
            return Err(ConfigError::invalid(
                "password.salt_length",
                format!(
                    "must be between {} and {} bytes",
                    MIN_SALT_LENGTH, MAX_SALT_LENGTH
                ),
            ));
        }

        Ok(Self {
            params,
            salt_length: settings.salt_length,
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn salt(&self) -> Result<SaltString, argon2::password_hash::Error> {
        let mut bytes = vec![0u8; self.salt_length];
        OsRng.fill_bytes(&mut bytes);
        SaltString::encode_b64(&bytes)
    }

    /// Hash a password with a fresh random salt.
    pub fn hash(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = self.salt()?;
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
    }

    /// Verify a password against a stored hash.
    ///
    /// Returns `false` for mismatches and for malformed or foreign hashes;
    /// never errors.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        PasswordHash::new(hash)
            .ok()
            .as_ref()
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }
}
