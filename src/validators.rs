/// Input validators for account registration and login
/// Features:
/// 1. DoS Protection: Input length limits
/// 2. Account hygiene: Email format validation
/// 3. Name sanitization: control characters and SQL-like payloads rejected
/// 4. Password policy: length bounds only (argon2 has no input ceiling)

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 256;
const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 1024;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).unwrap();

    static ref SQL_INJECTION_PATTERNS: [Regex; 3] = [
        // Union-based SQL injection
        Regex::new(r"(?i)\s+UNION\s+SELECT\s+").unwrap(),
        // Stacked queries
        Regex::new(r"(?i);\s*(INSERT|UPDATE|DELETE|DROP|CREATE|ALTER)\b").unwrap(),
        // Comment terminators
        Regex::new(r"(--|/\*|\*/)").unwrap(),
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(&'static str),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(&'static str, usize),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(&'static str, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(&'static str),
    #[error("{0} contains suspicious content")]
    SuspiciousContent(&'static str),
}

/// Validates an email address and returns it trimmed.
///
/// Case is preserved: accounts are keyed by the email exactly as stored.
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email", MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email"));
    }

    if has_suspicious_email_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("email"));
    }

    Ok(trimmed.to_string())
}

/// Validates a first or last name and returns it trimmed.
pub fn is_valid_name(field: &'static str, name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }

    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong(field, MAX_NAME_LENGTH));
    }

    if has_suspicious_name_patterns(trimmed) || contains_sql_injection_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent(field));
    }

    Ok(trimmed.to_string())
}

/// Validates password length. The password itself is never trimmed.
pub fn is_valid_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();

    if length == 0 {
        return Err(ValidationError::EmptyField("password"));
    }

    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password", MIN_PASSWORD_LENGTH));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_LENGTH));
    }

    Ok(())
}

fn has_suspicious_email_patterns(email: &str) -> bool {
    // Local part is limited to 64 octets
    if let Some(at_pos) = email.find('@') {
        if email[..at_pos].len() > 64 {
            return true;
        }
    }

    if email.matches('@').count() != 1 {
        return true;
    }

    email.contains('\0')
}

fn has_suspicious_name_patterns(name: &str) -> bool {
    if name.chars().any(|c| c.is_control()) {
        return true;
    }

    let special_char_count = name
        .chars()
        .filter(|c| {
            !c.is_alphanumeric() && !c.is_whitespace() && !matches!(c, '-' | '.' | '_' | '\'')
        })
        .count();

    special_char_count > 5
}

fn contains_sql_injection_patterns(input: &str) -> bool {
    SQL_INJECTION_PATTERNS.iter().any(|pattern| pattern.is_match(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("user@example.com").is_ok());
        assert!(is_valid_email("test.email@domain.co.uk").is_ok());
        assert!(is_valid_email("user+tag@example.com").is_ok());
        assert!(is_valid_email("a@x.com").is_ok());
    }

    #[test]
    fn test_email_case_is_preserved() {
        assert_eq!(is_valid_email("  Alice@Example.com ").unwrap(), "Alice@Example.com");
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(is_valid_email("invalid").is_err());
        assert!(is_valid_email("user@").is_err());
        assert!(is_valid_email("@example.com").is_err());
        assert!(is_valid_email("user@@example.com").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(
            is_valid_email(&too_long),
            Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH))
        );
        assert_eq!(is_valid_email("a@b"), Err(ValidationError::TooShort("email", 5)));
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("first_name", "John").is_ok());
        assert!(is_valid_name("last_name", "Jean-Pierre").is_ok());
        assert!(is_valid_name("last_name", "O'Brien").is_ok());
    }

    #[test]
    fn test_name_errors_carry_field() {
        assert_eq!(
            is_valid_name("last_name", "   "),
            Err(ValidationError::EmptyField("last_name"))
        );
        assert!(is_valid_name("first_name", &"a".repeat(257)).is_err());
    }

    #[test]
    fn test_sql_injection_in_name() {
        assert!(is_valid_name("first_name", "John'; DROP TABLE users--").is_err());
        assert!(is_valid_name("first_name", "Name UNION SELECT * FROM users").is_err());
    }

    #[test]
    fn test_control_characters() {
        assert!(is_valid_name("first_name", "Name\0with\0null").is_err());
    }

    #[test]
    fn test_password_bounds() {
        assert!(is_valid_password("pw123456").is_ok());
        assert_eq!(
            is_valid_password("short"),
            Err(ValidationError::TooShort("password", MIN_PASSWORD_LENGTH))
        );
        assert!(is_valid_password(&"x".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
        assert!(is_valid_password(&"x".repeat(200)).is_ok());
    }
}
