//! Registration input validation
//!
//! Rules run in a fixed order and the first failure wins, so the caller
//! always sees the earliest broken field. The ordering matters for client
//! behavior, not security - uniqueness is enforced separately at commit.

use crate::types::VemsError;

/// Public registration payload, validated before any storage access
#[derive(Debug)]
pub struct RegistrationInput<'a> {
    pub real_id: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub password: &'a str,
}

/// Validate a registration request. Order: name, email, phone, identifier,
/// password.
pub fn validate_registration(input: &RegistrationInput<'_>) -> Result<(), VemsError> {
    if input.name.trim().chars().count() < 2 {
        return Err(VemsError::Validation(
            "name must be at least 2 characters".into(),
        ));
    }

    if !valid_email(input.email) {
        return Err(VemsError::Validation("invalid email address".into()));
    }

    if !valid_phone(input.phone) {
        return Err(VemsError::Validation(
            "phone number must be 9-15 digits".into(),
        ));
    }

    if !valid_identifier(input.real_id) {
        return Err(VemsError::Validation(
            "id must be alphanumeric".into(),
        ));
    }

    if !valid_password(input.password) {
        return Err(VemsError::Validation(
            "password must be at least 8 characters and contain a digit".into(),
        ));
    }

    Ok(())
}

/// Basic `local@domain.tld` shape; not an RFC 5322 parser.
fn valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return false,
    };

    if local.is_empty() || email.contains(char::is_whitespace) {
        return false;
    }

    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && tld.len() >= 2,
        None => false,
    }
}

/// Digits plus `+`, `-`, and spaces; 9 to 15 characters.
fn valid_phone(phone: &str) -> bool {
    let len = phone.chars().count();
    (9..=15).contains(&len)
        && phone
            .chars()
            .all(|c| c.is_ascii_digit() || c == '+' || c == '-' || c == ' ')
}

fn valid_identifier(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// At least 8 characters with at least one digit.
fn valid_password(password: &str) -> bool {
    password.chars().count() >= 8 && password.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RegistrationInput<'static> {
        RegistrationInput {
            real_id: "VLG0001",
            name: "Aminah Binti Yusof",
            email: "aminah@example.com",
            phone: "+60123456789",
            password: "selamat123",
        }
    }

    #[test]
    fn test_valid_registration_accepted() {
        assert!(validate_registration(&valid()).is_ok());
    }

    #[test]
    fn test_short_name_rejected() {
        let mut input = valid();
        input.name = " a ";
        let err = validate_registration(&input).unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_email_shapes() {
        assert!(valid_email("a@b.co"));
        assert!(valid_email("first.last@sub.domain.my"));
        assert!(!valid_email("no-at-sign"));
        assert!(!valid_email("@domain.com"));
        assert!(!valid_email("user@domain"));
        assert!(!valid_email("user@.co"));
        assert!(!valid_email("user@domain.c"));
        assert!(!valid_email("two@@signs.com"));
        assert!(!valid_email("space in@domain.com"));
    }

    #[test]
    fn test_phone_shapes() {
        assert!(valid_phone("0123456789"));
        assert!(valid_phone("+601-234 5678"));
        assert!(!valid_phone("12345678")); // too short
        assert!(!valid_phone("1234567890123456")); // too long
        assert!(!valid_phone("01234abc89"));
    }

    #[test]
    fn test_identifier_alphanumeric_only() {
        assert!(valid_identifier("VLG0001"));
        assert!(valid_identifier("abc123"));
        assert!(!valid_identifier(""));
        assert!(!valid_identifier("user-1"));
        assert!(!valid_identifier("user 1"));
    }

    #[test]
    fn test_password_rules() {
        assert!(valid_password("selamat123"));
        assert!(!valid_password("short1")); // < 8 chars
        assert!(!valid_password("nodigitshere")); // no digit
    }

    #[test]
    fn test_first_failing_rule_wins() {
        // both name and password are broken; the name error must surface
        let mut input = valid();
        input.name = "x";
        input.password = "bad";
        let err = validate_registration(&input).unwrap_err();
        assert!(err.to_string().contains("name"));

        // name fixed: now the email error surfaces before the password one
        let mut input = valid();
        input.email = "broken";
        input.password = "bad";
        let err = validate_registration(&input).unwrap_err();
        assert!(err.to_string().contains("email"));
    }
}
