//! Input rules shared by sign-up and the username availability check.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AppError;

static USERNAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("valid username regex"));

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub const USERNAME_MIN: usize = 2;
pub const USERNAME_MAX: usize = 20;
pub const PASSWORD_MIN: usize = 6;

pub fn validate_username(username: &str) -> Result<(), AppError> {
    let len = username.chars().count();
    if len < USERNAME_MIN {
        return Err(AppError::Validation(format!(
            "Username must be at least {} characters",
            USERNAME_MIN
        )));
    }
    if len > USERNAME_MAX {
        return Err(AppError::Validation(format!(
            "Username must be no more than {} characters",
            USERNAME_MAX
        )));
    }
    if !USERNAME_CHARS.is_match(username) {
        return Err(AppError::Validation(
            "Username must not contain special characters".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if !EMAIL_SHAPE.is_match(email) {
        return Err(AppError::Validation("Invalid email address".to_string()));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_usernames() {
        for name in ["al", "alice", "alice_99", "A_B_C", "x".repeat(20).as_str()] {
            assert!(validate_username(name).is_ok(), "{name} should be valid");
        }
    }

    #[test]
    fn rejects_bad_usernames() {
        for name in ["", "a", "alice smith", "alice!", "ali-ce", "x".repeat(21).as_str()] {
            assert!(
                matches!(validate_username(name), Err(AppError::Validation(_))),
                "{name} should be invalid"
            );
        }
    }

    #[test]
    fn email_and_password_rules() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("not an email").is_err());

        assert!(validate_password("secret").is_ok());
        assert!(validate_password("short").is_err());
    }
}
