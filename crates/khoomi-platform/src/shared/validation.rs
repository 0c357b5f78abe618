//! Field validators shared by request handlers and writers.

use regex::Regex;

use crate::shared::error::{PlatformError, Result};

const MAX_EMAIL_LEN: usize = 254;
const MAX_LOCAL_PART_LEN: usize = 64;

fn shop_username_pattern() -> &'static Regex {
    static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-z0-9_-]{2,29}$").unwrap())
}

/// Lowercase and validate an email address.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(PlatformError::validation("email is required"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(PlatformError::validation("email must be at most 254 characters"));
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return Err(PlatformError::validation("email must contain '@'"));
    };
    if local.is_empty() || local.len() > MAX_LOCAL_PART_LEN {
        return Err(PlatformError::validation("email mailbox name is invalid"));
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(PlatformError::validation("email domain is invalid"));
    }
    email
        .parse::<lettre::Address>()
        .map_err(|e| PlatformError::validation(format!("invalid email: {}", e)))?;
    Ok(email)
}

/// Lowercase and validate a shop username.
pub fn normalize_shop_username(raw: &str) -> Result<String> {
    let username = raw.trim().to_lowercase();
    if shop_username_pattern().is_match(&username) {
        Ok(username)
    } else {
        Err(PlatformError::validation(
            "shop username must be 3-30 characters of a-z, 0-9, '_' or '-', starting with a letter",
        ))
    }
}

pub fn validate_shop_name(name: &str) -> Result<()> {
    let count = name.trim().chars().count();
    if count == 0 || count > 60 {
        return Err(PlatformError::validation("shop name must be 1-60 characters"));
    }
    if name.chars().any(char::is_control) {
        return Err(PlatformError::validation("shop name must be printable"));
    }
    Ok(())
}

pub fn validate_shop_description(description: &str) -> Result<()> {
    max_chars("shop description", description, 500)
}

/// Uppercase first letter followed by letters only.
pub fn validate_personal_name(field: &str, name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => first.is_uppercase() && chars.all(char::is_alphabetic),
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(PlatformError::validation(format!(
            "{} must start with an uppercase letter and contain only letters",
            field
        )))
    }
}

pub fn validate_account_number(number: &str) -> Result<()> {
    if number.len() == 10 && number.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(PlatformError::validation("account number must be exactly 10 digits"))
    }
}

pub fn validate_announcement(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(PlatformError::validation("announcement must not be empty"));
    }
    max_chars("announcement", text, 100)
}

pub fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(PlatformError::validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

pub fn max_chars(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        Err(PlatformError::validation(format!(
            "{} must be at most {} characters",
            field, max
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email("  A@B.co ").unwrap(), "a@b.co");
        assert!(normalize_email("").is_err());
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("a@localhost").is_err());
        assert!(normalize_email("a b@c.com").is_err());
        assert!(normalize_email(&format!("{}@b.co", "a".repeat(65))).is_err());
        assert!(normalize_email(&format!("a@{}.com", "b".repeat(250))).is_err());
    }

    #[test]
    fn test_shop_username() {
        assert_eq!(normalize_shop_username("AdaBeads").unwrap(), "adabeads");
        assert!(normalize_shop_username("ab").is_err());
        assert!(normalize_shop_username("1beads").is_err());
        assert!(normalize_shop_username("ada beads").is_err());
        assert!(normalize_shop_username(&"a".repeat(31)).is_err());
        assert!(normalize_shop_username("ada_beads-2").is_ok());
    }

    #[test]
    fn test_shop_name_and_description() {
        assert!(validate_shop_name("Ada's Beads").is_ok());
        assert!(validate_shop_name("   ").is_err());
        assert!(validate_shop_name(&"x".repeat(61)).is_err());
        assert!(validate_shop_name("bad\u{7}name").is_err());
        assert!(validate_shop_description("").is_ok());
        assert!(validate_shop_description(&"x".repeat(501)).is_err());
    }

    #[test]
    fn test_personal_name() {
        assert!(validate_personal_name("first_name", "Ada").is_ok());
        assert!(validate_personal_name("first_name", "ada").is_err());
        assert!(validate_personal_name("first_name", "Ada1").is_err());
        assert!(validate_personal_name("first_name", "").is_err());
    }

    #[test]
    fn test_account_number() {
        assert!(validate_account_number("0123456789").is_ok());
        assert!(validate_account_number("012345678").is_err());
        assert!(validate_account_number("01234567890").is_err());
        assert!(validate_account_number("01234a6789").is_err());
    }

    #[test]
    fn test_announcement() {
        assert!(validate_announcement("Back on Monday").is_ok());
        assert!(validate_announcement("  ").is_err());
        assert!(validate_announcement(&"x".repeat(101)).is_err());
    }
}
