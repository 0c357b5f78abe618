//! Single-use account tokens (password reset, email verification)

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const PASSWORD_RESET_TOKENS: &str = "user_password_reset_tokens";
pub const EMAIL_VERIFICATION_TOKENS: &str = "user_email_verification_tokens";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureTokenKind {
    PasswordReset,
    EmailVerification,
}

impl SecureTokenKind {
    pub fn collection_name(&self) -> &'static str {
        match self {
            Self::PasswordReset => PASSWORD_RESET_TOKENS,
            Self::EmailVerification => EMAIL_VERIFICATION_TOKENS,
        }
    }
}

/// One outstanding token per user; issuing again replaces the row.
///
/// `_id` is left to the server so replacement upserts never alter it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureToken {
    pub user_uid: String,
    pub token_digest: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl SecureToken {
    pub fn new(user_uid: impl Into<String>, token_digest: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            user_uid: user_uid.into(),
            token_digest: token_digest.into(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_window() {
        let token = SecureToken::new("u1", "digest", Duration::hours(1));
        assert_eq!(token.expires_at - token.created_at, Duration::hours(1));
        assert!(!token.is_expired_at(Utc::now()));
        assert!(token.is_expired_at(token.expires_at));
        assert!(token.is_expired_at(Utc::now() + Duration::minutes(61)));
    }

    #[test]
    fn test_serialized_without_id() {
        let token = SecureToken::new("u1", "digest", Duration::hours(1));
        let doc = bson::to_document(&token).unwrap();
        assert!(doc.get("_id").is_none());
        assert!(doc.get_datetime("expires_at").is_ok());
    }
}
