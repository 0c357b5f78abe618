//! User Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::ids::new_id;

pub const USERS: &str = "users";
pub const LOGIN_HISTORIES: &str = "user_login_histories";
pub const DELETION_REQUESTS: &str = "user_deletion_requests";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Regular,
    Admin,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Regular
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Inactive,
    Active,
    Banned,
}

impl Default for UserStatus {
    fn default() -> Self {
        Self::Inactive
    }
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Banned => "banned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAuth {
    pub password_digest: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Birthdate {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

impl Birthdate {
    pub fn is_valid(&self) -> bool {
        chrono::NaiveDate::from_ymd_opt(self.year, self.month, self.day).is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub login_name: String,
    pub primary_email: String,
    pub first_name: String,
    pub last_name: String,
    pub auth: UserAuth,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub thumbnail_handle: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub birthdate: Option<Birthdate>,
    #[serde(default)]
    pub is_seller: bool,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub shop_id: Option<String>,
    #[serde(default)]
    pub favorite_shops: Vec<String>,
    #[serde(default)]
    pub transaction_buy_count: i64,
    #[serde(default)]
    pub transaction_sold_count: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<bson::DateTime>,
    #[serde(default)]
    pub last_login_ip: Option<String>,
    #[serde(default)]
    pub login_counts: i64,
    #[serde(default = "default_true")]
    pub allow_login_ip_notification: bool,
}

fn default_true() -> bool {
    true
}

impl User {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        password_digest: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let first_name = first_name.into();
        let last_name = last_name.into();
        Self {
            id: new_id(),
            login_name: generate_login_name(&first_name, &last_name),
            primary_email: email.into(),
            first_name,
            last_name,
            auth: UserAuth {
                password_digest: password_digest.into(),
                email_verified: false,
                modified_at: now,
            },
            thumbnail: None,
            thumbnail_handle: None,
            phone: None,
            bio: None,
            birthdate: None,
            is_seller: false,
            role: UserRole::Regular,
            status: UserStatus::Inactive,
            shop_id: None,
            favorite_shops: Vec::new(),
            transaction_buy_count: 0,
            transaction_sold_count: 0,
            created_at: now,
            modified_at: now,
            last_login: None,
            last_login_ip: None,
            login_counts: 0,
            allow_login_ip_notification: true,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_banned(&self) -> bool {
        self.status == UserStatus::Banned
    }
}

/// Handle derived from the person's name plus a random numeric suffix.
pub fn generate_login_name(first_name: &str, last_name: &str) -> String {
    let base: String = format!("{}{}", first_name, last_name)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(20)
        .collect();
    let base = if base.is_empty() { "user".to_string() } else { base };
    let suffix: u32 = rand::thread_rng().gen_range(1000..100_000);
    format!("{}{}", base, suffix)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginHistory {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_uid: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub date: DateTime<Utc>,
    pub user_agent: String,
    pub ip_addr: String,
}

impl LoginHistory {
    pub fn new(user_uid: impl Into<String>, user_agent: impl Into<String>, ip_addr: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            user_uid: user_uid.into(),
            date: Utc::now(),
            user_agent: user_agent.into(),
            ip_addr: ip_addr.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionRequest {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl DeletionRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = User::new("a@b.co", "Ada", "Lovelace", "digest");
        assert_eq!(user.status, UserStatus::Inactive);
        assert_eq!(user.role, UserRole::Regular);
        assert!(!user.is_seller);
        assert!(!user.auth.email_verified);
        assert!(user.allow_login_ip_notification);
        assert!(user.login_name.starts_with("adalovelace"));
        assert_eq!(user.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_login_name_fallback() {
        let name = generate_login_name("Ñ", "");
        assert!(name.starts_with("user"));
        assert!(name[4..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_birthdate_validation() {
        assert!(Birthdate { day: 29, month: 2, year: 2024 }.is_valid());
        assert!(!Birthdate { day: 29, month: 2, year: 2023 }.is_valid());
        assert!(!Birthdate { day: 1, month: 13, year: 2000 }.is_valid());
    }

    #[test]
    fn test_user_bson_roundtrip_keeps_id_field() {
        let user = User::new("a@b.co", "Ada", "Lovelace", "digest");
        let doc = bson::to_document(&user).unwrap();
        assert_eq!(doc.get_str("_id").unwrap(), user.id);
        assert_eq!(doc.get_document("auth").unwrap().get_bool("email_verified").unwrap(), false);
        assert_eq!(doc.get_str("status").unwrap(), "inactive");
    }
}
