//! Notification Settings Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::ids::new_id;

pub const NOTIFICATION_SETTINGS: &str = "user_notification_settings";

/// One of the per-user notification toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationToggle {
    NewMessage,
    NewFollower,
    ListingExpirationNotice,
    SellerActivity,
    NewsAndFeatures,
}

impl NotificationToggle {
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::NewMessage => "new_message",
            Self::NewFollower => "new_follower",
            Self::ListingExpirationNotice => "listing_expiration_notice",
            Self::SellerActivity => "seller_activity",
            Self::NewsAndFeatures => "news_and_features",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NotificationToggles {
    pub new_message: bool,
    pub new_follower: bool,
    pub listing_expiration_notice: bool,
    pub seller_activity: bool,
    pub news_and_features: bool,
}

impl Default for NotificationToggles {
    fn default() -> Self {
        Self {
            new_message: true,
            new_follower: true,
            listing_expiration_notice: true,
            seller_activity: true,
            news_and_features: false,
        }
    }
}

impl NotificationToggles {
    pub fn to_set_document(&self) -> bson::Document {
        bson::doc! {
            "new_message": self.new_message,
            "new_follower": self.new_follower,
            "listing_expiration_notice": self.listing_expiration_notice,
            "seller_activity": self.seller_activity,
            "news_and_features": self.news_and_features,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub new_message: bool,
    pub new_follower: bool,
    pub listing_expiration_notice: bool,
    pub seller_activity: bool,
    pub news_and_features: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl NotificationSettings {
    pub fn new(user_id: impl Into<String>, toggles: NotificationToggles) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            new_message: toggles.new_message,
            new_follower: toggles.new_follower,
            listing_expiration_notice: toggles.listing_expiration_notice,
            seller_activity: toggles.seller_activity,
            news_and_features: toggles.news_and_features,
            modified_at: Utc::now(),
        }
    }

    pub fn toggles(&self) -> NotificationToggles {
        NotificationToggles {
            new_message: self.new_message,
            new_follower: self.new_follower,
            listing_expiration_notice: self.listing_expiration_notice,
            seller_activity: self.seller_activity,
            news_and_features: self.news_and_features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_match_stored_document() {
        let settings = NotificationSettings::new("u1", NotificationToggles::default());
        let doc = bson::to_document(&settings).unwrap();
        for toggle in [
            NotificationToggle::NewMessage,
            NotificationToggle::NewFollower,
            NotificationToggle::ListingExpirationNotice,
            NotificationToggle::SellerActivity,
            NotificationToggle::NewsAndFeatures,
        ] {
            assert!(doc.get_bool(toggle.field_name()).is_ok(), "{}", toggle.field_name());
        }
    }

    #[test]
    fn test_toggle_names_round_trip_through_json() {
        let toggle: NotificationToggle = serde_json::from_str("\"seller_activity\"").unwrap();
        assert_eq!(toggle.field_name(), "seller_activity");
    }
}
