//! Shop Entity
//!
//! The shop document carries denormalized projections of its followers and
//! reviews. Only the aggregate writer changes `followers`, `follower_count`,
//! `recent_reviews`, `reviews_count`, and `listing_active_count`.

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::ids::new_id;
use crate::shared::slug::slugify;

pub const SHOPS: &str = "shops";
pub const SHOP_FOLLOWERS: &str = "shop_followers";
pub const SHOP_REVIEWS: &str = "shop_reviews";

/// Cap on the embedded `followers` and `recent_reviews` arrays
pub const EMBEDDED_EXCERPT_CAP: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShopStatus {
    Active,
    PendingReview,
    Suspended,
}

impl Default for ShopStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl ShopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PendingReview => "pending_review",
            Self::Suspended => "suspended",
        }
    }

    /// `active ⇄ suspended`, `pending_review → active`
    pub fn can_transition_to(&self, next: ShopStatus) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Suspended) | (Self::Suspended, Self::Active) | (Self::PendingReview, Self::Active)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowerExcerpt {
    pub user_id: String,
    pub login_name: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewExcerpt {
    pub user_id: String,
    pub review_author: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    pub review: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShopPolicy {
    #[serde(default)]
    pub payment: String,
    #[serde(default)]
    pub shipping: String,
    #[serde(default)]
    pub refund: String,
    #[serde(default)]
    pub additional_info: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub username: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub logo_handle: Option<String>,
    #[serde(default)]
    pub banner_url: Option<String>,
    #[serde(default)]
    pub banner_handle: Option<String>,
    #[serde(default)]
    pub gallery: Vec<String>,
    #[serde(default)]
    pub announcement: String,
    #[serde(default)]
    pub announcement_modified_at: Option<bson::DateTime>,
    #[serde(default)]
    pub is_vacation: bool,
    #[serde(default)]
    pub vacation_message: String,
    #[serde(default)]
    pub status: ShopStatus,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub follower_count: i64,
    #[serde(default)]
    pub followers: Vec<FollowerExcerpt>,
    #[serde(default)]
    pub reviews_count: i64,
    #[serde(default)]
    pub recent_reviews: Vec<ReviewExcerpt>,
    #[serde(default)]
    pub policy: ShopPolicy,
    #[serde(default)]
    pub listing_active_count: i64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl Shop {
    /// New active shop with empty aggregates. `username` must already be normalized.
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        username: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let username = username.into();
        Self {
            id: new_id(),
            user_id: user_id.into(),
            name: name.into(),
            slug: slugify(&username),
            username,
            description: description.into(),
            logo_url: None,
            logo_handle: None,
            banner_url: None,
            banner_handle: None,
            gallery: Vec::new(),
            announcement: String::new(),
            announcement_modified_at: None,
            is_vacation: false,
            vacation_message: String::new(),
            status: ShopStatus::Active,
            is_live: true,
            follower_count: 0,
            followers: Vec::new(),
            reviews_count: 0,
            recent_reviews: Vec::new(),
            policy: ShopPolicy::default(),
            listing_active_count: 0,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Full follower row; the shop document holds only the newest excerpts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopFollower {
    #[serde(rename = "_id")]
    pub id: String,
    pub shop_id: String,
    pub user_id: String,
    pub login_name: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub joined_at: DateTime<Utc>,
}

impl ShopFollower {
    pub fn excerpt(&self) -> FollowerExcerpt {
        FollowerExcerpt {
            user_id: self.user_id.clone(),
            login_name: self.login_name.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            thumbnail: self.thumbnail.clone(),
            joined_at: self.joined_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Approved,
    Pending,
    Removed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Pending => "pending",
            Self::Removed => "removed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopReview {
    #[serde(rename = "_id")]
    pub id: String,
    pub shop_id: String,
    pub user_id: String,
    pub review_author: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    pub review: String,
    pub status: ReviewStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ShopReview {
    pub fn excerpt(&self) -> ReviewExcerpt {
        ReviewExcerpt {
            user_id: self.user_id.clone(),
            review_author: self.review_author.clone(),
            thumbnail: self.thumbnail.clone(),
            review: self.review.clone(),
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_shop_has_empty_aggregates() {
        let shop = Shop::new("u1", "Clay & Co", "clay-co", "Pots");
        assert_eq!(shop.slug, "clay-co");
        assert_eq!(shop.status, ShopStatus::Active);
        assert_eq!(shop.follower_count, 0);
        assert!(shop.followers.is_empty());
        assert_eq!(shop.reviews_count, 0);
        assert!(shop.recent_reviews.is_empty());
        assert!(shop.is_owned_by("u1"));
        assert!(!shop.is_owned_by("u2"));
    }

    #[test]
    fn test_status_transitions() {
        assert!(ShopStatus::Active.can_transition_to(ShopStatus::Suspended));
        assert!(ShopStatus::Suspended.can_transition_to(ShopStatus::Active));
        assert!(ShopStatus::PendingReview.can_transition_to(ShopStatus::Active));
        assert!(!ShopStatus::Active.can_transition_to(ShopStatus::PendingReview));
        assert!(!ShopStatus::Suspended.can_transition_to(ShopStatus::PendingReview));
        assert!(!ShopStatus::Active.can_transition_to(ShopStatus::Active));
    }

    #[test]
    fn test_status_wire_names() {
        let doc = bson::to_document(&Shop::new("u1", "n", "name", "")).unwrap();
        assert_eq!(doc.get_str("status").unwrap(), "active");
        assert_eq!(ShopStatus::PendingReview.as_str(), "pending_review");
    }
}
