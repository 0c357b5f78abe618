//! Wishlist Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::ids::new_id;

pub const USER_WISHLISTS: &str = "user_wishlists";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserWishlist {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub listing_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserWishlist {
    pub fn new(user_id: impl Into<String>, listing_id: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            user_id: user_id.into(),
            listing_id: listing_id.into(),
            created_at: Utc::now(),
        }
    }
}
