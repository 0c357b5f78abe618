//! Listing Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::error::{PlatformError, Result};
use crate::shared::ids::new_id;
use crate::shared::slug::slugify;
use crate::shared::validation::{max_chars, require_non_empty};
use crate::shop::entity::ReviewExcerpt;

pub const LISTINGS: &str = "listings";

pub const LISTING_CURRENCY: &str = "NGN";

/// Listings run for four months before they need renewing.
pub const LISTING_LIFETIME_DAYS: i64 = 120;

pub const MAX_LISTING_IMAGES: usize = 10;
const MAX_TAGS: usize = 13;
const MAX_TAG_CHARS: usize = 20;
const MAX_QUANTITY: i32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ListingState {
    Active,
    Inactive,
    Draft,
    SoldOut,
}

impl ListingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Draft => "draft",
            Self::SoldOut => "sold_out",
        }
    }

    /// `draft → active`, `active ⇄ inactive`, `active → sold_out`
    pub fn can_transition_to(&self, next: ListingState) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Active)
                | (Self::Active, Self::Inactive)
                | (Self::Inactive, Self::Active)
                | (Self::Active, Self::SoldOut)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ListingCondition {
    New,
    Used,
    Refurbished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WhoMade {
    IDid,
    Collective,
    SomeoneElse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingStatus {
    pub state: ListingState,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub state_updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListingDetails {
    pub title: String,
    pub slug: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub category: String,
    pub condition: ListingCondition,
    pub who_made: WhoMade,
    /// e.g. `made_to_order`, `2020_2024`
    pub when_made: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessingBlock {
    pub processing_min: i32,
    pub processing_max: i32,
    pub processing_unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Inventory {
    pub price: f64,
    pub quantity: i32,
    #[serde(default)]
    pub sku: String,
    pub currency_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Variation {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Personalization {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub char_limit: i32,
    #[serde(default)]
    pub is_optional: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDates {
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub ending_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "_id")]
    pub id: String,
    pub shop_id: String,
    pub user_id: String,
    pub state: ListingStatus,
    pub details: ListingDetails,
    #[serde(default)]
    pub main_image: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    /// Media handles of every uploaded image, for cleanup on delete
    #[serde(default)]
    pub image_handles: Vec<String>,
    pub processing: ProcessingBlock,
    pub inventory: Inventory,
    #[serde(default)]
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub has_variations: bool,
    #[serde(default)]
    pub personalization: Personalization,
    #[serde(default)]
    pub shipping_profile_id: Option<String>,
    #[serde(default)]
    pub rating: RatingSummary,
    #[serde(default)]
    pub favorers_count: i64,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub auto_renew: bool,
    #[serde(default)]
    pub recent_reviews: Vec<ReviewExcerpt>,
    pub date: ListingDates,
}

/// JSON `data` part of the create-listing form
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ListingInput {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub category: String,
    pub condition: ListingCondition,
    pub who_made: WhoMade,
    pub when_made: String,
    pub processing: ProcessingBlock,
    pub price: f64,
    pub quantity: i32,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub personalization: Personalization,
    #[serde(default)]
    pub shipping_profile_id: Option<String>,
    #[serde(default)]
    pub auto_renew: bool,
}

impl ListingInput {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("title", &self.title)?;
        max_chars("title", &self.title, 140)?;
        if slugify(&self.title).is_empty() {
            return Err(PlatformError::validation("title must contain letters or digits"));
        }
        require_non_empty("description", &self.description)?;
        max_chars("description", &self.description, 5000)?;
        require_non_empty("category", &self.category)?;
        require_non_empty("when_made", &self.when_made)?;

        if self.tags.len() > MAX_TAGS {
            return Err(PlatformError::validation(format!("at most {} tags are allowed", MAX_TAGS)));
        }
        for tag in &self.tags {
            require_non_empty("tag", tag)?;
            max_chars("tag", tag, MAX_TAG_CHARS)?;
        }

        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(PlatformError::validation("price must be greater than zero"));
        }
        if !(1..=MAX_QUANTITY).contains(&self.quantity) {
            return Err(PlatformError::validation(format!(
                "quantity must be between 1 and {}",
                MAX_QUANTITY
            )));
        }
        if self.processing.processing_min < 1 || self.processing.processing_max < self.processing.processing_min {
            return Err(PlatformError::validation("processing time must satisfy 1 <= min <= max"));
        }
        for variation in &self.variations {
            require_non_empty("variation name", &variation.name)?;
            require_non_empty("variation value", &variation.value)?;
            if variation.price.is_some_and(|p| !p.is_finite() || p <= 0.0) {
                return Err(PlatformError::validation("variation price must be greater than zero"));
            }
        }
        if self.personalization.enabled && self.personalization.char_limit < 1 {
            return Err(PlatformError::validation("personalization char_limit must be positive"));
        }
        Ok(())
    }
}

/// Uploaded images attached to a new listing
#[derive(Debug, Clone, Default)]
pub struct ListingImages {
    pub main_image: Option<String>,
    pub images: Vec<String>,
    pub handles: Vec<String>,
}

impl Listing {
    pub fn new(shop_id: impl Into<String>, user_id: impl Into<String>, input: ListingInput, uploaded: ListingImages) -> Self {
        let now = Utc::now();
        let title = input.title.trim().to_string();
        Self {
            id: new_id(),
            shop_id: shop_id.into(),
            user_id: user_id.into(),
            state: ListingStatus {
                state: ListingState::Active,
                state_updated_at: now,
            },
            details: ListingDetails {
                slug: slugify(&title),
                title,
                description: input.description.trim().to_string(),
                tags: input.tags.iter().map(|t| t.trim().to_lowercase()).collect(),
                keywords: input.keywords.iter().map(|k| k.trim().to_lowercase()).collect(),
                category: input.category.trim().to_lowercase(),
                condition: input.condition,
                who_made: input.who_made,
                when_made: input.when_made,
            },
            main_image: uploaded.main_image,
            images: uploaded.images,
            image_handles: uploaded.handles,
            processing: input.processing,
            inventory: Inventory {
                price: input.price,
                quantity: input.quantity,
                sku: input.sku,
                currency_code: LISTING_CURRENCY.to_string(),
            },
            has_variations: !input.variations.is_empty(),
            variations: input.variations,
            personalization: input.personalization,
            shipping_profile_id: input.shipping_profile_id,
            rating: RatingSummary::default(),
            favorers_count: 0,
            views: 0,
            auto_renew: input.auto_renew,
            recent_reviews: Vec::new(),
            date: ListingDates {
                created_at: now,
                ending_at: now + Duration::days(LISTING_LIFETIME_DAYS),
                modified_at: now,
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.state == ListingState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ListingInput {
        ListingInput {
            title: "Hand-thrown Mug".into(),
            description: "Stoneware mug".into(),
            tags: vec!["Mug".into(), "ceramic".into()],
            keywords: vec![],
            category: "Home-Living".into(),
            condition: ListingCondition::New,
            who_made: WhoMade::IDid,
            when_made: "made_to_order".into(),
            processing: ProcessingBlock {
                processing_min: 1,
                processing_max: 3,
                processing_unit: "business_days".into(),
            },
            price: 12500.0,
            quantity: 4,
            sku: "MUG-1".into(),
            variations: vec![],
            personalization: Personalization::default(),
            shipping_profile_id: None,
            auto_renew: false,
        }
    }

    #[test]
    fn test_new_listing_defaults() {
        let listing = Listing::new("s1", "u1", input(), ListingImages::default());
        assert!(listing.is_active());
        assert_eq!(listing.details.slug, "hand-thrown-mug");
        assert_eq!(listing.details.category, "home-living");
        assert_eq!(listing.details.tags, vec!["mug", "ceramic"]);
        assert_eq!(listing.inventory.currency_code, "NGN");
        assert_eq!(listing.favorers_count, 0);
        assert_eq!(listing.views, 0);
        assert!(!listing.has_variations);
        assert_eq!(
            listing.date.ending_at - listing.date.created_at,
            Duration::days(LISTING_LIFETIME_DAYS)
        );
    }

    #[test]
    fn test_input_validation() {
        assert!(input().validate().is_ok());

        let mut bad = input();
        bad.price = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.quantity = 0;
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.tags = (0..14).map(|i| format!("t{}", i)).collect();
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.title = "!!!".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_state_machine() {
        use ListingState::*;
        assert!(Draft.can_transition_to(Active));
        assert!(Active.can_transition_to(Inactive));
        assert!(Inactive.can_transition_to(Active));
        assert!(Active.can_transition_to(SoldOut));
        assert!(!SoldOut.can_transition_to(Active));
        assert!(!Draft.can_transition_to(Inactive));
        assert!(!Inactive.can_transition_to(SoldOut));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(ListingState::SoldOut.as_str(), "sold_out");
        let json = serde_json::to_string(&WhoMade::IDid).unwrap();
        assert_eq!(json, "\"i_did\"");
    }
}
