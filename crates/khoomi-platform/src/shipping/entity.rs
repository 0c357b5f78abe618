//! Shipping Profile Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::error::{PlatformError, Result};
use crate::shared::ids::new_id;
use crate::shared::validation::{max_chars, require_non_empty};
use crate::shop::return_policy::ReturnPolicyTerms;

pub const SHIPPING_PROFILES: &str = "shop_shipping_profiles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingTimeUnit {
    BusinessDays,
    Weeks,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShippingProfileInput {
    pub title: String,
    pub min_processing_time: i32,
    pub max_processing_time: i32,
    pub processing_time_unit: ProcessingTimeUnit,
    #[serde(default)]
    pub handling_fee: f64,
    pub origin_state: String,
    pub origin_postal_code: String,
    pub min_delivery_days: i32,
    pub max_delivery_days: i32,
    pub primary_price: f64,
    #[serde(default)]
    pub secondary_price: f64,
    #[serde(default)]
    pub destinations: Vec<String>,
    pub shipping_service: String,
    #[serde(default)]
    pub offers_free_shipping: bool,
    #[serde(default)]
    pub auto_calculate_price: bool,
    pub return_policy: ReturnPolicyTerms,
}

impl ShippingProfileInput {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("title", &self.title)?;
        max_chars("title", &self.title, 100)?;
        require_non_empty("origin_state", &self.origin_state)?;
        require_non_empty("origin_postal_code", &self.origin_postal_code)?;
        require_non_empty("shipping_service", &self.shipping_service)?;
        check_range("processing time", self.min_processing_time, self.max_processing_time)?;
        check_range("delivery days", self.min_delivery_days, self.max_delivery_days)?;
        for (field, amount) in [
            ("handling_fee", self.handling_fee),
            ("primary_price", self.primary_price),
            ("secondary_price", self.secondary_price),
        ] {
            if !amount.is_finite() || amount < 0.0 {
                return Err(PlatformError::validation(format!("{} must be a non-negative amount", field)));
            }
        }
        if self.offers_free_shipping && self.primary_price > 0.0 {
            return Err(PlatformError::unprocessable(
                "primary_price must be 0 when free shipping is offered",
            ));
        }
        self.return_policy.validate()
    }
}

fn check_range(label: &str, min: i32, max: i32) -> Result<()> {
    if min < 1 || max < min {
        return Err(PlatformError::validation(format!(
            "{} must satisfy 1 <= min <= max",
            label
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub shop_id: String,
    pub title: String,
    pub min_processing_time: i32,
    pub max_processing_time: i32,
    pub processing_time_unit: ProcessingTimeUnit,
    pub handling_fee: f64,
    pub origin_state: String,
    pub origin_postal_code: String,
    pub min_delivery_days: i32,
    pub max_delivery_days: i32,
    pub primary_price: f64,
    pub secondary_price: f64,
    #[serde(default)]
    pub destinations: Vec<String>,
    pub shipping_service: String,
    #[serde(default)]
    pub offers_free_shipping: bool,
    #[serde(default)]
    pub auto_calculate_price: bool,
    pub return_policy: ReturnPolicyTerms,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl ShippingProfile {
    pub fn new(shop_id: impl Into<String>, input: ShippingProfileInput) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            shop_id: shop_id.into(),
            title: input.title.trim().to_string(),
            min_processing_time: input.min_processing_time,
            max_processing_time: input.max_processing_time,
            processing_time_unit: input.processing_time_unit,
            handling_fee: input.handling_fee,
            origin_state: input.origin_state.trim().to_string(),
            origin_postal_code: input.origin_postal_code.trim().to_string(),
            min_delivery_days: input.min_delivery_days,
            max_delivery_days: input.max_delivery_days,
            primary_price: input.primary_price,
            secondary_price: input.secondary_price,
            destinations: input.destinations,
            shipping_service: input.shipping_service.trim().to_string(),
            offers_free_shipping: input.offers_free_shipping,
            auto_calculate_price: input.auto_calculate_price,
            return_policy: input.return_policy,
            created_at: now,
            modified_at: now,
        }
    }

    /// Replace every editable field from `input`, keeping identity and creation time.
    pub fn apply(&mut self, input: ShippingProfileInput) {
        let replacement = Self::new(self.shop_id.clone(), input);
        *self = Self {
            id: std::mem::take(&mut self.id),
            created_at: self.created_at,
            ..replacement
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ShippingProfileInput {
        ShippingProfileInput {
            title: "Standard".into(),
            min_processing_time: 1,
            max_processing_time: 3,
            processing_time_unit: ProcessingTimeUnit::BusinessDays,
            handling_fee: 0.0,
            origin_state: "Lagos".into(),
            origin_postal_code: "100001".into(),
            min_delivery_days: 2,
            max_delivery_days: 7,
            primary_price: 1500.0,
            secondary_price: 500.0,
            destinations: vec!["NG".into()],
            shipping_service: "GIG Logistics".into(),
            offers_free_shipping: false,
            auto_calculate_price: false,
            return_policy: ReturnPolicyTerms { accepts_returns: true, accepts_exchanges: false, deadline: 14 },
        }
    }

    #[test]
    fn test_valid_profile() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn test_inverted_ranges_rejected() {
        let mut bad = input();
        bad.max_processing_time = 0;
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.min_delivery_days = 9;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_free_shipping_requires_zero_price() {
        let mut bad = input();
        bad.offers_free_shipping = true;
        assert!(matches!(bad.validate(), Err(PlatformError::Unprocessable { .. })));
    }

    #[test]
    fn test_apply_keeps_identity() {
        let mut profile = ShippingProfile::new("s1", input());
        let id = profile.id.clone();
        let created = profile.created_at;
        let mut changed = input();
        changed.title = "Express".into();
        profile.apply(changed);
        assert_eq!(profile.id, id);
        assert_eq!(profile.created_at, created);
        assert_eq!(profile.title, "Express");
        assert_eq!(profile.shop_id, "s1");
    }
}
