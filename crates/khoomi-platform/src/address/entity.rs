//! User Address Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::default_flag::DefaultFlagged;
use crate::shared::error::Result;
use crate::shared::ids::new_id;
use crate::shared::validation::{max_chars, require_non_empty};

pub const USER_ADDRESSES: &str = "user_addresses";

pub const MAX_ADDRESSES_PER_USER: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAddress {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub city: String,
    pub state: String,
    pub street: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default_shipping_address: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl UserAddress {
    pub fn new(user_id: impl Into<String>, input: AddressInput) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            user_id: user_id.into(),
            city: input.city.trim().to_string(),
            state: input.state.trim().to_string(),
            street: input.street.trim().to_string(),
            postal_code: input.postal_code.trim().to_string(),
            country: input.country.trim().to_string(),
            is_default_shipping_address: input.is_default_shipping_address,
            created_at: now,
            modified_at: now,
        }
    }
}

impl DefaultFlagged for UserAddress {
    const COLLECTION: &'static str = USER_ADDRESSES;
    const DEFAULT_FIELD: &'static str = "is_default_shipping_address";
    const LIMIT: u64 = MAX_ADDRESSES_PER_USER;
    const ENTITY: &'static str = "address";

    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn is_default(&self) -> bool {
        self.is_default_shipping_address
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddressInput {
    pub city: String,
    pub state: String,
    pub street: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default_shipping_address: bool,
}

impl AddressInput {
    pub fn validate(&self) -> Result<()> {
        for (field, value, max) in [
            ("city", &self.city, 100),
            ("state", &self.state, 100),
            ("street", &self.street, 200),
            ("postal_code", &self.postal_code, 20),
            ("country", &self.country, 100),
        ] {
            require_non_empty(field, value)?;
            max_chars(field, value, max)?;
        }
        Ok(())
    }

    /// `$set` body for an in-place edit; the default flag is handled separately.
    pub fn to_set_document(&self) -> bson::Document {
        bson::doc! {
            "city": self.city.trim(),
            "state": self.state.trim(),
            "street": self.street.trim(),
            "postal_code": self.postal_code.trim(),
            "country": self.country.trim(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            city: "Lagos".into(),
            state: "Lagos".into(),
            street: " 12 Broad St ".into(),
            postal_code: "100001".into(),
            country: "NG".into(),
            is_default_shipping_address: true,
        }
    }

    #[test]
    fn test_validation() {
        assert!(input().validate().is_ok());
        let mut blank = input();
        blank.city = "  ".into();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_new_trims_and_keeps_flag() {
        let address = UserAddress::new("u1", input());
        assert_eq!(address.street, "12 Broad St");
        assert!(address.is_default());
        assert_eq!(address.user_id(), "u1");
    }
}
