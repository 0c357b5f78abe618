//! Payment Information Entity
//!
//! Seller payout bank accounts.

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::default_flag::DefaultFlagged;
use crate::shared::error::Result;
use crate::shared::ids::new_id;
use crate::shared::validation::{max_chars, require_non_empty, validate_account_number};

pub const PAYMENT_INFORMATION: &str = "user_payment_information";

pub const MAX_PAYMENT_ACCOUNTS_PER_USER: u64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInformation {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl PaymentInformation {
    pub fn new(user_id: impl Into<String>, input: PaymentInput) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            user_id: user_id.into(),
            bank_name: input.bank_name.trim().to_string(),
            account_name: input.account_name.trim().to_string(),
            account_number: input.account_number.trim().to_string(),
            is_default: input.is_default,
            created_at: now,
            modified_at: now,
        }
    }
}

impl DefaultFlagged for PaymentInformation {
    const COLLECTION: &'static str = PAYMENT_INFORMATION;
    const DEFAULT_FIELD: &'static str = "is_default";
    const LIMIT: u64 = MAX_PAYMENT_ACCOUNTS_PER_USER;
    const ENTITY: &'static str = "payment information";

    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn is_default(&self) -> bool {
        self.is_default
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentInput {
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    #[serde(default)]
    pub is_default: bool,
}

impl PaymentInput {
    pub fn validate(&self) -> Result<()> {
        require_non_empty("bank_name", &self.bank_name)?;
        max_chars("bank_name", &self.bank_name, 100)?;
        require_non_empty("account_name", &self.account_name)?;
        max_chars("account_name", &self.account_name, 100)?;
        validate_account_number(self.account_number.trim())
    }

    pub fn to_set_document(&self) -> bson::Document {
        bson::doc! {
            "bank_name": self.bank_name.trim(),
            "account_name": self.account_name.trim(),
            "account_number": self.account_number.trim(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_number_checked() {
        let mut input = PaymentInput {
            bank_name: "First Bank".into(),
            account_name: "Ada Lovelace".into(),
            account_number: "0123456789".into(),
            is_default: false,
        };
        assert!(input.validate().is_ok());
        input.account_number = "012345678".into();
        assert!(input.validate().is_err());
        input.account_number = "01234567a9".into();
        assert!(input.validate().is_err());
    }
}
