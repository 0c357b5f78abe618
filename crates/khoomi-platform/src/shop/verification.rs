//! Seller identity verification

use bson::doc;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, NaiveDate, Utc};
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::error::{PlatformError, Result};
use crate::shared::ids::new_id;
use crate::shared::validation::{require_non_empty, validate_personal_name};
use crate::store::is_duplicate_key;

pub const SELLER_VERIFICATIONS: &str = "seller_verifications";

const MIN_SELLER_AGE_YEARS: i32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IdCardKind {
    NationalId,
    Passport,
    DriversLicense,
    VotersCard,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VerificationSubmission {
    pub first_name: String,
    pub last_name: String,
    pub id_card_kind: IdCardKind,
    pub id_card_number: String,
    /// `YYYY-MM-DD`
    #[schema(value_type = String, format = Date)]
    pub dob: NaiveDate,
    pub nationality: String,
    pub country_of_residence: String,
}

impl VerificationSubmission {
    pub fn validate(&self, today: NaiveDate) -> Result<()> {
        validate_personal_name("first_name", &self.first_name)?;
        validate_personal_name("last_name", &self.last_name)?;
        require_non_empty("id_card_number", &self.id_card_number)?;
        require_non_empty("nationality", &self.nationality)?;
        require_non_empty("country_of_residence", &self.country_of_residence)?;
        if !is_adult(self.dob, today) {
            return Err(PlatformError::unprocessable(format!(
                "sellers must be at least {} years old",
                MIN_SELLER_AGE_YEARS
            )));
        }
        Ok(())
    }
}

fn is_adult(dob: NaiveDate, today: NaiveDate) -> bool {
    today.years_since(dob).map_or(false, |years| years as i32 >= MIN_SELLER_AGE_YEARS)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerVerification {
    #[serde(rename = "_id")]
    pub id: String,
    pub shop_id: String,
    pub first_name: String,
    pub last_name: String,
    pub id_card_kind: IdCardKind,
    pub id_card_number: String,
    pub dob: String,
    pub nationality: String,
    pub country_of_residence: String,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl SellerVerification {
    pub fn new(shop_id: impl Into<String>, submission: VerificationSubmission) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            shop_id: shop_id.into(),
            first_name: submission.first_name.trim().to_string(),
            last_name: submission.last_name.trim().to_string(),
            id_card_kind: submission.id_card_kind,
            id_card_number: submission.id_card_number.trim().to_string(),
            dob: submission.dob.format("%Y-%m-%d").to_string(),
            nationality: submission.nationality.trim().to_string(),
            country_of_residence: submission.country_of_residence.trim().to_string(),
            is_verified: false,
            created_at: now,
            modified_at: now,
        }
    }
}

pub struct VerificationRepository {
    collection: Collection<SellerVerification>,
}

impl VerificationRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(SELLER_VERIFICATIONS),
        }
    }

    pub async fn insert(&self, verification: &SellerVerification) -> Result<()> {
        self.collection.insert_one(verification).await.map_err(|e| {
            if is_duplicate_key(&e) {
                PlatformError::conflict("VERIFICATION_EXISTS", "verification was already submitted for this shop")
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    pub async fn find_by_shop(&self, shop_id: &str) -> Result<Option<SellerVerification>> {
        Ok(self.collection.find_one(doc! { "shop_id": shop_id }).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(dob: NaiveDate) -> VerificationSubmission {
        VerificationSubmission {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            id_card_kind: IdCardKind::Passport,
            id_card_number: "A1234567".into(),
            dob,
            nationality: "Nigerian".into(),
            country_of_residence: "Nigeria".into(),
        }
    }

    #[test]
    fn test_age_requirement() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let adult = NaiveDate::from_ymd_opt(2006, 6, 1).unwrap();
        let minor = NaiveDate::from_ymd_opt(2006, 6, 2).unwrap();
        assert!(submission(adult).validate(today).is_ok());
        assert!(matches!(
            submission(minor).validate(today),
            Err(PlatformError::Unprocessable { .. })
        ));
    }

    #[test]
    fn test_names_must_be_capitalized() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut s = submission(NaiveDate::from_ymd_opt(1990, 1, 1).unwrap());
        s.first_name = "ada".into();
        assert!(s.validate(today).is_err());
    }

    #[test]
    fn test_dob_stored_as_iso_date() {
        let v = SellerVerification::new("s1", submission(NaiveDate::from_ymd_opt(1990, 1, 9).unwrap()));
        assert_eq!(v.dob, "1990-01-09");
        assert!(!v.is_verified);
    }
}
