//! Shop compliance policy, one per shop.

use bson::doc;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use mongodb::{options::ReturnDocument, Collection, Database};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::error::{PlatformError, Result};
use crate::shared::ids::new_id;
use crate::shared::validation::max_chars;
use crate::store::is_duplicate_key;

pub const SHOP_COMPLIANCE_POLICIES: &str = "shop_compliance_policies";

const MAX_POLICY_CHARS: usize = 5000;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComplianceTerms {
    pub terms_of_use: String,
    pub intellectual_property: String,
    pub seller_policy: String,
}

impl ComplianceTerms {
    pub fn validate(&self) -> Result<()> {
        max_chars("terms_of_use", &self.terms_of_use, MAX_POLICY_CHARS)?;
        max_chars("intellectual_property", &self.intellectual_property, MAX_POLICY_CHARS)?;
        max_chars("seller_policy", &self.seller_policy, MAX_POLICY_CHARS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompliancePolicy {
    #[serde(rename = "_id")]
    pub id: String,
    pub shop_id: String,
    pub terms_of_use: String,
    pub intellectual_property: String,
    pub seller_policy: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl CompliancePolicy {
    pub fn new(shop_id: impl Into<String>, terms: ComplianceTerms) -> Self {
        Self {
            id: new_id(),
            shop_id: shop_id.into(),
            terms_of_use: terms.terms_of_use,
            intellectual_property: terms.intellectual_property,
            seller_policy: terms.seller_policy,
            modified_at: Utc::now(),
        }
    }
}

pub struct ComplianceRepository {
    collection: Collection<CompliancePolicy>,
}

impl ComplianceRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(SHOP_COMPLIANCE_POLICIES),
        }
    }

    pub async fn insert(&self, policy: &CompliancePolicy) -> Result<()> {
        self.collection.insert_one(policy).await.map_err(|e| {
            if is_duplicate_key(&e) {
                PlatformError::conflict("COMPLIANCE_EXISTS", "shop already has a compliance policy")
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    pub async fn find_by_shop(&self, shop_id: &str) -> Result<Option<CompliancePolicy>> {
        Ok(self.collection.find_one(doc! { "shop_id": shop_id }).await?)
    }

    pub async fn update(&self, shop_id: &str, terms: &ComplianceTerms) -> Result<CompliancePolicy> {
        self.collection
            .find_one_and_update(
                doc! { "shop_id": shop_id },
                doc! { "$set": {
                    "terms_of_use": &terms.terms_of_use,
                    "intellectual_property": &terms.intellectual_property,
                    "seller_policy": &terms.seller_policy,
                    "modified_at": bson::DateTime::now(),
                } },
            )
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| PlatformError::not_found("CompliancePolicy", shop_id))
    }
}
