//! Shop return policies

use bson::doc;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{options::ReturnDocument, Collection, Database};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::error::{PlatformError, Result};
use crate::shared::ids::new_id;

pub const SHOP_RETURN_POLICIES: &str = "shop_return_policies";

/// Longest return window a shop may offer, in days
pub const MAX_RETURN_DEADLINE_DAYS: i32 = 90;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReturnPolicyTerms {
    pub accepts_returns: bool,
    pub accepts_exchanges: bool,
    /// Days after delivery
    pub deadline: i32,
}

impl ReturnPolicyTerms {
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_RETURN_DEADLINE_DAYS).contains(&self.deadline) {
            return Err(PlatformError::validation(format!(
                "deadline must be between 0 and {} days",
                MAX_RETURN_DEADLINE_DAYS
            )));
        }
        if (self.accepts_returns || self.accepts_exchanges) && self.deadline == 0 {
            return Err(PlatformError::validation(
                "deadline is required when returns or exchanges are accepted",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopReturnPolicy {
    #[serde(rename = "_id")]
    pub id: String,
    pub shop_id: String,
    pub accepts_returns: bool,
    pub accepts_exchanges: bool,
    pub deadline: i32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl ShopReturnPolicy {
    pub fn new(shop_id: impl Into<String>, terms: ReturnPolicyTerms) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            shop_id: shop_id.into(),
            accepts_returns: terms.accepts_returns,
            accepts_exchanges: terms.accepts_exchanges,
            deadline: terms.deadline,
            created_at: now,
            modified_at: now,
        }
    }
}

pub struct ReturnPolicyRepository {
    collection: Collection<ShopReturnPolicy>,
}

impl ReturnPolicyRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(SHOP_RETURN_POLICIES),
        }
    }

    pub async fn insert(&self, policy: &ShopReturnPolicy) -> Result<()> {
        self.collection.insert_one(policy).await?;
        Ok(())
    }

    pub async fn list_by_shop(&self, shop_id: &str) -> Result<Vec<ShopReturnPolicy>> {
        Ok(self
            .collection
            .find(doc! { "shop_id": shop_id })
            .sort(doc! { "created_at": 1 })
            .await?
            .try_collect()
            .await?)
    }

    pub async fn update(&self, shop_id: &str, id: &str, terms: &ReturnPolicyTerms) -> Result<ShopReturnPolicy> {
        self.collection
            .find_one_and_update(
                doc! { "_id": id, "shop_id": shop_id },
                doc! { "$set": {
                    "accepts_returns": terms.accepts_returns,
                    "accepts_exchanges": terms.accepts_exchanges,
                    "deadline": terms.deadline,
                    "modified_at": bson::DateTime::now(),
                } },
            )
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| PlatformError::not_found("ShopReturnPolicy", id))
    }

    pub async fn delete(&self, shop_id: &str, id: &str) -> Result<()> {
        let result = self.collection.delete_one(doc! { "_id": id, "shop_id": shop_id }).await?;
        if result.deleted_count == 0 {
            return Err(PlatformError::not_found("ShopReturnPolicy", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terms_validation() {
        let ok = ReturnPolicyTerms { accepts_returns: true, accepts_exchanges: false, deadline: 30 };
        assert!(ok.validate().is_ok());

        let none = ReturnPolicyTerms { accepts_returns: false, accepts_exchanges: false, deadline: 0 };
        assert!(none.validate().is_ok());

        let missing = ReturnPolicyTerms { accepts_returns: false, accepts_exchanges: true, deadline: 0 };
        assert!(missing.validate().is_err());

        let too_long = ReturnPolicyTerms { accepts_returns: true, accepts_exchanges: true, deadline: 91 };
        assert!(too_long.validate().is_err());
    }

    #[test]
    fn test_terms_stored_inline() {
        let policy = ShopReturnPolicy::new(
            "s1",
            ReturnPolicyTerms { accepts_returns: true, accepts_exchanges: true, deadline: 14 },
        );
        let doc = bson::to_document(&policy).unwrap();
        assert_eq!(doc.get_i32("deadline").unwrap(), 14);
        assert!(doc.get_bool("accepts_returns").unwrap());
    }
}
