//! Shipping Profile Repository

use bson::doc;
use futures::TryStreamExt;
use mongodb::{Collection, Database};

use crate::shared::error::{PlatformError, Result};
use crate::shipping::entity::{ShippingProfile, SHIPPING_PROFILES};

pub struct ShippingProfileRepository {
    collection: Collection<ShippingProfile>,
}

impl ShippingProfileRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(SHIPPING_PROFILES),
        }
    }

    pub async fn insert(&self, profile: &ShippingProfile) -> Result<()> {
        self.collection.insert_one(profile).await?;
        Ok(())
    }

    pub async fn list_by_shop(&self, shop_id: &str) -> Result<Vec<ShippingProfile>> {
        Ok(self
            .collection
            .find(doc! { "shop_id": shop_id })
            .sort(doc! { "created_at": 1 })
            .await?
            .try_collect()
            .await?)
    }

    pub async fn find(&self, shop_id: &str, id: &str) -> Result<Option<ShippingProfile>> {
        Ok(self.collection.find_one(doc! { "_id": id, "shop_id": shop_id }).await?)
    }

    pub async fn get(&self, shop_id: &str, id: &str) -> Result<ShippingProfile> {
        self.find(shop_id, id)
            .await?
            .ok_or_else(|| PlatformError::not_found("ShippingProfile", id))
    }

    pub async fn replace(&self, profile: &ShippingProfile) -> Result<()> {
        let result = self
            .collection
            .replace_one(doc! { "_id": &profile.id, "shop_id": &profile.shop_id }, profile)
            .await?;
        if result.matched_count == 0 {
            return Err(PlatformError::not_found("ShippingProfile", &profile.id));
        }
        Ok(())
    }

    pub async fn delete(&self, shop_id: &str, id: &str) -> Result<()> {
        let result = self.collection.delete_one(doc! { "_id": id, "shop_id": shop_id }).await?;
        if result.deleted_count == 0 {
            return Err(PlatformError::not_found("ShippingProfile", id));
        }
        Ok(())
    }
}
