//! User Address Repository

use bson::doc;
use futures::TryStreamExt;
use mongodb::{Collection, Database};

use crate::address::entity::{UserAddress, USER_ADDRESSES};
use crate::shared::error::{PlatformError, Result};

pub struct AddressRepository {
    collection: Collection<UserAddress>,
}

impl AddressRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(USER_ADDRESSES),
        }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<UserAddress>> {
        Ok(self
            .collection
            .find(doc! { "user_id": user_id })
            .sort(doc! { "is_default_shipping_address": -1, "created_at": 1 })
            .await?
            .try_collect()
            .await?)
    }

    pub async fn find_default(&self, user_id: &str) -> Result<Option<UserAddress>> {
        Ok(self
            .collection
            .find_one(doc! { "user_id": user_id, "is_default_shipping_address": true })
            .await?)
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<()> {
        let result = self.collection.delete_one(doc! { "_id": id, "user_id": user_id }).await?;
        if result.deleted_count == 0 {
            return Err(PlatformError::not_found("Address", id));
        }
        Ok(())
    }
}
