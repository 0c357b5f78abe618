//! Payment Information Repository

use bson::doc;
use futures::TryStreamExt;
use mongodb::{Collection, Database};

use crate::payment::entity::{PaymentInformation, PAYMENT_INFORMATION};
use crate::shared::error::{PlatformError, Result};

pub struct PaymentRepository {
    collection: Collection<PaymentInformation>,
}

impl PaymentRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(PAYMENT_INFORMATION),
        }
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<PaymentInformation>> {
        Ok(self
            .collection
            .find(doc! { "user_id": user_id })
            .sort(doc! { "is_default": -1, "created_at": 1 })
            .await?
            .try_collect()
            .await?)
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<()> {
        let result = self.collection.delete_one(doc! { "_id": id, "user_id": user_id }).await?;
        if result.deleted_count == 0 {
            return Err(PlatformError::not_found("PaymentInformation", id));
        }
        Ok(())
    }
}
