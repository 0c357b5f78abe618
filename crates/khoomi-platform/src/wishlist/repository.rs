//! Wishlist Repository

use bson::doc;
use futures::TryStreamExt;
use mongodb::{Collection, Database};

use crate::shared::api_common::{Page, PagedResponse};
use crate::shared::error::Result;
use crate::wishlist::entity::{UserWishlist, USER_WISHLISTS};

pub struct WishlistRepository {
    collection: Collection<UserWishlist>,
}

impl WishlistRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(USER_WISHLISTS),
        }
    }

    pub async fn list(&self, user_id: &str, page: &Page) -> Result<PagedResponse<UserWishlist>> {
        let filter = doc! { "user_id": user_id };
        let total = self.collection.count_documents(filter.clone()).await?;
        let items = self
            .collection
            .find(filter)
            .sort(page.sort.clone())
            .skip(page.skip)
            .limit(page.limit)
            .await?
            .try_collect()
            .await?;
        Ok(PagedResponse::new(items, total, page))
    }
}
