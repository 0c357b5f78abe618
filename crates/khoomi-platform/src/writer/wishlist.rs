//! Wishlist protocols
//!
//! `Listing.favorers_count` equals the number of wishlist rows for it.

use bson::doc;
use mongodb::{ClientSession, Collection};
use tracing::info;

use super::{on_duplicate, AggregateWriter};
use crate::shared::error::{PlatformError, Result};
use crate::wishlist::entity::{UserWishlist, USER_WISHLISTS};

impl AggregateWriter {
    fn wishlists(&self) -> Collection<UserWishlist> {
        self.store.collection(USER_WISHLISTS)
    }

    pub async fn add_to_wishlist(&self, user_id: &str, listing_id: &str) -> Result<UserWishlist> {
        let mut session = self.store.begin().await?;
        let outcome = self.add_to_wishlist_steps(&mut session, user_id, listing_id).await;
        let item = self.store.settle(session, outcome).await?;
        info!(user_id = %user_id, listing_id = %listing_id, "Wishlist item added");
        Ok(item)
    }

    async fn add_to_wishlist_steps(
        &self,
        session: &mut ClientSession,
        user_id: &str,
        listing_id: &str,
    ) -> Result<UserWishlist> {
        let item = UserWishlist::new(user_id, listing_id);
        self.wishlists()
            .insert_one(&item)
            .session(&mut *session)
            .await
            .map_err(|e| on_duplicate(e, || PlatformError::conflict("ALREADY_IN_WISHLIST", "listing is already in the wishlist")))?;

        let updated = self
            .listings()
            .update_one(doc! { "_id": listing_id }, doc! { "$inc": { "favorers_count": 1 } })
            .session(&mut *session)
            .await?;
        if updated.matched_count == 0 {
            return Err(PlatformError::not_found("Listing", listing_id));
        }
        Ok(item)
    }

    pub async fn remove_from_wishlist(&self, user_id: &str, listing_id: &str) -> Result<()> {
        let mut session = self.store.begin().await?;
        let outcome = self.remove_from_wishlist_steps(&mut session, user_id, listing_id).await;
        self.store.settle(session, outcome).await?;
        info!(user_id = %user_id, listing_id = %listing_id, "Wishlist item removed");
        Ok(())
    }

    async fn remove_from_wishlist_steps(&self, session: &mut ClientSession, user_id: &str, listing_id: &str) -> Result<()> {
        let deleted = self
            .wishlists()
            .delete_one(doc! { "user_id": user_id, "listing_id": listing_id })
            .session(&mut *session)
            .await?;
        if deleted.deleted_count == 0 {
            return Err(PlatformError::not_found("Wishlist item", listing_id));
        }

        self.listings()
            .update_one(
                doc! { "_id": listing_id, "favorers_count": { "$gt": 0 } },
                doc! { "$inc": { "favorers_count": -1 } },
            )
            .session(&mut *session)
            .await?;
        Ok(())
    }
}
