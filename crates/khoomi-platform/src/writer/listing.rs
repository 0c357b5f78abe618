//! Listing protocols
//!
//! `Shop.listing_active_count` tracks the number of the shop's listings in
//! the `active` state.

use bson::doc;
use mongodb::{options::ReturnDocument, ClientSession, Collection};
use tracing::info;

use super::AggregateWriter;
use crate::listing::entity::{Listing, ListingImages, ListingInput, ListingState, LISTINGS, MAX_LISTING_IMAGES};
use crate::media::{self, MediaSource};
use crate::shared::error::{PlatformError, Result};
use crate::shipping::repository::ShippingProfileRepository;
use crate::wishlist::entity::{UserWishlist, USER_WISHLISTS};

impl AggregateWriter {
    pub(super) fn listings(&self) -> Collection<Listing> {
        self.store.collection(LISTINGS)
    }

    /// Upload images, then insert the listing and bump the shop's active
    /// count. Uploads are deleted again if the insert fails.
    pub async fn create_listing(
        &self,
        user_id: &str,
        shop_id: &str,
        input: ListingInput,
        main_image: Option<MediaSource>,
        images: Vec<MediaSource>,
    ) -> Result<Listing> {
        input.validate()?;
        if images.len() > MAX_LISTING_IMAGES {
            return Err(PlatformError::validation(format!(
                "at most {} images are allowed",
                MAX_LISTING_IMAGES
            )));
        }
        if let Some(profile_id) = input.shipping_profile_id.as_deref() {
            ShippingProfileRepository::new(self.store.database())
                .find(shop_id, profile_id)
                .await?
                .ok_or_else(|| PlatformError::validation(format!("unknown shipping profile '{}'", profile_id)))?;
        }

        let uploaded = self.upload_listing_images(main_image, images).await?;
        let handles = uploaded.handles.clone();
        let listing = Listing::new(shop_id, user_id, input, uploaded);

        let listing = media::with_rollback(self.media(), &handles, async {
            let mut session = self.store.begin().await?;
            let outcome = self.create_listing_steps(&mut session, &listing).await;
            self.store.settle(session, outcome).await?;
            Ok::<_, PlatformError>(listing)
        })
        .await?;

        info!(listing_id = %listing.id, shop_id = %shop_id, images = handles.len(), "Listing created");
        Ok(listing)
    }

    async fn upload_listing_images(&self, main_image: Option<MediaSource>, images: Vec<MediaSource>) -> Result<ListingImages> {
        let folder = self.media_folder("listings");
        let mut uploaded = ListingImages::default();

        let sources = main_image.into_iter().map(|s| (true, s)).chain(images.into_iter().map(|s| (false, s)));
        for (is_main, source) in sources {
            match self.media.upload(source, &folder).await {
                Ok(asset) => {
                    if is_main {
                        uploaded.main_image = Some(asset.url);
                    } else {
                        uploaded.images.push(asset.url);
                    }
                    uploaded.handles.push(asset.handle);
                }
                Err(e) => {
                    media::discard(self.media(), &uploaded.handles).await;
                    return Err(e);
                }
            }
        }
        Ok(uploaded)
    }

    async fn create_listing_steps(&self, session: &mut ClientSession, listing: &Listing) -> Result<()> {
        self.listings().insert_one(listing).session(&mut *session).await?;
        self.adjust_active_count(session, &listing.shop_id, i64::from(listing.is_active()))
            .await
    }

    /// Move a listing along its state machine.
    pub async fn change_listing_state(&self, shop_id: &str, listing_id: &str, next: ListingState) -> Result<Listing> {
        let mut session = self.store.begin().await?;
        let outcome = self.change_state_steps(&mut session, shop_id, listing_id, next).await;
        let listing = self.store.settle(session, outcome).await?;
        info!(listing_id = %listing_id, state = next.as_str(), "Listing state changed");
        Ok(listing)
    }

    async fn change_state_steps(
        &self,
        session: &mut ClientSession,
        shop_id: &str,
        listing_id: &str,
        next: ListingState,
    ) -> Result<Listing> {
        let current = self
            .listings()
            .find_one(doc! { "_id": listing_id, "shop_id": shop_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| PlatformError::not_found("Listing", listing_id))?;

        let from = current.state.state;
        if !from.can_transition_to(next) {
            return Err(PlatformError::unprocessable(format!(
                "cannot change listing state from {} to {}",
                from.as_str(),
                next.as_str()
            )));
        }

        let now = bson::DateTime::now();
        let updated = self
            .listings()
            .find_one_and_update(
                doc! { "_id": listing_id, "state.state": from.as_str() },
                doc! { "$set": {
                    "state.state": next.as_str(),
                    "state.state_updated_at": now,
                    "date.modified_at": now,
                } },
            )
            .return_document(ReturnDocument::After)
            .session(&mut *session)
            .await?
            .ok_or_else(|| PlatformError::not_found("Listing", listing_id))?;

        let delta = active_delta(from, next);
        if delta != 0 {
            self.adjust_active_count(session, shop_id, delta).await?;
        }
        Ok(updated)
    }

    /// Delete the listing and the wishlist rows pointing at it, then its images.
    pub async fn delete_listing(&self, shop_id: &str, listing_id: &str) -> Result<()> {
        let mut session = self.store.begin().await?;
        let outcome = self.delete_listing_steps(&mut session, shop_id, listing_id).await;
        let removed = self.store.settle(session, outcome).await?;

        media::discard(self.media(), &removed.image_handles).await;
        info!(listing_id = %listing_id, shop_id = %shop_id, "Listing deleted");
        Ok(())
    }

    async fn delete_listing_steps(&self, session: &mut ClientSession, shop_id: &str, listing_id: &str) -> Result<Listing> {
        let removed = self
            .listings()
            .find_one_and_delete(doc! { "_id": listing_id, "shop_id": shop_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| PlatformError::not_found("Listing", listing_id))?;

        self.store
            .collection::<UserWishlist>(USER_WISHLISTS)
            .delete_many(doc! { "listing_id": listing_id })
            .session(&mut *session)
            .await?;

        if removed.is_active() {
            self.adjust_active_count(session, shop_id, -1).await?;
        }
        Ok(removed)
    }

    async fn adjust_active_count(&self, session: &mut ClientSession, shop_id: &str, delta: i64) -> Result<()> {
        let mut filter = doc! { "_id": shop_id };
        if delta < 0 {
            filter.insert("listing_active_count", doc! { "$gte": -delta });
        }
        let result = self
            .shops()
            .update_one(
                filter,
                doc! {
                    "$inc": { "listing_active_count": delta },
                    "$set": { "modified_at": bson::DateTime::now() },
                },
            )
            .session(&mut *session)
            .await?;
        if result.matched_count == 0 {
            return Err(PlatformError::not_found("Shop", shop_id));
        }
        Ok(())
    }
}

/// Change in the active count when a listing moves from `from` to `to`.
fn active_delta(from: ListingState, to: ListingState) -> i64 {
    i64::from(to == ListingState::Active) - i64::from(from == ListingState::Active)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_delta() {
        assert_eq!(active_delta(ListingState::Draft, ListingState::Active), 1);
        assert_eq!(active_delta(ListingState::Active, ListingState::Inactive), -1);
        assert_eq!(active_delta(ListingState::Active, ListingState::SoldOut), -1);
        assert_eq!(active_delta(ListingState::Inactive, ListingState::Active), 1);
    }
}
