//! Shop reviews
//!
//! `Shop.reviews_count` equals the number of approved reviews and
//! `Shop.recent_reviews` holds excerpts of the newest approved ones.

use bson::doc;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{ClientSession, Collection};
use tracing::info;

use super::{on_duplicate, AggregateWriter};
use crate::shared::error::{PlatformError, Result};
use crate::shared::ids::new_id;
use crate::shared::validation::{max_chars, require_non_empty};
use crate::shop::entity::{ReviewExcerpt, ReviewStatus, ShopReview, EMBEDDED_EXCERPT_CAP, SHOP_REVIEWS};

pub const MAX_REVIEW_CHARS: usize = 1000;

impl AggregateWriter {
    fn shop_reviews(&self) -> Collection<ShopReview> {
        self.store.collection(SHOP_REVIEWS)
    }

    pub async fn create_review(&self, user_id: &str, shop_id: &str, review: &str) -> Result<ShopReview> {
        let review = review.trim();
        require_non_empty("review", review)?;
        max_chars("review", review, MAX_REVIEW_CHARS)?;

        let mut session = self.store.begin().await?;
        let outcome = self.create_review_steps(&mut session, user_id, shop_id, review).await;
        let created = self.store.settle(session, outcome).await?;
        info!(shop_id = %shop_id, user_id = %user_id, "Shop review created");
        Ok(created)
    }

    async fn create_review_steps(
        &self,
        session: &mut ClientSession,
        user_id: &str,
        shop_id: &str,
        text: &str,
    ) -> Result<ShopReview> {
        let user = self.load_user(session, user_id).await?;
        let shop = self.load_shop(session, shop_id).await?;
        if shop.is_owned_by(user_id) {
            return Err(PlatformError::unprocessable("shop owners cannot review their own shop"));
        }

        let review = ShopReview {
            id: new_id(),
            shop_id: shop.id.clone(),
            user_id: user.id.clone(),
            review_author: user.display_name(),
            thumbnail: user.thumbnail.clone(),
            review: text.to_string(),
            status: ReviewStatus::Approved,
            created_at: Utc::now(),
        };

        let already_reviewed = || PlatformError::conflict("ALREADY_REVIEWED", "you have already reviewed this shop");
        self.shop_reviews()
            .insert_one(&review)
            .session(&mut *session)
            .await
            .map_err(|e| on_duplicate(e, already_reviewed))?;

        let excerpt = bson::to_bson(&review.excerpt())?;
        let pushed = self
            .shops()
            .update_one(
                doc! { "_id": shop_id, "recent_reviews.user_id": { "$ne": user_id } },
                doc! {
                    "$push": { "recent_reviews": {
                        "$each": [excerpt],
                        "$position": 0,
                        "$slice": EMBEDDED_EXCERPT_CAP,
                    } },
                    "$inc": { "reviews_count": 1 },
                    "$set": { "modified_at": bson::DateTime::now() },
                },
            )
            .session(&mut *session)
            .await?;
        if pushed.matched_count == 0 {
            return Err(already_reviewed());
        }

        Ok(review)
    }

    pub async fn delete_my_review(&self, user_id: &str, shop_id: &str) -> Result<()> {
        let mut session = self.store.begin().await?;
        let outcome = self.delete_review_steps(&mut session, shop_id, user_id).await;
        self.store.settle(session, outcome).await?;
        info!(shop_id = %shop_id, user_id = %user_id, "Shop review deleted");
        Ok(())
    }

    /// Owner removes another user's review of their shop.
    pub async fn delete_other_review(&self, shop_id: &str, target_user_id: &str) -> Result<()> {
        let mut session = self.store.begin().await?;
        let outcome = self.delete_review_steps(&mut session, shop_id, target_user_id).await;
        self.store.settle(session, outcome).await?;
        info!(shop_id = %shop_id, user_id = %target_user_id, "Shop review removed by owner");
        Ok(())
    }

    async fn delete_review_steps(&self, session: &mut ClientSession, shop_id: &str, user_id: &str) -> Result<()> {
        self.load_shop(session, shop_id).await?;

        let removed = self
            .shop_reviews()
            .find_one_and_delete(doc! { "shop_id": shop_id, "user_id": user_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| PlatformError::not_found("Review", user_id))?;

        let excerpts = self.newest_review_excerpts(session, shop_id).await?;
        let mut update = doc! {
            "$set": {
                "recent_reviews": bson::to_bson(&excerpts)?,
                "modified_at": bson::DateTime::now(),
            },
        };
        let mut filter = doc! { "_id": shop_id };
        if removed.status == ReviewStatus::Approved {
            update.insert("$inc", doc! { "reviews_count": -1 });
            filter.insert("reviews_count", doc! { "$gt": 0 });
        }

        let updated = self
            .shops()
            .update_one(filter, update)
            .session(&mut *session)
            .await?;
        if updated.matched_count == 0 {
            return Err(PlatformError::internal(format!("review count of shop {} is already zero", shop_id)));
        }
        Ok(())
    }

    async fn newest_review_excerpts(&self, session: &mut ClientSession, shop_id: &str) -> Result<Vec<ReviewExcerpt>> {
        let mut cursor = self
            .shop_reviews()
            .find(doc! { "shop_id": shop_id, "status": ReviewStatus::Approved.as_str() })
            .sort(doc! { "created_at": -1 })
            .limit(EMBEDDED_EXCERPT_CAP as i64)
            .session(&mut *session)
            .await?;
        let rows: Vec<ShopReview> = cursor.stream(&mut *session).try_collect().await?;
        Ok(rows.iter().map(ShopReview::excerpt).collect())
    }
}
