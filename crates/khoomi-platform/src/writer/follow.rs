//! Follow / unfollow
//!
//! `Shop.follower_count` equals the number of `shop_followers` rows for the
//! shop, and `Shop.followers` holds excerpts of the newest ones (newest first,
//! at most `EMBEDDED_EXCERPT_CAP`).

use bson::doc;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{ClientSession, Collection};
use tracing::info;

use super::{on_duplicate, AggregateWriter};
use crate::shared::error::{PlatformError, Result};
use crate::shared::ids::new_id;
use crate::shop::entity::{
    FollowerExcerpt, Shop, ShopFollower, EMBEDDED_EXCERPT_CAP, SHOPS, SHOP_FOLLOWERS,
};

impl AggregateWriter {
    pub(super) fn shops(&self) -> Collection<Shop> {
        self.store.collection(SHOPS)
    }

    fn shop_followers(&self) -> Collection<ShopFollower> {
        self.store.collection(SHOP_FOLLOWERS)
    }

    pub(super) async fn load_shop(&self, session: &mut ClientSession, shop_id: &str) -> Result<Shop> {
        self.shops()
            .find_one(doc! { "_id": shop_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| PlatformError::not_found("Shop", shop_id))
    }

    pub async fn follow_shop(&self, user_id: &str, shop_id: &str) -> Result<ShopFollower> {
        let mut session = self.store.begin().await?;
        let outcome = self.follow_steps(&mut session, user_id, shop_id).await;
        let follower = self.store.settle(session, outcome).await?;
        info!(shop_id = %shop_id, user_id = %user_id, "Shop followed");
        Ok(follower)
    }

    async fn follow_steps(&self, session: &mut ClientSession, user_id: &str, shop_id: &str) -> Result<ShopFollower> {
        let user = self.load_user(session, user_id).await?;
        let shop = self.load_shop(session, shop_id).await?;

        let follower = ShopFollower {
            id: new_id(),
            shop_id: shop.id.clone(),
            user_id: user.id.clone(),
            login_name: user.login_name.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            thumbnail: user.thumbnail.clone(),
            is_owner: shop.is_owned_by(&user.id),
            joined_at: Utc::now(),
        };

        let already_following = || PlatformError::conflict("ALREADY_FOLLOWING", "you already follow this shop");
        self.shop_followers()
            .insert_one(&follower)
            .session(&mut *session)
            .await
            .map_err(|e| on_duplicate(e, already_following))?;

        let excerpt = bson::to_bson(&follower.excerpt())?;
        let pushed = self
            .shops()
            .update_one(
                doc! { "_id": shop_id, "followers.user_id": { "$ne": user_id } },
                doc! {
                    "$push": { "followers": {
                        "$each": [excerpt],
                        "$position": 0,
                        "$slice": EMBEDDED_EXCERPT_CAP,
                    } },
                    "$inc": { "follower_count": 1 },
                    "$set": { "modified_at": bson::DateTime::now() },
                },
            )
            .session(&mut *session)
            .await?;
        if pushed.matched_count == 0 {
            return Err(already_following());
        }

        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$addToSet": { "favorite_shops": shop_id } },
            )
            .session(&mut *session)
            .await?;

        Ok(follower)
    }

    pub async fn unfollow_shop(&self, user_id: &str, shop_id: &str) -> Result<()> {
        let mut session = self.store.begin().await?;
        let outcome = self.remove_follower_steps(&mut session, shop_id, user_id).await;
        self.store.settle(session, outcome).await?;
        info!(shop_id = %shop_id, user_id = %user_id, "Shop unfollowed");
        Ok(())
    }

    /// Owner removes someone else from the shop's followers.
    pub async fn remove_other_follower(&self, owner_id: &str, shop_id: &str, target_user_id: &str) -> Result<()> {
        if owner_id == target_user_id {
            return Err(PlatformError::validation("use unfollow to remove yourself"));
        }
        let mut session = self.store.begin().await?;
        let outcome = self.remove_follower_steps(&mut session, shop_id, target_user_id).await;
        self.store.settle(session, outcome).await?;
        info!(shop_id = %shop_id, user_id = %target_user_id, "Follower removed by owner");
        Ok(())
    }

    async fn remove_follower_steps(&self, session: &mut ClientSession, shop_id: &str, user_id: &str) -> Result<()> {
        self.load_shop(session, shop_id).await?;

        let deleted = self
            .shop_followers()
            .delete_one(doc! { "shop_id": shop_id, "user_id": user_id })
            .session(&mut *session)
            .await?;
        if deleted.deleted_count == 0 {
            return Err(PlatformError::conflict("NOT_FOLLOWING", "user does not follow this shop"));
        }

        let excerpts = self.newest_follower_excerpts(session, shop_id).await?;
        let updated = self
            .shops()
            .update_one(
                doc! { "_id": shop_id, "follower_count": { "$gt": 0 } },
                doc! {
                    "$set": {
                        "followers": bson::to_bson(&excerpts)?,
                        "modified_at": bson::DateTime::now(),
                    },
                    "$inc": { "follower_count": -1 },
                },
            )
            .session(&mut *session)
            .await?;
        if updated.matched_count == 0 {
            return Err(PlatformError::internal(format!("follower count of shop {} is already zero", shop_id)));
        }

        self.users()
            .update_one(
                doc! { "_id": user_id },
                doc! { "$pull": { "favorite_shops": shop_id } },
            )
            .session(&mut *session)
            .await?;
        Ok(())
    }

    /// Excerpts of the newest remaining followers, read in the transaction.
    async fn newest_follower_excerpts(&self, session: &mut ClientSession, shop_id: &str) -> Result<Vec<FollowerExcerpt>> {
        let mut cursor = self
            .shop_followers()
            .find(doc! { "shop_id": shop_id })
            .sort(doc! { "joined_at": -1 })
            .limit(EMBEDDED_EXCERPT_CAP as i64)
            .session(&mut *session)
            .await?;
        let rows: Vec<ShopFollower> = cursor.stream(&mut *session).try_collect().await?;
        Ok(rows.iter().map(ShopFollower::excerpt).collect())
    }
}
