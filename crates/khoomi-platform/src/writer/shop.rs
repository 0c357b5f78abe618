//! Shop creation and image replacement

use bson::doc;
use mongodb::ClientSession;
use tracing::info;

use super::{on_duplicate, AggregateWriter};
use crate::mail::templates::MailTemplate;
use crate::media::{self, MediaAsset, MediaSource};
use crate::shared::error::{PlatformError, Result};
use crate::shared::validation::{normalize_shop_username, validate_shop_description, validate_shop_name};
use crate::shop::about::{ShopAbout, SHOP_ABOUT};
use crate::shop::entity::Shop;
use crate::shop::repository::{ShopImage, ShopRepository};
use crate::store::duplicate_key_index;

/// Validated form of the create-shop request; images are uploaded first.
#[derive(Debug)]
pub struct NewShop {
    pub name: String,
    pub username: String,
    pub description: String,
    pub logo: Option<MediaSource>,
    pub banner: Option<MediaSource>,
}

impl AggregateWriter {
    /// Open a shop for `user_id`: shop row, owner promoted to seller, draft
    /// about page and a confirmation mail, all or nothing. Uploaded images are
    /// deleted again when the write fails.
    pub async fn create_shop(&self, user_id: &str, input: NewShop) -> Result<Shop> {
        let name = input.name.trim().to_string();
        validate_shop_name(&name)?;
        let username = normalize_shop_username(&input.username)?;
        let description = input.description.trim().to_string();
        validate_shop_description(&description)?;

        let owner = self
            .users()
            .find_one(doc! { "_id": user_id })
            .await?
            .ok_or_else(|| PlatformError::not_found("User", user_id))?;
        if owner.shop_id.is_some() {
            return Err(shop_exists());
        }

        let folder = self.media_folder("shops");
        let logo = self.upload_optional(input.logo, &folder).await?;
        let banner = match self.upload_optional(input.banner, &folder).await {
            Ok(banner) => banner,
            Err(e) => {
                media::discard(self.media(), &asset_handles([&logo, &None])).await;
                return Err(e);
            }
        };

        let mut shop = Shop::new(user_id, name, username, description);
        if let Some(logo) = &logo {
            shop.logo_url = Some(logo.url.clone());
            shop.logo_handle = Some(logo.handle.clone());
        }
        if let Some(banner) = &banner {
            shop.banner_url = Some(banner.url.clone());
            shop.banner_handle = Some(banner.handle.clone());
        }

        let handles = asset_handles([&logo, &banner]);
        let shop = media::with_rollback(self.media(), &handles, async {
            let mut session = self.store.begin().await?;
            let outcome = self.create_shop_steps(&mut session, &shop).await;
            self.store.settle(session, outcome).await?;
            Ok::<_, PlatformError>(shop)
        })
        .await?;

        info!(shop_id = %shop.id, user_id = %user_id, username = %shop.username, "Shop created");
        Ok(shop)
    }

    async fn create_shop_steps(&self, session: &mut ClientSession, shop: &Shop) -> Result<()> {
        self.shops()
            .insert_one(shop)
            .session(&mut *session)
            .await
            .map_err(|e| {
                let owner_taken = duplicate_key_index(&e).is_some_and(|index| index.starts_with("user_id"));
                on_duplicate(e, || {
                    if owner_taken {
                        shop_exists()
                    } else {
                        PlatformError::duplicate("Shop", "username", shop.username.as_str())
                    }
                })
            })?;

        let promoted = self
            .users()
            .update_one(
                doc! { "_id": &shop.user_id, "shop_id": null },
                doc! { "$set": {
                    "shop_id": &shop.id,
                    "is_seller": true,
                    "modified_at": bson::DateTime::now(),
                } },
            )
            .session(&mut *session)
            .await?;
        if promoted.matched_count == 0 {
            return Err(shop_exists());
        }

        self.store
            .collection::<ShopAbout>(SHOP_ABOUT)
            .insert_one(ShopAbout::welcome(shop.id.as_str(), &shop.name))
            .session(&mut *session)
            .await?;

        let owner = self.load_user(session, &shop.user_id).await?;
        self.enqueue_mail(
            session,
            &owner.primary_email,
            MailTemplate::ShopCreated {
                first_name: &owner.first_name,
                shop_name: &shop.name,
                shop_slug: &shop.slug,
            },
        )
        .await
    }

    /// Upload a new logo or banner, then delete the asset it replaces.
    pub async fn replace_shop_image(&self, shop_id: &str, image: ShopImage, source: MediaSource) -> Result<Shop> {
        let shops = ShopRepository::new(self.store.database());
        shops.get(shop_id).await?;

        let asset = self.media.upload(source, &self.media_folder("shops")).await?;
        let handles = [asset.handle.clone()];
        let previous = media::with_rollback(
            self.media(),
            &handles,
            shops.replace_image(shop_id, image, &asset.url, &asset.handle),
        )
        .await?;

        if let Some(previous) = previous {
            media::discard(self.media(), &[previous]).await;
        }
        info!(shop_id = %shop_id, image = ?image, "Shop image replaced");
        shops.get(shop_id).await
    }

    async fn upload_optional(&self, source: Option<MediaSource>, folder: &str) -> Result<Option<MediaAsset>> {
        match source {
            Some(source) => Ok(Some(self.media.upload(source, folder).await?)),
            None => Ok(None),
        }
    }

    pub async fn add_gallery_image(&self, shop_id: &str, source: MediaSource) -> Result<Shop> {
        let shops = ShopRepository::new(self.store.database());
        shops.get(shop_id).await?;

        let asset = self.media.upload(source, &self.media_folder("shops/gallery")).await?;
        let handles = [asset.handle.clone()];
        media::with_rollback(self.media(), &handles, shops.add_gallery_image(shop_id, &asset.url)).await
    }
}

fn shop_exists() -> PlatformError {
    PlatformError::conflict("SHOP_EXISTS", "this account already owns a shop")
}

fn asset_handles(assets: [&Option<MediaAsset>; 2]) -> Vec<String> {
    assets.into_iter().flatten().map(|a| a.handle.clone()).collect()
}
