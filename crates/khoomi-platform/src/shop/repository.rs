//! Shop Repository
//!
//! Single-document reads and edits. Changes to the denormalized follower,
//! review, and listing projections go through the aggregate writer.

use bson::{doc, Document};
use futures::TryStreamExt;
use mongodb::{options::ReturnDocument, Collection, Database};
use serde::Deserialize;

use crate::address::entity::{UserAddress, USER_ADDRESSES};
use crate::shared::api_common::{substring_filter, Page, PagedResponse};
use crate::shared::error::{PlatformError, Result};
use crate::shared::ids::is_object_id;
use crate::shop::entity::{
    ReviewStatus, Shop, ShopFollower, ShopPolicy, ShopReview, ShopStatus, SHOPS, SHOP_FOLLOWERS, SHOP_REVIEWS,
};
use crate::store::is_duplicate_key;
use crate::user::entity::USERS;

/// Most gallery images a shop may hold
pub const MAX_GALLERY_IMAGES: usize = 10;

const SEARCH_FIELDS: &[&str] = &["name", "username", "description"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopImage {
    Logo,
    Banner,
}

impl ShopImage {
    fn fields(&self) -> (&'static str, &'static str) {
        match self {
            Self::Logo => ("logo_url", "logo_handle"),
            Self::Banner => ("banner_url", "banner_handle"),
        }
    }
}

/// Public projection of the shop owner
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerExcerpt {
    #[serde(rename = "_id")]
    pub id: String,
    pub login_name: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Shop joined with its owner and the owner's default shipping address.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopDetail {
    pub shop: Shop,
    #[serde(default)]
    pub owner: Option<OwnerExcerpt>,
    #[serde(default)]
    pub address: Option<UserAddress>,
}

pub struct ShopRepository {
    collection: Collection<Shop>,
    followers: Collection<ShopFollower>,
    reviews: Collection<ShopReview>,
}

impl ShopRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(SHOPS),
            followers: db.collection(SHOP_FOLLOWERS),
            reviews: db.collection(SHOP_REVIEWS),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Shop>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Shop> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Shop", id))
    }

    pub async fn find_by_owner(&self, user_id: &str) -> Result<Option<Shop>> {
        Ok(self.collection.find_one(doc! { "user_id": user_id }).await?)
    }

    /// Shop detail by id or slug, with owner and default address joined in.
    pub async fn find_detail(&self, id_or_slug: &str) -> Result<Option<ShopDetail>> {
        let key = id_or_slug.trim().to_lowercase();
        let matcher = if is_object_id(&key) {
            doc! { "_id": &key }
        } else {
            doc! { "slug": &key }
        };

        let pipeline = vec![
            doc! { "$match": matcher },
            doc! { "$limit": 1 },
            doc! { "$lookup": {
                "from": USERS,
                "let": { "owner_id": "$user_id" },
                "pipeline": [
                    { "$match": { "$expr": { "$eq": ["$_id", "$$owner_id"] } } },
                    { "$project": {
                        "_id": 1, "login_name": 1, "first_name": 1, "last_name": 1, "thumbnail": 1,
                    } },
                ],
                "as": "owner",
            } },
            doc! { "$unwind": { "path": "$owner", "preserveNullAndEmptyArrays": true } },
            doc! { "$lookup": {
                "from": USER_ADDRESSES,
                "let": { "owner_id": "$user_id" },
                "pipeline": [
                    { "$match": { "$expr": { "$and": [
                        { "$eq": ["$user_id", "$$owner_id"] },
                        { "$eq": ["$is_default_shipping_address", true] },
                    ] } } },
                    { "$limit": 1 },
                ],
                "as": "address",
            } },
            doc! { "$unwind": { "path": "$address", "preserveNullAndEmptyArrays": true } },
            doc! { "$project": { "_id": 0, "shop": "$$ROOT", "owner": 1, "address": 1 } },
        ];

        let mut cursor = self.collection.aggregate(pipeline).await?;
        match cursor.try_next().await? {
            Some(document) => Ok(Some(bson::from_document(document)?)),
            None => Ok(None),
        }
    }

    /// Live, active shops, optionally narrowed by a substring search.
    pub async fn list(&self, term: Option<&str>, page: &Page) -> Result<PagedResponse<Shop>> {
        let mut filter = doc! { "status": ShopStatus::Active.as_str() };
        if let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) {
            filter.extend(substring_filter(term, SEARCH_FIELDS));
        }

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

    /// `$set` on one shop; a username collision surfaces as a duplicate.
    pub async fn update_fields(&self, id: &str, mut fields: Document) -> Result<Shop> {
        fields.insert("modified_at", bson::DateTime::now());
        let username = fields.get_str("username").ok().map(str::to_string);
        self.collection
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": fields })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    PlatformError::duplicate("Shop", "username", username.unwrap_or_default())
                } else {
                    e.into()
                }
            })?
            .ok_or_else(|| PlatformError::not_found("Shop", id))
    }

    /// Swap the logo or banner, returning the previous asset handle.
    pub async fn replace_image(&self, id: &str, image: ShopImage, url: &str, handle: &str) -> Result<Option<String>> {
        let (url_field, handle_field) = image.fields();
        let previous = self
            .collection
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": {
                    url_field: url,
                    handle_field: handle,
                    "modified_at": bson::DateTime::now(),
                } },
            )
            .return_document(ReturnDocument::Before)
            .await?
            .ok_or_else(|| PlatformError::not_found("Shop", id))?;
        Ok(match image {
            ShopImage::Logo => previous.logo_handle,
            ShopImage::Banner => previous.banner_handle,
        })
    }

    pub async fn add_gallery_image(&self, id: &str, url: &str) -> Result<Shop> {
        let cap_key = format!("gallery.{}", MAX_GALLERY_IMAGES - 1);
        let updated = self
            .collection
            .find_one_and_update(
                doc! { "_id": id, cap_key: { "$exists": false } },
                doc! {
                    "$addToSet": { "gallery": url },
                    "$set": { "modified_at": bson::DateTime::now() },
                },
            )
            .return_document(ReturnDocument::After)
            .await?;
        match updated {
            Some(shop) => Ok(shop),
            None => {
                self.get(id).await?;
                Err(PlatformError::limit_reached("gallery image", MAX_GALLERY_IMAGES as u64))
            }
        }
    }

    pub async fn remove_gallery_image(&self, id: &str, url: &str) -> Result<Shop> {
        self.collection
            .find_one_and_update(
                doc! { "_id": id, "gallery": url },
                doc! {
                    "$pull": { "gallery": url },
                    "$set": { "modified_at": bson::DateTime::now() },
                },
            )
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| PlatformError::not_found("Gallery image", url))
    }

    pub async fn set_announcement(&self, id: &str, announcement: &str) -> Result<Shop> {
        let now = bson::DateTime::now();
        self.update_fields(
            id,
            doc! { "announcement": announcement.trim(), "announcement_modified_at": now },
        )
        .await
    }

    pub async fn set_vacation(&self, id: &str, is_vacation: bool, message: &str) -> Result<Shop> {
        self.update_fields(id, doc! { "is_vacation": is_vacation, "vacation_message": message.trim() })
            .await
    }

    pub async fn set_policy(&self, id: &str, policy: &ShopPolicy) -> Result<Shop> {
        self.update_fields(id, doc! { "policy": bson::to_bson(policy)? }).await
    }

    /// Move to `next` only from a state that allows it.
    pub async fn transition_status(&self, id: &str, next: ShopStatus) -> Result<Shop> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(next) {
            return Err(PlatformError::unprocessable(format!(
                "cannot change shop status from {} to {}",
                current.status.as_str(),
                next.as_str()
            )));
        }
        self.collection
            .find_one_and_update(
                doc! { "_id": id, "status": current.status.as_str() },
                doc! { "$set": {
                    "status": next.as_str(),
                    "is_live": next == ShopStatus::Active,
                    "modified_at": bson::DateTime::now(),
                } },
            )
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| PlatformError::conflict("STATUS_CHANGED", "shop status changed concurrently"))
    }

    // Followers and reviews (read side)

    pub async fn list_followers(&self, shop_id: &str, page: &Page) -> Result<PagedResponse<ShopFollower>> {
        let filter = doc! { "shop_id": shop_id };
        let total = self.followers.count_documents(filter.clone()).await?;
        let items = self
            .followers
            .find(filter)
            .sort(page.sort.clone())
            .skip(page.skip)
            .limit(page.limit)
            .await?
            .try_collect()
            .await?;
        Ok(PagedResponse::new(items, total, page))
    }

    pub async fn is_following(&self, shop_id: &str, user_id: &str) -> Result<bool> {
        let count = self
            .followers
            .count_documents(doc! { "shop_id": shop_id, "user_id": user_id })
            .await?;
        Ok(count > 0)
    }

    pub async fn list_reviews(&self, shop_id: &str, page: &Page) -> Result<PagedResponse<ShopReview>> {
        let filter = doc! { "shop_id": shop_id, "status": ReviewStatus::Approved.as_str() };
        let total = self.reviews.count_documents(filter.clone()).await?;
        let items = self
            .reviews
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
