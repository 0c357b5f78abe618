//! Listing Repository

use bson::doc;
use futures::TryStreamExt;
use mongodb::{Collection, Database};

use crate::listing::entity::{Listing, ListingState, LISTINGS};
use crate::shared::api_common::{substring_filter, Page, PagedResponse};
use crate::shared::error::{PlatformError, Result};

const SEARCH_FIELDS: &[&str] = &["details.title", "details.description", "details.tags", "details.keywords"];

pub struct ListingRepository {
    collection: Collection<Listing>,
}

impl ListingRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(LISTINGS),
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Listing>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Listing> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Listing", id))
    }

    /// Active listings matching `term`, optionally within one category.
    pub async fn search(&self, term: Option<&str>, category: Option<&str>, page: &Page) -> Result<PagedResponse<Listing>> {
        let mut filter = doc! { "state.state": ListingState::Active.as_str() };
        if let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) {
            filter.extend(substring_filter(term, SEARCH_FIELDS));
        }
        if let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) {
            filter.insert("details.category", category.to_lowercase());
        }
        self.page(filter, page).await
    }

    /// A shop's listings; non-active ones only when `include_hidden`.
    pub async fn list_by_shop(&self, shop_id: &str, include_hidden: bool, page: &Page) -> Result<PagedResponse<Listing>> {
        let mut filter = doc! { "shop_id": shop_id };
        if !include_hidden {
            filter.insert("state.state", ListingState::Active.as_str());
        }
        self.page(filter, page).await
    }

    async fn page(&self, filter: bson::Document, page: &Page) -> Result<PagedResponse<Listing>> {
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

    pub async fn increment_views(&self, id: &str) -> Result<()> {
        self.collection
            .update_one(doc! { "_id": id }, doc! { "$inc": { "views": 1 } })
            .await?;
        Ok(())
    }
}
