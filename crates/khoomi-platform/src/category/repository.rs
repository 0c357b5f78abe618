//! Category Repository

use bson::doc;
use futures::TryStreamExt;
use mongodb::{Collection, Database};

use crate::category::entity::{Category, CATEGORIES};
use crate::shared::api_common::substring_filter;
use crate::shared::error::{PlatformError, Result};
use crate::store::is_duplicate_key;

const SEARCH_FIELDS: &[&str] = &["name", "path", "parent_id"];

pub struct CategoryRepository {
    collection: Collection<Category>,
}

impl CategoryRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(CATEGORIES),
        }
    }

    pub async fn insert(&self, category: &Category) -> Result<()> {
        self.collection.insert_one(category).await.map_err(|e| {
            if is_duplicate_key(&e) {
                PlatformError::duplicate("Category", "id", category.id.clone())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Category>> {
        Ok(self.collection.find_one(doc! { "_id": id }).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Category> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Category", id))
    }

    pub async fn all(&self) -> Result<Vec<Category>> {
        self.find_sorted(doc! {}).await
    }

    pub async fn children(&self, id: &str) -> Result<Vec<Category>> {
        self.find_sorted(doc! { "parent_id": id }).await
    }

    /// The node and every category on its path to the root.
    pub async fn lineage(&self, id: &str) -> Result<Vec<Category>> {
        let node = self.get(id).await?;
        let ids = node.lineage();
        self.find_sorted(doc! { "_id": { "$in": ids } }).await
    }

    pub async fn search(&self, term: &str) -> Result<Vec<Category>> {
        self.find_sorted(substring_filter(term, SEARCH_FIELDS)).await
    }

    async fn find_sorted(&self, filter: bson::Document) -> Result<Vec<Category>> {
        Ok(self
            .collection
            .find(filter)
            .sort(doc! { "path": 1 })
            .await?
            .try_collect()
            .await?)
    }
}
