//! Shop "about" page, one per shop.

use bson::doc;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use mongodb::{options::ReturnDocument, Collection, Database};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::error::{PlatformError, Result};
use crate::shared::ids::new_id;
use crate::store::is_duplicate_key;

pub const SHOP_ABOUT: &str = "shop_about";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AboutStatus {
    Draft,
    Active,
}

impl AboutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopAbout {
    #[serde(rename = "_id")]
    pub id: String,
    pub shop_id: String,
    pub status: AboutStatus,
    pub headline: String,
    pub story: String,
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub facebook: String,
    #[serde(default)]
    pub x: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl ShopAbout {
    pub fn new(shop_id: impl Into<String>, headline: impl Into<String>, story: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            shop_id: shop_id.into(),
            status: AboutStatus::Draft,
            headline: headline.into(),
            story: story.into(),
            instagram: String::new(),
            facebook: String::new(),
            x: String::new(),
            modified_at: Utc::now(),
        }
    }

    /// Draft page written when a shop is opened.
    pub fn welcome(shop_id: impl Into<String>, shop_name: &str) -> Self {
        Self::new(
            shop_id,
            format!("Welcome to {}", shop_name),
            format!(
                "{} is a new shop on Khoomi. Tell buyers who makes these pieces, how they are made, and what inspires them.",
                shop_name
            ),
        )
    }
}

/// Fields the owner may change; `None` leaves a field untouched.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct AboutChanges {
    pub headline: Option<String>,
    pub story: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub x: Option<String>,
}

impl AboutChanges {
    pub fn to_set_document(&self) -> bson::Document {
        let mut set = doc! {};
        for (field, value) in [
            ("headline", &self.headline),
            ("story", &self.story),
            ("instagram", &self.instagram),
            ("facebook", &self.facebook),
            ("x", &self.x),
        ] {
            if let Some(value) = value {
                set.insert(field, value.trim());
            }
        }
        set
    }

    /// Full replacement: headline and story are required, absent social
    /// handles are cleared.
    pub fn to_replacement_document(&self) -> Result<bson::Document> {
        let required = |name: &str, value: &Option<String>| -> Result<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| PlatformError::validation(format!("{} is required", name)))
        };
        let optional = |value: &Option<String>| value.as_deref().map(str::trim).unwrap_or_default().to_string();

        Ok(doc! {
            "headline": required("headline", &self.headline)?,
            "story": required("story", &self.story)?,
            "instagram": optional(&self.instagram),
            "facebook": optional(&self.facebook),
            "x": optional(&self.x),
        })
    }
}

pub struct ShopAboutRepository {
    collection: Collection<ShopAbout>,
}

impl ShopAboutRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(SHOP_ABOUT),
        }
    }

    pub async fn find_by_shop(&self, shop_id: &str) -> Result<Option<ShopAbout>> {
        Ok(self.collection.find_one(doc! { "shop_id": shop_id }).await?)
    }

    pub async fn insert(&self, about: &ShopAbout) -> Result<()> {
        self.collection.insert_one(about).await.map_err(|e| {
            if is_duplicate_key(&e) {
                PlatformError::conflict("ABOUT_EXISTS", "shop already has an about page")
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    pub async fn update(&self, shop_id: &str, mut set: bson::Document) -> Result<ShopAbout> {
        if set.is_empty() {
            return Err(PlatformError::validation("no fields to update"));
        }
        set.insert("modified_at", bson::DateTime::now());
        self.collection
            .find_one_and_update(doc! { "shop_id": shop_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| PlatformError::not_found("ShopAbout", shop_id))
    }

    pub async fn set_status(&self, shop_id: &str, status: AboutStatus) -> Result<ShopAbout> {
        self.collection
            .find_one_and_update(
                doc! { "shop_id": shop_id },
                doc! { "$set": { "status": status.as_str(), "modified_at": bson::DateTime::now() } },
            )
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| PlatformError::not_found("ShopAbout", shop_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_copy_is_draft() {
        let about = ShopAbout::welcome("s1", "Clay & Co");
        assert_eq!(about.status, AboutStatus::Draft);
        assert_eq!(about.headline, "Welcome to Clay & Co");
        assert!(about.story.starts_with("Clay & Co is a new shop"));
    }

    #[test]
    fn test_changes_only_set_present_fields() {
        let changes = AboutChanges {
            headline: Some("  Handmade  ".into()),
            x: Some("@clay".into()),
            ..Default::default()
        };
        let set = changes.to_set_document();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get_str("headline").unwrap(), "Handmade");
        assert_eq!(set.get_str("x").unwrap(), "@clay");
    }

    #[test]
    fn test_replacement_clears_absent_socials() {
        let changes = AboutChanges {
            headline: Some("Handmade".into()),
            story: Some(" Thrown on a kick wheel ".into()),
            x: Some("@clay".into()),
            ..Default::default()
        };
        let set = changes.to_replacement_document().unwrap();
        assert_eq!(set.len(), 5);
        assert_eq!(set.get_str("story").unwrap(), "Thrown on a kick wheel");
        assert_eq!(set.get_str("instagram").unwrap(), "");
        assert_eq!(set.get_str("x").unwrap(), "@clay");
    }

    #[test]
    fn test_replacement_requires_headline_and_story() {
        let changes = AboutChanges {
            headline: Some("Handmade".into()),
            story: Some("   ".into()),
            ..Default::default()
        };
        assert!(changes.to_replacement_document().is_err());
        assert!(AboutChanges::default().to_replacement_document().is_err());
    }
}
