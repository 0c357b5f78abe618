//! Category Entity
//!
//! Categories form a forest keyed by slug. `path` holds the slugs from the
//! root down to the node itself, joined with `/`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::shared::error::{PlatformError, Result};
use crate::shared::slug::slugify;
use crate::shared::validation::{max_chars, require_non_empty};

pub const CATEGORIES: &str = "categories";

pub const PATH_SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    /// Slug
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub path: String,
    /// Parent slug, empty for roots
    #[serde(default)]
    pub parent_id: String,
}

impl Category {
    /// Build a category under `parent`, deriving slug and path.
    pub fn new(name: &str, description: &str, parent: Option<&Category>) -> Result<Self> {
        require_non_empty("name", name)?;
        max_chars("name", name, 60)?;
        max_chars("description", description, 500)?;

        let id = slugify(name);
        if id.is_empty() {
            return Err(PlatformError::validation("category name must contain letters or digits"));
        }
        let (path, parent_id) = match parent {
            Some(parent) => (format!("{}{}{}", parent.path, PATH_SEPARATOR, id), parent.id.clone()),
            None => (id.clone(), String::new()),
        };
        Ok(Self {
            id,
            name: name.trim().to_string(),
            description: description.trim().to_string(),
            path,
            parent_id,
        })
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_empty()
    }

    /// Slugs from the root down to this node.
    pub fn lineage(&self) -> Vec<String> {
        self.path
            .split(PATH_SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_parents() {
        let jewelry = Category::new("Jewelry", "", None).unwrap();
        let rings = Category::new("Rings", "", Some(&jewelry)).unwrap();
        let bands = Category::new("Wedding Bands", "", Some(&rings)).unwrap();

        assert!(jewelry.is_root());
        assert_eq!(rings.parent_id, "jewelry");
        assert_eq!(bands.id, "wedding-bands");
        assert_eq!(bands.path, "jewelry/rings/wedding-bands");
        assert_eq!(bands.lineage(), vec!["jewelry", "rings", "wedding-bands"]);
    }

    #[test]
    fn test_name_must_slugify() {
        assert!(Category::new("???", "", None).is_err());
        assert!(Category::new("", "", None).is_err());
    }
}
