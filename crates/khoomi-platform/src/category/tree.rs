//! Category forest construction

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use utoipa::ToSchema;

use crate::category::entity::Category;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CategoryNode {
    pub id: String,
    pub name: String,
    pub description: String,
    pub path: String,
    pub parent_id: String,
    #[schema(no_recursion)]
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    fn leaf(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
            path: category.path,
            parent_id: category.parent_id,
            children: Vec::new(),
        }
    }
}

/// Build a forest from a flat list.
///
/// Input order does not matter: rows are ordered by `path` (then by content)
/// before linking, and duplicate ids keep the first row in that order. A node
/// whose parent is not in the input becomes a root, so partial inputs such as
/// search hits still render.
pub fn build_category_tree(categories: Vec<Category>) -> Vec<CategoryNode> {
    let mut categories = categories;
    categories.sort_by(|a, b| {
        (&a.path, &a.id, &a.parent_id, &a.name, &a.description)
            .cmp(&(&b.path, &b.id, &b.parent_id, &b.name, &b.description))
    });
    let mut seen = HashSet::new();
    categories.retain(|c| seen.insert(c.id.clone()));

    let present: HashSet<String> = categories.iter().map(|c| c.id.clone()).collect();
    let mut roots = Vec::new();
    let mut children: HashMap<String, Vec<Category>> = HashMap::new();

    for category in categories {
        if category.is_root() || category.parent_id == category.id || !present.contains(&category.parent_id) {
            roots.push(category);
        } else {
            children.entry(category.parent_id.clone()).or_default().push(category);
        }
    }

    roots
        .into_iter()
        .map(|root| attach(root, &mut children))
        .collect()
}

fn attach(category: Category, children: &mut HashMap<String, Vec<Category>>) -> CategoryNode {
    let kids = children.remove(&category.id).unwrap_or_default();
    let mut node = CategoryNode::leaf(category);
    node.children = kids.into_iter().map(|kid| attach(kid, children)).collect();
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(id: &str, path: &str, parent: &str) -> Category {
        Category {
            id: id.into(),
            name: id.to_uppercase(),
            description: String::new(),
            path: path.into(),
            parent_id: parent.into(),
        }
    }

    fn sample() -> Vec<Category> {
        vec![
            cat("jewelry", "jewelry", ""),
            cat("rings", "jewelry/rings", "jewelry"),
            cat("bands", "jewelry/rings/bands", "rings"),
            cat("necklaces", "jewelry/necklaces", "jewelry"),
            cat("home", "home", ""),
            cat("rugs", "home/rugs", "home"),
        ]
    }

    #[test]
    fn test_nested_chain() {
        let forest = build_category_tree(vec![
            cat("jewelry", "jewelry", ""),
            cat("rings", "jewelry/rings", "jewelry"),
            cat("bands", "jewelry/rings/bands", "rings"),
        ]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id, "jewelry");
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].id, "rings");
        assert_eq!(forest[0].children[0].children[0].id, "bands");
        assert!(forest[0].children[0].children[0].children.is_empty());
    }

    #[test]
    fn test_child_before_parent_in_input() {
        let forest = build_category_tree(vec![
            cat("bands", "jewelry/rings/bands", "rings"),
            cat("rings", "jewelry/rings", "jewelry"),
            cat("jewelry", "jewelry", ""),
        ]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children[0].children[0].id, "bands");
    }

    #[test]
    fn test_permutation_invariant() {
        let expected = build_category_tree(sample());
        let mut input = sample();
        for shift in 0..input.len() {
            input.rotate_left(1);
            let mut reversed = input.clone();
            reversed.reverse();
            assert_eq!(build_category_tree(input.clone()), expected, "rotation {}", shift);
            assert_eq!(build_category_tree(reversed), expected, "reversed rotation {}", shift);
        }
    }

    #[test]
    fn test_missing_parent_promotes_to_root() {
        let forest = build_category_tree(vec![
            cat("rings", "jewelry/rings", "jewelry"),
            cat("bands", "jewelry/rings/bands", "rings"),
        ]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id, "rings");
        assert_eq!(forest[0].children[0].id, "bands");
    }

    #[test]
    fn test_duplicate_ids_collapse() {
        let forest = build_category_tree(vec![
            cat("home", "home", ""),
            cat("home", "home", ""),
        ]);
        assert_eq!(forest.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(build_category_tree(Vec::new()).is_empty());
    }
}
