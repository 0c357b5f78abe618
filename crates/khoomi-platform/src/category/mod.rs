//! Category forest

pub mod api;
pub mod entity;
pub mod repository;
pub mod tree;

pub use api::{categories_router, CategoriesState};
pub use entity::Category;
pub use repository::CategoryRepository;
pub use tree::{build_category_tree, CategoryNode};
