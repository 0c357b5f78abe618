//! User wishlists

pub mod api;
pub mod entity;
pub mod repository;

pub use api::{wishlist_router, WishlistState};
pub use entity::UserWishlist;
pub use repository::WishlistRepository;
