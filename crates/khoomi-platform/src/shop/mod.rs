//! Shop Aggregate
//!
//! The shop document, its follower and review rows, and the owner-edited
//! profile records kept beside it.

pub mod about;
pub mod api;
pub mod community_api;
pub mod compliance;
pub mod entity;
pub mod profile_api;
pub mod repository;
pub mod return_policy;
pub mod verification;

pub use api::{shops_router, ShopsState};
pub use community_api::shop_community_router;
pub use entity::{Shop, ShopFollower, ShopReview, ShopStatus};
pub use profile_api::{shop_profile_router, ShopProfileState};
pub use repository::{ShopImage, ShopRepository};
