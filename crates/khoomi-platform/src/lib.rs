//! Khoomi Platform
//!
//! Backend of the Khoomi artisan marketplace:
//! - Accounts, login bookkeeping, and the token lifecycle
//! - Shops with denormalized follower and review projections
//! - Listings, wishlists, and the category forest
//! - Addresses, payout accounts, and shipping profiles
//! - Transactional mail through an outbox, images through a media host
//!
//! ## Module Organization (Aggregate-based)
//!
//! Each aggregate contains:
//! - `entity` - Domain entities
//! - `repository` - Data access
//! - `api` - REST endpoints
//!
//! Writes that touch more than one document go through [`writer::AggregateWriter`].

// Aggregates
pub mod address;
pub mod category;
pub mod listing;
pub mod notification;
pub mod payment;
pub mod shipping;
pub mod shop;
pub mod user;
pub mod wishlist;

// Authentication
pub mod auth;

// Infrastructure
pub mod mail;
pub mod media;
pub mod shared;
pub mod store;
pub mod writer;

pub use shared::error::{PlatformError, Result};
pub use store::Store;
pub use writer::{AggregateWriter, WriterSettings};

// Re-export main entity types for convenience
pub use category::Category;
pub use listing::{Listing, ListingState};
pub use shop::{Shop, ShopFollower, ShopReview, ShopStatus};
pub use user::{User, UserRole, UserStatus};

// Re-export repositories
pub use address::AddressRepository;
pub use category::CategoryRepository;
pub use listing::ListingRepository;
pub use notification::NotificationRepository;
pub use payment::PaymentRepository;
pub use shipping::ShippingProfileRepository;
pub use shop::ShopRepository;
pub use user::UserRepository;
pub use wishlist::WishlistRepository;

// Re-export API routers and their state
pub use address::{addresses_router, AddressesState};
pub use category::{categories_router, CategoriesState};
pub use listing::{listings_router, ListingsState};
pub use notification::{notifications_router, NotificationsState};
pub use payment::{payments_router, PaymentsState};
pub use shipping::{shipping_profiles_router, ShippingProfilesState};
pub use shop::{shop_community_router, shop_profile_router, shops_router, ShopProfileState, ShopsState};
pub use user::{users_router, UsersState};
pub use wishlist::{wishlist_router, WishlistState};
