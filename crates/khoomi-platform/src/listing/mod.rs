//! Listing aggregate

pub mod api;
pub mod entity;
pub mod repository;

pub use api::{listings_router, ListingsState};
pub use entity::{Listing, ListingImages, ListingInput, ListingState};
pub use repository::ListingRepository;
