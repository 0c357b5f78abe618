//! Shop shipping profiles

pub mod api;
pub mod entity;
pub mod repository;

pub use api::{shipping_profiles_router, ShippingProfilesState};
pub use entity::{ProcessingTimeUnit, ShippingProfile, ShippingProfileInput};
pub use repository::ShippingProfileRepository;
