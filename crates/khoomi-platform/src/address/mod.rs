//! User address aggregate

pub mod api;
pub mod entity;
pub mod repository;

pub use api::{addresses_router, AddressesState};
pub use entity::{AddressInput, UserAddress, MAX_ADDRESSES_PER_USER};
pub use repository::AddressRepository;
