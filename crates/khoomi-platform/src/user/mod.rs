//! User Aggregate
//!
//! Accounts, login bookkeeping, and deletion requests.

pub mod api;
pub mod entity;
pub mod repository;

pub use api::{users_router, UsersState};
pub use entity::{User, UserRole, UserStatus};
pub use repository::UserRepository;
