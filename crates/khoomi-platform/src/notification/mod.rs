//! Per-user notification settings

pub mod api;
pub mod entity;
pub mod repository;

pub use api::{notifications_router, NotificationsState};
pub use entity::{NotificationSettings, NotificationToggle, NotificationToggles};
pub use repository::NotificationRepository;
