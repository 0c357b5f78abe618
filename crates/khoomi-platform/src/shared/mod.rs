//! Shared Module
//!
//! Cross-cutting concerns and shared utilities.

pub mod api_common;
pub mod default_flag;
pub mod error;
pub mod ids;
pub mod indexes;
pub mod middleware;
pub mod multipart;
pub mod slug;
pub mod validation;

// APIs
pub mod health_api;

// Services
pub mod authorization_service;
pub mod deadline;

// Re-export commonly used items
pub use api_common::{ApiResponse, PagedResponse, PaginationParams};
pub use authorization_service::{AuthContext, AuthorizationService};
pub use deadline::{enforce_deadline, DeadlinePolicy};
pub use error::{PlatformError, Result};
pub use health_api::{health_router, HealthState};
pub use indexes::initialize_indexes;
pub use middleware::{envelope_routing_misses, AppState, AuthLayer, Authenticated, OptionalAuth, TrustedProxies};
