//! Request deadlines
//!
//! Every request runs under a deadline picked from a route table. When it
//! expires the handler future is dropped, which cancels in-flight driver I/O;
//! an open transaction session is aborted when it is dropped.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::shared::error::PlatformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineClass {
    Default,
    /// Multi-document transactional writes
    LongWrite,
    /// Listing creation including image uploads
    ListingCreate,
}

/// `*` matches exactly one path segment.
const ROUTES: &[(&str, &str, DeadlineClass)] = &[
    ("POST", "/api/listings", DeadlineClass::ListingCreate),
    ("PATCH", "/api/listings/*/state", DeadlineClass::LongWrite),
    ("DELETE", "/api/listings/*", DeadlineClass::LongWrite),
    ("POST", "/api/users", DeadlineClass::LongWrite),
    ("POST", "/api/users/login", DeadlineClass::LongWrite),
    ("POST", "/api/users/send-verify-email", DeadlineClass::LongWrite),
    ("GET", "/api/users/verify-email", DeadlineClass::LongWrite),
    ("POST", "/api/users/send-password-reset", DeadlineClass::LongWrite),
    ("POST", "/api/users/password-reset", DeadlineClass::LongWrite),
    ("PATCH", "/api/users/me/password", DeadlineClass::LongWrite),
    ("PUT", "/api/users/me/thumbnail", DeadlineClass::LongWrite),
    ("POST", "/api/users/*/addresses", DeadlineClass::LongWrite),
    ("PUT", "/api/users/*/addresses/*", DeadlineClass::LongWrite),
    ("PUT", "/api/users/*/addresses/*/default", DeadlineClass::LongWrite),
    ("POST", "/api/users/*/payment-information", DeadlineClass::LongWrite),
    ("PUT", "/api/users/*/payment-information/*", DeadlineClass::LongWrite),
    ("PUT", "/api/users/*/payment-information/*/default", DeadlineClass::LongWrite),
    ("POST", "/api/users/*/wishlist", DeadlineClass::LongWrite),
    ("DELETE", "/api/users/*/wishlist/*", DeadlineClass::LongWrite),
    ("POST", "/api/shops", DeadlineClass::LongWrite),
    ("PUT", "/api/shops/*/logo", DeadlineClass::LongWrite),
    ("PUT", "/api/shops/*/banner", DeadlineClass::LongWrite),
    ("POST", "/api/shops/*/gallery", DeadlineClass::LongWrite),
    ("POST", "/api/shops/*/followers", DeadlineClass::LongWrite),
    ("DELETE", "/api/shops/*/followers", DeadlineClass::LongWrite),
    ("DELETE", "/api/shops/*/followers/remove", DeadlineClass::LongWrite),
    ("POST", "/api/shops/*/reviews", DeadlineClass::LongWrite),
    ("DELETE", "/api/shops/*/reviews", DeadlineClass::LongWrite),
    ("DELETE", "/api/shops/*/reviews/other", DeadlineClass::LongWrite),
];

#[derive(Debug, Clone)]
pub struct DeadlinePolicy {
    pub default: Duration,
    pub long_write: Duration,
    pub listing_create: Duration,
}

impl Default for DeadlinePolicy {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(30),
            long_write: Duration::from_secs(100),
            listing_create: Duration::from_secs(50),
        }
    }
}

impl From<&khoomi_config::DeadlineConfig> for DeadlinePolicy {
    fn from(config: &khoomi_config::DeadlineConfig) -> Self {
        Self {
            default: Duration::from_secs(config.default_secs),
            long_write: Duration::from_secs(config.long_write_secs),
            listing_create: Duration::from_secs(config.listing_create_secs),
        }
    }
}

impl DeadlinePolicy {
    pub fn classify(method: &Method, path: &str) -> DeadlineClass {
        let path = path.trim_end_matches('/');
        ROUTES
            .iter()
            .find(|(m, pattern, _)| *m == method.as_str() && path_matches(pattern, path))
            .map(|(_, _, class)| *class)
            .unwrap_or(DeadlineClass::Default)
    }

    pub fn duration(&self, class: DeadlineClass) -> Duration {
        match class {
            DeadlineClass::Default => self.default,
            DeadlineClass::LongWrite => self.long_write,
            DeadlineClass::ListingCreate => self.listing_create,
        }
    }

    pub fn for_request(&self, method: &Method, path: &str) -> Duration {
        self.duration(Self::classify(method, path))
    }
}

fn path_matches(pattern: &str, path: &str) -> bool {
    let mut expected = pattern.split('/');
    let mut actual = path.split('/');
    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return true,
            (Some("*"), Some(segment)) if !segment.is_empty() => {}
            (Some(e), Some(a)) if e == a => {}
            _ => return false,
        }
    }
}

/// `axum::middleware::from_fn_with_state` handler
pub async fn enforce_deadline(State(policy): State<Arc<DeadlinePolicy>>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let limit = policy.for_request(&method, &path);

    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!(method = %method, path = %path, limit_secs = limit.as_secs(), "Request deadline exceeded");
            PlatformError::DeadlineExceeded.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_classes() {
        assert_eq!(DeadlinePolicy::classify(&Method::POST, "/api/listings"), DeadlineClass::ListingCreate);
        assert_eq!(DeadlinePolicy::classify(&Method::GET, "/api/listings"), DeadlineClass::Default);
        assert_eq!(
            DeadlinePolicy::classify(&Method::POST, "/api/shops/abc/followers"),
            DeadlineClass::LongWrite
        );
        assert_eq!(
            DeadlinePolicy::classify(&Method::PUT, "/api/users/u1/addresses/a1/default"),
            DeadlineClass::LongWrite
        );
        assert_eq!(DeadlinePolicy::classify(&Method::GET, "/api/shops/abc"), DeadlineClass::Default);
        assert_eq!(DeadlinePolicy::classify(&Method::POST, "/api/users/"), DeadlineClass::LongWrite);
    }

    #[test]
    fn test_wildcard_needs_a_segment() {
        assert!(path_matches("/api/shops/*/followers", "/api/shops/x/followers"));
        assert!(!path_matches("/api/shops/*/followers", "/api/shops//followers"));
        assert!(!path_matches("/api/shops/*/followers", "/api/shops/x/followers/extra"));
    }

    #[test]
    fn test_default_durations() {
        let policy = DeadlinePolicy::default();
        assert_eq!(policy.for_request(&Method::POST, "/api/listings"), Duration::from_secs(50));
        assert_eq!(policy.for_request(&Method::POST, "/api/users/login"), Duration::from_secs(100));
        assert_eq!(policy.for_request(&Method::GET, "/api/categories"), Duration::from_secs(30));
    }
}
