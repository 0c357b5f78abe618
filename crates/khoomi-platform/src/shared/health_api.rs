//! Health Check Endpoints
//!
//! - /health - Combined health status (MongoDB and the revocation store)
//! - /ready - Readiness probe

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::token_store::TokenStore;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
    /// Running but not yet ready for traffic
    Degraded,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SimpleHealthResponse {
    pub status: HealthStatus,
}

/// Health service state
#[derive(Clone)]
pub struct HealthState {
    pub store: Option<Store>,
    pub token_store: Option<Arc<dyn TokenStore>>,
    pub version: Option<String>,
    /// Set once startup has finished
    pub ready: Arc<AtomicBool>,
}

impl HealthState {
    pub fn new(store: Option<Store>, token_store: Option<Arc<dyn TokenStore>>, version: Option<String>) -> Self {
        Self {
            store,
            token_store,
            version,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn run_checks(&self) -> Vec<HealthCheck> {
        let mut checks = Vec::new();
        if let Some(store) = &self.store {
            let start = Instant::now();
            checks.push(to_check("mongodb", start, store.ping().await));
        }
        if let Some(tokens) = &self.token_store {
            let start = Instant::now();
            checks.push(to_check("token_store", start, tokens.contains("health-probe").await.map(|_| ())));
        }
        checks
    }
}

fn to_check(name: &str, start: Instant, outcome: crate::Result<()>) -> HealthCheck {
    let (status, message) = match outcome {
        Ok(()) => (HealthStatus::Up, None),
        Err(e) => (HealthStatus::Down, Some(e.to_string())),
    };
    HealthCheck {
        name: name.to_string(),
        status,
        message,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

fn overall(checks: &[HealthCheck], ready: bool) -> HealthStatus {
    if checks.iter().any(|c| c.status == HealthStatus::Down) {
        HealthStatus::Down
    } else if !ready {
        HealthStatus::Degraded
    } else {
        HealthStatus::Up
    }
}

/// Combined health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    )
)]
pub async fn get_health(State(state): State<HealthState>) -> Response {
    let checks = state.run_checks().await;
    let status = overall(&checks, state.is_ready());

    let response = HealthResponse {
        status,
        timestamp: Utc::now(),
        version: state.version.clone(),
        checks,
    };
    let code = if status == HealthStatus::Down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(response)).into_response()
}

/// Readiness probe; 503 until startup completes or while a dependency is down.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = SimpleHealthResponse),
        (status = 503, description = "Service is not ready", body = SimpleHealthResponse)
    )
)]
pub async fn get_readiness(State(state): State<HealthState>) -> Response {
    let status = if state.is_ready() {
        match overall(&state.run_checks().await, true) {
            HealthStatus::Up => HealthStatus::Up,
            _ => HealthStatus::Down,
        }
    } else {
        HealthStatus::Down
    };
    let code = if status == HealthStatus::Up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(SimpleHealthResponse { status })).into_response()
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/ready", get(get_readiness))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token_store::MemoryTokenStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn test_health_status_serialization() {
        assert_eq!(serde_json::to_string(&HealthStatus::Up).unwrap(), "\"UP\"");
        assert_eq!(serde_json::to_string(&HealthStatus::Degraded).unwrap(), "\"DEGRADED\"");
    }

    #[tokio::test]
    async fn test_ready_only_after_startup() {
        let state = HealthState::new(None, Some(Arc::new(MemoryTokenStore::new())), None);
        let app = health_router(state.clone());

        let response = app
            .clone()
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.set_ready();
        let response = app
            .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reports_degraded_before_ready() {
        let state = HealthState::new(None, None, Some("0.1.0".into()));
        let response = get_health(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
