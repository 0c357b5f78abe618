//! Notification Settings API

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::notification::entity::{NotificationSettings, NotificationToggle, NotificationToggles};
use crate::notification::repository::NotificationRepository;
use crate::shared::api_common::{ApiResponse, AppJson, AppPath};
use crate::shared::authorization_service::{checks, AuthorizationService};
use crate::shared::error::Result;
use crate::shared::middleware::Authenticated;

#[derive(Clone)]
pub struct NotificationsState {
    pub notification_repo: Arc<NotificationRepository>,
    pub authz_service: Arc<AuthorizationService>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationSettingsResponse {
    pub user_id: String,
    #[serde(flatten)]
    pub toggles: NotificationToggles,
    pub modified_at: DateTime<Utc>,
}

impl From<NotificationSettings> for NotificationSettingsResponse {
    fn from(s: NotificationSettings) -> Self {
        Self {
            toggles: s.toggles(),
            user_id: s.user_id,
            modified_at: s.modified_at,
        }
    }
}

/// Change a single toggle
#[derive(Debug, Deserialize, ToSchema)]
pub struct ToggleUpdateRequest {
    pub field: NotificationToggle,
    pub value: bool,
}

#[utoipa::path(
    get,
    path = "/users/{id}/notifications",
    tag = "notifications",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Settings", body = ApiResponse<NotificationSettingsResponse>),
        (status = 404, description = "No settings stored")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_notification_settings(
    State(state): State<NotificationsState>,
    auth: Authenticated,
    AppPath(user_id): AppPath<String>,
) -> Result<Json<ApiResponse<NotificationSettingsResponse>>> {
    checks::require_self(&state.authz_service, &auth, &user_id).await?;
    let settings = state.notification_repo.get(&user_id).await?;
    Ok(Json(ApiResponse::ok("notification settings", settings.into())))
}

/// Create settings; a missing body means the defaults
#[utoipa::path(
    post,
    path = "/users/{id}/notifications",
    tag = "notifications",
    params(("id" = String, Path, description = "User ID")),
    request_body = NotificationToggles,
    responses(
        (status = 200, description = "Settings created", body = ApiResponse<NotificationSettingsResponse>),
        (status = 409, description = "Settings already exist")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_notification_settings(
    State(state): State<NotificationsState>,
    auth: Authenticated,
    AppPath(user_id): AppPath<String>,
    body: Option<AppJson<NotificationToggles>>,
) -> Result<Json<ApiResponse<NotificationSettingsResponse>>> {
    checks::require_self(&state.authz_service, &auth, &user_id).await?;
    let toggles = body.map(|AppJson(t)| t).unwrap_or_default();
    let settings = state.notification_repo.create(&user_id, toggles).await?;
    Ok(Json(ApiResponse::ok("notification settings created", settings.into())))
}

/// Replace every toggle
#[utoipa::path(
    put,
    path = "/users/{id}/notifications",
    tag = "notifications",
    params(("id" = String, Path, description = "User ID")),
    request_body = NotificationToggles,
    responses((status = 200, description = "Settings replaced", body = ApiResponse<NotificationSettingsResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn replace_notification_settings(
    State(state): State<NotificationsState>,
    auth: Authenticated,
    AppPath(user_id): AppPath<String>,
    AppJson(toggles): AppJson<NotificationToggles>,
) -> Result<Json<ApiResponse<NotificationSettingsResponse>>> {
    checks::require_self(&state.authz_service, &auth, &user_id).await?;
    let settings = state.notification_repo.replace(&user_id, toggles).await?;
    Ok(Json(ApiResponse::ok("notification settings updated", settings.into())))
}

/// Update the requested toggle only
#[utoipa::path(
    patch,
    path = "/users/{id}/notifications",
    tag = "notifications",
    params(("id" = String, Path, description = "User ID")),
    request_body = ToggleUpdateRequest,
    responses((status = 200, description = "Toggle updated", body = ApiResponse<NotificationSettingsResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn update_notification_toggle(
    State(state): State<NotificationsState>,
    auth: Authenticated,
    AppPath(user_id): AppPath<String>,
    AppJson(req): AppJson<ToggleUpdateRequest>,
) -> Result<Json<ApiResponse<NotificationSettingsResponse>>> {
    checks::require_self(&state.authz_service, &auth, &user_id).await?;
    let settings = state.notification_repo.set_toggle(&user_id, req.field, req.value).await?;
    Ok(Json(ApiResponse::ok("notification setting updated", settings.into())))
}

pub fn notifications_router(state: NotificationsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(
            get_notification_settings,
            create_notification_settings,
            replace_notification_settings,
            update_notification_toggle
        ))
        .with_state(state)
}
