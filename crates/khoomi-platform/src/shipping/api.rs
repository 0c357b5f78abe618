//! Shipping Profiles API
//!
//! Readable by anyone; only the shop owner may change them.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::shared::api_common::{ApiResponse, AppJson, AppPath, Empty};
use crate::shared::authorization_service::{checks, AuthorizationService};
use crate::shared::error::Result;
use crate::shared::middleware::Authenticated;
use crate::shipping::entity::{ShippingProfile, ShippingProfileInput};
use crate::shipping::repository::ShippingProfileRepository;

#[derive(Clone)]
pub struct ShippingProfilesState {
    pub shipping_repo: Arc<ShippingProfileRepository>,
    pub authz_service: Arc<AuthorizationService>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShippingProfileResponse {
    pub id: String,
    pub shop_id: String,
    #[serde(flatten)]
    pub profile: ShippingProfileInput,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<ShippingProfile> for ShippingProfileResponse {
    fn from(p: ShippingProfile) -> Self {
        Self {
            id: p.id,
            shop_id: p.shop_id,
            profile: ShippingProfileInput {
                title: p.title,
                min_processing_time: p.min_processing_time,
                max_processing_time: p.max_processing_time,
                processing_time_unit: p.processing_time_unit,
                handling_fee: p.handling_fee,
                origin_state: p.origin_state,
                origin_postal_code: p.origin_postal_code,
                min_delivery_days: p.min_delivery_days,
                max_delivery_days: p.max_delivery_days,
                primary_price: p.primary_price,
                secondary_price: p.secondary_price,
                destinations: p.destinations,
                shipping_service: p.shipping_service,
                offers_free_shipping: p.offers_free_shipping,
                auto_calculate_price: p.auto_calculate_price,
                return_policy: p.return_policy,
            },
            created_at: p.created_at,
            modified_at: p.modified_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/shops/{id}/shipping-profiles",
    tag = "shipping-profiles",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = ShippingProfileInput,
    responses(
        (status = 200, description = "Profile created", body = ApiResponse<ShippingProfileResponse>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Not the shop owner")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_shipping_profile(
    State(state): State<ShippingProfilesState>,
    auth: Authenticated,
    AppPath(shop_id): AppPath<String>,
    AppJson(req): AppJson<ShippingProfileInput>,
) -> Result<Json<ApiResponse<ShippingProfileResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &shop_id).await?;
    req.validate()?;
    let profile = ShippingProfile::new(shop_id, req);
    state.shipping_repo.insert(&profile).await?;
    info!(shop_id = %profile.shop_id, profile_id = %profile.id, "Shipping profile created");
    Ok(Json(ApiResponse::ok("shipping profile created", profile.into())))
}

#[utoipa::path(
    get,
    path = "/shops/{id}/shipping-profiles",
    tag = "shipping-profiles",
    params(("id" = String, Path, description = "Shop ID")),
    responses((status = 200, description = "Profiles", body = ApiResponse<Vec<ShippingProfileResponse>>))
)]
pub async fn list_shipping_profiles(
    State(state): State<ShippingProfilesState>,
    AppPath(shop_id): AppPath<String>,
) -> Result<Json<ApiResponse<Vec<ShippingProfileResponse>>>> {
    let profiles = state.shipping_repo.list_by_shop(&shop_id).await?;
    Ok(Json(ApiResponse::ok(
        "shipping profiles",
        profiles.into_iter().map(ShippingProfileResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/shops/{id}/shipping-profiles/{profile_id}",
    tag = "shipping-profiles",
    params(
        ("id" = String, Path, description = "Shop ID"),
        ("profile_id" = String, Path, description = "Shipping profile ID")
    ),
    responses(
        (status = 200, description = "Profile", body = ApiResponse<ShippingProfileResponse>),
        (status = 404, description = "Profile not found")
    )
)]
pub async fn get_shipping_profile(
    State(state): State<ShippingProfilesState>,
    AppPath((shop_id, profile_id)): AppPath<(String, String)>,
) -> Result<Json<ApiResponse<ShippingProfileResponse>>> {
    let profile = state.shipping_repo.get(&shop_id, &profile_id).await?;
    Ok(Json(ApiResponse::ok("shipping profile", profile.into())))
}

#[utoipa::path(
    put,
    path = "/shops/{id}/shipping-profiles/{profile_id}",
    tag = "shipping-profiles",
    params(
        ("id" = String, Path, description = "Shop ID"),
        ("profile_id" = String, Path, description = "Shipping profile ID")
    ),
    request_body = ShippingProfileInput,
    responses(
        (status = 200, description = "Profile replaced", body = ApiResponse<ShippingProfileResponse>),
        (status = 404, description = "Profile not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_shipping_profile(
    State(state): State<ShippingProfilesState>,
    auth: Authenticated,
    AppPath((shop_id, profile_id)): AppPath<(String, String)>,
    AppJson(req): AppJson<ShippingProfileInput>,
) -> Result<Json<ApiResponse<ShippingProfileResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &shop_id).await?;
    req.validate()?;
    let mut profile = state.shipping_repo.get(&shop_id, &profile_id).await?;
    profile.apply(req);
    state.shipping_repo.replace(&profile).await?;
    Ok(Json(ApiResponse::ok("shipping profile updated", profile.into())))
}

#[utoipa::path(
    delete,
    path = "/shops/{id}/shipping-profiles/{profile_id}",
    tag = "shipping-profiles",
    params(
        ("id" = String, Path, description = "Shop ID"),
        ("profile_id" = String, Path, description = "Shipping profile ID")
    ),
    responses(
        (status = 200, description = "Profile deleted", body = ApiResponse<Empty>),
        (status = 404, description = "Profile not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_shipping_profile(
    State(state): State<ShippingProfilesState>,
    auth: Authenticated,
    AppPath((shop_id, profile_id)): AppPath<(String, String)>,
) -> Result<Json<ApiResponse<Empty>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &shop_id).await?;
    state.shipping_repo.delete(&shop_id, &profile_id).await?;
    Ok(Json(ApiResponse::done("shipping profile deleted")))
}

pub fn shipping_profiles_router(state: ShippingProfilesState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_shipping_profile, list_shipping_profiles))
        .routes(routes!(get_shipping_profile, update_shipping_profile, delete_shipping_profile))
        .with_state(state)
}
