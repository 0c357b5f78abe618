//! Addresses API
//!
//! A user's shipping addresses. At most one is the default.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::address::entity::{AddressInput, UserAddress};
use crate::address::repository::AddressRepository;
use crate::shared::api_common::{ApiResponse, AppJson, AppPath, Empty};
use crate::shared::authorization_service::{checks, AuthorizationService};
use crate::shared::error::Result;
use crate::shared::middleware::Authenticated;
use crate::writer::AggregateWriter;

#[derive(Clone)]
pub struct AddressesState {
    pub address_repo: Arc<AddressRepository>,
    pub writer: Arc<AggregateWriter>,
    pub authz_service: Arc<AuthorizationService>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressResponse {
    pub id: String,
    pub user_id: String,
    pub city: String,
    pub state: String,
    pub street: String,
    pub postal_code: String,
    pub country: String,
    pub is_default_shipping_address: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<UserAddress> for AddressResponse {
    fn from(a: UserAddress) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            city: a.city,
            state: a.state,
            street: a.street,
            postal_code: a.postal_code,
            country: a.country,
            is_default_shipping_address: a.is_default_shipping_address,
            created_at: a.created_at,
            modified_at: a.modified_at,
        }
    }
}

/// Add an address
#[utoipa::path(
    post,
    path = "/users/{id}/addresses",
    tag = "addresses",
    params(("id" = String, Path, description = "User ID")),
    request_body = AddressInput,
    responses(
        (status = 200, description = "Address created", body = ApiResponse<AddressResponse>),
        (status = 400, description = "Validation error"),
        (status = 422, description = "Address limit reached")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_address(
    State(state): State<AddressesState>,
    auth: Authenticated,
    AppPath(user_id): AppPath<String>,
    AppJson(req): AppJson<AddressInput>,
) -> Result<Json<ApiResponse<AddressResponse>>> {
    checks::require_self(&state.authz_service, &auth, &user_id).await?;
    req.validate()?;
    let address = state.writer.insert_flagged(UserAddress::new(user_id, req)).await?;
    Ok(Json(ApiResponse::ok("address created", address.into())))
}

/// List addresses, default first
#[utoipa::path(
    get,
    path = "/users/{id}/addresses",
    tag = "addresses",
    params(("id" = String, Path, description = "User ID")),
    responses((status = 200, description = "Addresses", body = ApiResponse<Vec<AddressResponse>>)),
    security(("bearer_auth" = []))
)]
pub async fn list_addresses(
    State(state): State<AddressesState>,
    auth: Authenticated,
    AppPath(user_id): AppPath<String>,
) -> Result<Json<ApiResponse<Vec<AddressResponse>>>> {
    checks::require_self(&state.authz_service, &auth, &user_id).await?;
    let addresses = state.address_repo.list(&user_id).await?;
    Ok(Json(ApiResponse::ok(
        "addresses",
        addresses.into_iter().map(AddressResponse::from).collect(),
    )))
}

/// Replace an address
#[utoipa::path(
    put,
    path = "/users/{id}/addresses/{address_id}",
    tag = "addresses",
    params(
        ("id" = String, Path, description = "User ID"),
        ("address_id" = String, Path, description = "Address ID")
    ),
    request_body = AddressInput,
    responses(
        (status = 200, description = "Address updated", body = ApiResponse<AddressResponse>),
        (status = 404, description = "Address not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_address(
    State(state): State<AddressesState>,
    auth: Authenticated,
    AppPath((user_id, address_id)): AppPath<(String, String)>,
    AppJson(req): AppJson<AddressInput>,
) -> Result<Json<ApiResponse<AddressResponse>>> {
    checks::require_self(&state.authz_service, &auth, &user_id).await?;
    req.validate()?;
    let address: UserAddress = state
        .writer
        .update_flagged(&user_id, &address_id, req.to_set_document(), req.is_default_shipping_address)
        .await?;
    Ok(Json(ApiResponse::ok("address updated", address.into())))
}

/// Delete an address
#[utoipa::path(
    delete,
    path = "/users/{id}/addresses/{address_id}",
    tag = "addresses",
    params(
        ("id" = String, Path, description = "User ID"),
        ("address_id" = String, Path, description = "Address ID")
    ),
    responses(
        (status = 200, description = "Address deleted", body = ApiResponse<Empty>),
        (status = 404, description = "Address not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_address(
    State(state): State<AddressesState>,
    auth: Authenticated,
    AppPath((user_id, address_id)): AppPath<(String, String)>,
) -> Result<Json<ApiResponse<Empty>>> {
    checks::require_self(&state.authz_service, &auth, &user_id).await?;
    state.address_repo.delete(&user_id, &address_id).await?;
    Ok(Json(ApiResponse::done("address deleted")))
}

/// Make an address the default shipping address
#[utoipa::path(
    put,
    path = "/users/{id}/addresses/{address_id}/default",
    tag = "addresses",
    params(
        ("id" = String, Path, description = "User ID"),
        ("address_id" = String, Path, description = "Address ID")
    ),
    responses(
        (status = 200, description = "Default changed", body = ApiResponse<AddressResponse>),
        (status = 404, description = "Address not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_default_address(
    State(state): State<AddressesState>,
    auth: Authenticated,
    AppPath((user_id, address_id)): AppPath<(String, String)>,
) -> Result<Json<ApiResponse<AddressResponse>>> {
    checks::require_self(&state.authz_service, &auth, &user_id).await?;
    let address: UserAddress = state.writer.set_default(&user_id, &address_id).await?;
    Ok(Json(ApiResponse::ok("default address updated", address.into())))
}

pub fn addresses_router(state: AddressesState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_address, list_addresses))
        .routes(routes!(update_address, delete_address))
        .routes(routes!(set_default_address))
        .with_state(state)
}
