//! Wishlist API

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::shared::api_common::{ApiResponse, AppJson, AppPath, AppQuery, Empty, PagedResponse, PaginationParams, SortField};
use crate::shared::authorization_service::{checks, AuthorizationService};
use crate::shared::error::Result;
use crate::shared::ids::parse_id;
use crate::shared::middleware::Authenticated;
use crate::wishlist::entity::UserWishlist;
use crate::wishlist::repository::WishlistRepository;
use crate::writer::AggregateWriter;

const WISHLIST_SORTS: &[SortField] = &[("created_at", "created_at")];

#[derive(Clone)]
pub struct WishlistState {
    pub wishlist_repo: Arc<WishlistRepository>,
    pub writer: Arc<AggregateWriter>,
    pub authz_service: Arc<AuthorizationService>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddWishlistRequest {
    pub listing_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WishlistItemResponse {
    pub id: String,
    pub listing_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserWishlist> for WishlistItemResponse {
    fn from(w: UserWishlist) -> Self {
        Self {
            id: w.id,
            listing_id: w.listing_id,
            created_at: w.created_at,
        }
    }
}

/// Save a listing to the wishlist
#[utoipa::path(
    post,
    path = "/users/{id}/wishlist",
    tag = "wishlist",
    params(("id" = String, Path, description = "User ID")),
    request_body = AddWishlistRequest,
    responses(
        (status = 200, description = "Listing saved", body = ApiResponse<WishlistItemResponse>),
        (status = 404, description = "Listing not found"),
        (status = 409, description = "Already in wishlist")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_wishlist_item(
    State(state): State<WishlistState>,
    auth: Authenticated,
    AppPath(user_id): AppPath<String>,
    AppJson(req): AppJson<AddWishlistRequest>,
) -> Result<Json<ApiResponse<WishlistItemResponse>>> {
    checks::require_self(&state.authz_service, &auth, &user_id).await?;
    let listing_id = parse_id("Listing", &req.listing_id)?;
    let item = state.writer.add_to_wishlist(&user_id, &listing_id).await?;
    Ok(Json(ApiResponse::ok("listing added to wishlist", item.into())))
}

/// Saved listings, newest first
#[utoipa::path(
    get,
    path = "/users/{id}/wishlist",
    tag = "wishlist",
    params(("id" = String, Path, description = "User ID"), PaginationParams),
    responses((status = 200, description = "Wishlist", body = ApiResponse<PagedResponse<WishlistItemResponse>>)),
    security(("bearer_auth" = []))
)]
pub async fn list_wishlist(
    State(state): State<WishlistState>,
    auth: Authenticated,
    AppPath(user_id): AppPath<String>,
    AppQuery(pagination): AppQuery<PaginationParams>,
) -> Result<Json<ApiResponse<PagedResponse<WishlistItemResponse>>>> {
    checks::require_self(&state.authz_service, &auth, &user_id).await?;
    let page = pagination.resolve(WISHLIST_SORTS, true)?;
    let items = state.wishlist_repo.list(&user_id, &page).await?;
    Ok(Json(ApiResponse::ok("wishlist", items.map(WishlistItemResponse::from))))
}

#[utoipa::path(
    delete,
    path = "/users/{id}/wishlist/{listing_id}",
    tag = "wishlist",
    params(
        ("id" = String, Path, description = "User ID"),
        ("listing_id" = String, Path, description = "Listing ID")
    ),
    responses(
        (status = 200, description = "Listing removed", body = ApiResponse<Empty>),
        (status = 404, description = "Listing not in wishlist")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_wishlist_item(
    State(state): State<WishlistState>,
    auth: Authenticated,
    AppPath((user_id, listing_id)): AppPath<(String, String)>,
) -> Result<Json<ApiResponse<Empty>>> {
    checks::require_self(&state.authz_service, &auth, &user_id).await?;
    state.writer.remove_from_wishlist(&user_id, &listing_id).await?;
    Ok(Json(ApiResponse::done("listing removed from wishlist")))
}

pub fn wishlist_router(state: WishlistState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(add_wishlist_item, list_wishlist))
        .routes(routes!(remove_wishlist_item))
        .with_state(state)
}
