//! Listings API

use std::sync::Arc;

use axum::extract::{multipart::MultipartRejection, Multipart, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::listing::entity::{
    Inventory, Listing, ListingDetails, ListingInput, ListingState, Personalization, ProcessingBlock, RatingSummary,
    Variation,
};
use crate::listing::repository::ListingRepository;
use crate::shared::api_common::{ApiResponse, AppJson, AppPath, AppQuery, Empty, PagedResponse, PaginationParams, SortField};
use crate::shared::authorization_service::{checks, AuthorizationService};
use crate::shared::error::{PlatformError, Result};
use crate::shared::ids::parse_id;
use crate::shared::middleware::{Authenticated, OptionalAuth};
use crate::shared::multipart::UploadForm;
use crate::shop::api::ReviewExcerptResponse;
use crate::shop::ShopRepository;
use crate::writer::AggregateWriter;

const LISTING_SORTS: &[SortField] = &[
    ("created_at", "date.created_at"),
    ("price", "inventory.price"),
    ("views", "views"),
    ("favorers", "favorers_count"),
];

#[derive(Clone)]
pub struct ListingsState {
    pub listing_repo: Arc<ListingRepository>,
    pub shop_repo: Arc<ShopRepository>,
    pub writer: Arc<AggregateWriter>,
    pub authz_service: Arc<AuthorizationService>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListingResponse {
    pub id: String,
    pub shop_id: String,
    pub user_id: String,
    pub state: ListingState,
    pub state_updated_at: DateTime<Utc>,
    pub details: ListingDetails,
    pub main_image: Option<String>,
    pub images: Vec<String>,
    pub processing: ProcessingBlock,
    pub inventory: Inventory,
    pub variations: Vec<Variation>,
    pub has_variations: bool,
    pub personalization: Personalization,
    pub shipping_profile_id: Option<String>,
    pub rating: RatingSummary,
    pub favorers_count: i64,
    pub views: i64,
    pub auto_renew: bool,
    pub recent_reviews: Vec<ReviewExcerptResponse>,
    pub created_at: DateTime<Utc>,
    pub ending_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<Listing> for ListingResponse {
    fn from(l: Listing) -> Self {
        Self {
            id: l.id,
            shop_id: l.shop_id,
            user_id: l.user_id,
            state: l.state.state,
            state_updated_at: l.state.state_updated_at,
            details: l.details,
            main_image: l.main_image,
            images: l.images,
            processing: l.processing,
            inventory: l.inventory,
            variations: l.variations,
            has_variations: l.has_variations,
            personalization: l.personalization,
            shipping_profile_id: l.shipping_profile_id,
            rating: l.rating,
            favorers_count: l.favorers_count,
            views: l.views,
            auto_renew: l.auto_renew,
            recent_reviews: l.recent_reviews.into_iter().map(Into::into).collect(),
            created_at: l.date.created_at,
            ending_at: l.date.ending_at,
            modified_at: l.date.modified_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListingSearchQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PaginationParams,
    /// Substring matched against title, description, tags, and keywords
    pub q: Option<String>,
    /// Category path segment, e.g. `home-living`
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListingStateRequest {
    pub state: ListingState,
}

/// Create a listing (multipart: JSON `data`, file `main_image`, files `images[]`)
#[utoipa::path(
    post,
    path = "/listings",
    tag = "listings",
    request_body(content_type = "multipart/form-data", description = "`data` is a JSON ListingInput"),
    responses(
        (status = 200, description = "Listing created", body = ApiResponse<ListingResponse>),
        (status = 400, description = "Invalid listing data"),
        (status = 403, description = "Caller is not a seller"),
        (status = 422, description = "Seller has no shop")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_listing(
    State(state): State<ListingsState>,
    auth: Authenticated,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<ListingResponse>>> {
    let seller = checks::require_seller(&state.authz_service, &auth).await?;
    let shop_id = seller
        .shop_id
        .ok_or_else(|| PlatformError::unprocessable("open a shop before creating listings"))?;

    let mut form = UploadForm::read(multipart?).await?;
    let input: ListingInput = form.json("data")?;
    let main_image = form.take_file("main_image");
    let images = form.take_files("images");

    let listing = state
        .writer
        .create_listing(&auth.user_id, &shop_id, input, main_image, images)
        .await?;
    Ok(Json(ApiResponse::ok("listing created", listing.into())))
}

/// Search active listings
#[utoipa::path(
    get,
    path = "/listings",
    tag = "listings",
    params(ListingSearchQuery),
    responses((status = 200, description = "Listings", body = ApiResponse<PagedResponse<ListingResponse>>))
)]
pub async fn search_listings(
    State(state): State<ListingsState>,
    AppQuery(query): AppQuery<ListingSearchQuery>,
) -> Result<Json<ApiResponse<PagedResponse<ListingResponse>>>> {
    let page = query.pagination.resolve(LISTING_SORTS, true)?;
    let listings = state
        .listing_repo
        .search(query.q.as_deref(), query.category.as_deref(), &page)
        .await?;
    Ok(Json(ApiResponse::ok("listings", listings.map(ListingResponse::from))))
}

/// Read a listing; non-active listings are visible to their shop owner only
#[utoipa::path(
    get,
    path = "/listings/{id}",
    tag = "listings",
    params(("id" = String, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing found", body = ApiResponse<ListingResponse>),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn get_listing(
    State(state): State<ListingsState>,
    auth: OptionalAuth,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<ListingResponse>>> {
    let id = parse_id("Listing", &id)?;
    let listing = state.listing_repo.get(&id).await?;
    let is_owner = auth.as_ref().is_some_and(|ctx| ctx.is_user(&listing.user_id));
    if !listing.is_active() && !is_owner {
        return Err(PlatformError::not_found("Listing", &id));
    }

    if !is_owner {
        if let Err(e) = state.listing_repo.increment_views(&id).await {
            warn!(listing_id = %id, error = %e, "Failed to record listing view");
        }
    }
    Ok(Json(ApiResponse::ok("listing found", listing.into())))
}

/// Move a listing between draft, active, inactive, and sold out
#[utoipa::path(
    patch,
    path = "/listings/{id}/state",
    tag = "listings",
    params(("id" = String, Path, description = "Listing ID")),
    request_body = ListingStateRequest,
    responses(
        (status = 200, description = "State changed", body = ApiResponse<ListingResponse>),
        (status = 401, description = "Not the shop owner"),
        (status = 422, description = "Transition not allowed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_listing_state(
    State(state): State<ListingsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(req): AppJson<ListingStateRequest>,
) -> Result<Json<ApiResponse<ListingResponse>>> {
    let id = parse_id("Listing", &id)?;
    let listing = state.listing_repo.get(&id).await?;
    checks::require_shop_owner(&state.authz_service, &auth, &listing.shop_id).await?;
    let listing = state
        .writer
        .change_listing_state(&listing.shop_id, &id, req.state)
        .await?;
    Ok(Json(ApiResponse::ok("listing state updated", listing.into())))
}

#[utoipa::path(
    delete,
    path = "/listings/{id}",
    tag = "listings",
    params(("id" = String, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Listing deleted", body = ApiResponse<Empty>),
        (status = 401, description = "Not the shop owner")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_listing(
    State(state): State<ListingsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<Empty>>> {
    let id = parse_id("Listing", &id)?;
    let listing = state.listing_repo.get(&id).await?;
    checks::require_shop_owner(&state.authz_service, &auth, &listing.shop_id).await?;
    state.writer.delete_listing(&listing.shop_id, &id).await?;
    Ok(Json(ApiResponse::<Empty>::done("listing deleted")))
}

/// A shop's listings; the owner also sees drafts and inactive ones
#[utoipa::path(
    get,
    path = "/shops/{id}/listings",
    tag = "listings",
    params(("id" = String, Path, description = "Shop ID"), PaginationParams),
    responses((status = 200, description = "Listings", body = ApiResponse<PagedResponse<ListingResponse>>))
)]
pub async fn list_shop_listings(
    State(state): State<ListingsState>,
    auth: OptionalAuth,
    AppPath(id): AppPath<String>,
    AppQuery(pagination): AppQuery<PaginationParams>,
) -> Result<Json<ApiResponse<PagedResponse<ListingResponse>>>> {
    let shop_id = parse_id("Shop", &id)?;
    let page = pagination.resolve(LISTING_SORTS, true)?;
    let shop = state.shop_repo.get(&shop_id).await?;
    let include_hidden = auth.as_ref().is_some_and(|ctx| shop.is_owned_by(&ctx.user_id));
    let listings = state.listing_repo.list_by_shop(&shop_id, include_hidden, &page).await?;
    Ok(Json(ApiResponse::ok("shop listings", listings.map(ListingResponse::from))))
}

pub fn listings_router(state: ListingsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_listing, search_listings))
        .routes(routes!(get_listing, delete_listing))
        .routes(routes!(change_listing_state))
        .routes(routes!(list_shop_listings))
        .with_state(state)
}
