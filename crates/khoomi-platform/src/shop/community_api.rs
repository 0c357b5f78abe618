//! Followers and reviews API
//!
//! Every write here goes through the aggregate writer so the shop's
//! follower and review projections stay in step with the rows.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::shared::api_common::{ApiResponse, AppJson, AppPath, AppQuery, Empty, PagedResponse, PaginationParams, SortField};
use crate::shared::authorization_service::checks;
use crate::shared::error::{PlatformError, Result};
use crate::shared::ids::parse_id;
use crate::shared::middleware::Authenticated;
use crate::shop::api::ShopsState;
use crate::shop::entity::{ReviewStatus, ShopFollower, ShopReview};

const FOLLOWER_SORTS: &[SortField] = &[("joined_at", "joined_at"), ("login_name", "login_name")];
const REVIEW_SORTS: &[SortField] = &[("created_at", "created_at")];

#[derive(Debug, Serialize, ToSchema)]
pub struct ShopFollowerResponse {
    pub id: String,
    pub shop_id: String,
    pub user_id: String,
    pub login_name: String,
    pub first_name: String,
    pub last_name: String,
    pub thumbnail: Option<String>,
    pub is_owner: bool,
    pub joined_at: DateTime<Utc>,
}

impl From<ShopFollower> for ShopFollowerResponse {
    fn from(f: ShopFollower) -> Self {
        Self {
            id: f.id,
            shop_id: f.shop_id,
            user_id: f.user_id,
            login_name: f.login_name,
            first_name: f.first_name,
            last_name: f.last_name,
            thumbnail: f.thumbnail,
            is_owner: f.is_owner,
            joined_at: f.joined_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShopReviewResponse {
    pub id: String,
    pub shop_id: String,
    pub user_id: String,
    pub review_author: String,
    pub thumbnail: Option<String>,
    pub review: String,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
}

impl From<ShopReview> for ShopReviewResponse {
    fn from(r: ShopReview) -> Self {
        Self {
            id: r.id,
            shop_id: r.shop_id,
            user_id: r.user_id,
            review_author: r.review_author,
            thumbnail: r.thumbnail,
            review: r.review,
            status: r.status,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FollowingResponse {
    pub is_following: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TargetUserQuery {
    /// The user whose follow or review is removed
    pub user_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub review: String,
}

/// Follow a shop
#[utoipa::path(
    post,
    path = "/shops/{id}/followers",
    tag = "shop-community",
    params(("id" = String, Path, description = "Shop ID")),
    responses(
        (status = 200, description = "Now following", body = ApiResponse<ShopFollowerResponse>),
        (status = 404, description = "Shop not found"),
        (status = 409, description = "Already following")
    ),
    security(("bearer_auth" = []))
)]
pub async fn follow_shop(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<ShopFollowerResponse>>> {
    let shop_id = parse_id("Shop", &id)?;
    let follower = state.writer.follow_shop(&auth.user_id, &shop_id).await?;
    Ok(Json(ApiResponse::ok("shop followed", follower.into())))
}

/// Unfollow a shop
#[utoipa::path(
    delete,
    path = "/shops/{id}/followers",
    tag = "shop-community",
    params(("id" = String, Path, description = "Shop ID")),
    responses(
        (status = 200, description = "Unfollowed", body = ApiResponse<Empty>),
        (status = 409, description = "Not following")
    ),
    security(("bearer_auth" = []))
)]
pub async fn unfollow_shop(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<Empty>>> {
    let shop_id = parse_id("Shop", &id)?;
    state.writer.unfollow_shop(&auth.user_id, &shop_id).await?;
    Ok(Json(ApiResponse::<Empty>::done("shop unfollowed")))
}

#[utoipa::path(
    get,
    path = "/shops/{id}/followers",
    tag = "shop-community",
    params(("id" = String, Path, description = "Shop ID"), PaginationParams),
    responses((status = 200, description = "Followers", body = ApiResponse<PagedResponse<ShopFollowerResponse>>))
)]
pub async fn list_followers(
    State(state): State<ShopsState>,
    AppPath(id): AppPath<String>,
    AppQuery(pagination): AppQuery<PaginationParams>,
) -> Result<Json<ApiResponse<PagedResponse<ShopFollowerResponse>>>> {
    let shop_id = parse_id("Shop", &id)?;
    let page = pagination.resolve(FOLLOWER_SORTS, true)?;
    let followers = state.shop_repo.list_followers(&shop_id, &page).await?;
    Ok(Json(ApiResponse::ok("shop followers", followers.map(ShopFollowerResponse::from))))
}

/// Whether the caller follows the shop
#[utoipa::path(
    get,
    path = "/shops/{id}/followers/check",
    tag = "shop-community",
    params(("id" = String, Path, description = "Shop ID")),
    responses((status = 200, description = "Follow state", body = ApiResponse<FollowingResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn check_following(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<FollowingResponse>>> {
    let shop_id = parse_id("Shop", &id)?;
    let is_following = state.shop_repo.is_following(&shop_id, &auth.user_id).await?;
    Ok(Json(ApiResponse::ok("follow state", FollowingResponse { is_following })))
}

/// Remove another user's follow (shop owner)
#[utoipa::path(
    delete,
    path = "/shops/{id}/followers/remove",
    tag = "shop-community",
    params(("id" = String, Path, description = "Shop ID"), TargetUserQuery),
    responses(
        (status = 200, description = "Follower removed", body = ApiResponse<Empty>),
        (status = 401, description = "Not the shop owner"),
        (status = 409, description = "User is not following")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_follower(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppQuery(query): AppQuery<TargetUserQuery>,
) -> Result<Json<ApiResponse<Empty>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    let target = parse_id("User", &query.user_id)?;
    if auth.is_user(&target) {
        return Err(PlatformError::validation("use unfollow to leave your own shop"));
    }
    state.writer.remove_other_follower(&auth.user_id, &id, &target).await?;
    Ok(Json(ApiResponse::<Empty>::done("follower removed")))
}

/// Review a shop; one review per user per shop
#[utoipa::path(
    post,
    path = "/shops/{id}/reviews",
    tag = "shop-community",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 200, description = "Review created", body = ApiResponse<ShopReviewResponse>),
        (status = 400, description = "Empty or oversized review"),
        (status = 409, description = "Already reviewed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_review(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(req): AppJson<CreateReviewRequest>,
) -> Result<Json<ApiResponse<ShopReviewResponse>>> {
    let shop_id = parse_id("Shop", &id)?;
    let review = state.writer.create_review(&auth.user_id, &shop_id, &req.review).await?;
    Ok(Json(ApiResponse::ok("review created", review.into())))
}

#[utoipa::path(
    get,
    path = "/shops/{id}/reviews",
    tag = "shop-community",
    params(("id" = String, Path, description = "Shop ID"), PaginationParams),
    responses((status = 200, description = "Reviews", body = ApiResponse<PagedResponse<ShopReviewResponse>>))
)]
pub async fn list_reviews(
    State(state): State<ShopsState>,
    AppPath(id): AppPath<String>,
    AppQuery(pagination): AppQuery<PaginationParams>,
) -> Result<Json<ApiResponse<PagedResponse<ShopReviewResponse>>>> {
    let shop_id = parse_id("Shop", &id)?;
    let page = pagination.resolve(REVIEW_SORTS, true)?;
    let reviews = state.shop_repo.list_reviews(&shop_id, &page).await?;
    Ok(Json(ApiResponse::ok("shop reviews", reviews.map(ShopReviewResponse::from))))
}

/// Delete the caller's review
#[utoipa::path(
    delete,
    path = "/shops/{id}/reviews",
    tag = "shop-community",
    params(("id" = String, Path, description = "Shop ID")),
    responses(
        (status = 200, description = "Review deleted", body = ApiResponse<Empty>),
        (status = 404, description = "No review to delete")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_my_review(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<Empty>>> {
    let shop_id = parse_id("Shop", &id)?;
    state.writer.delete_my_review(&auth.user_id, &shop_id).await?;
    Ok(Json(ApiResponse::<Empty>::done("review deleted")))
}

/// Delete another user's review (shop owner)
#[utoipa::path(
    delete,
    path = "/shops/{id}/reviews/other",
    tag = "shop-community",
    params(("id" = String, Path, description = "Shop ID"), TargetUserQuery),
    responses(
        (status = 200, description = "Review deleted", body = ApiResponse<Empty>),
        (status = 401, description = "Not the shop owner"),
        (status = 404, description = "No review from that user")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_other_review(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppQuery(query): AppQuery<TargetUserQuery>,
) -> Result<Json<ApiResponse<Empty>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    let target = parse_id("User", &query.user_id)?;
    state.writer.delete_other_review(&id, &target).await?;
    Ok(Json(ApiResponse::<Empty>::done("review deleted")))
}

pub fn shop_community_router(state: ShopsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(follow_shop, unfollow_shop, list_followers))
        .routes(routes!(check_following))
        .routes(routes!(remove_follower))
        .routes(routes!(create_review, list_reviews, delete_my_review))
        .routes(routes!(delete_other_review))
        .with_state(state)
}
