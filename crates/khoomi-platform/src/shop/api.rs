//! Shops API
//!
//! Shop creation, discovery, and owner-managed presentation: images,
//! gallery, announcement, vacation mode, and the embedded policy block.

use std::sync::Arc;

use axum::extract::{multipart::MultipartRejection, Multipart, State};
use axum::Json;
use bson::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::address::entity::UserAddress;
use crate::media::MediaSource;
use crate::shared::api_common::{ApiResponse, AppJson, AppPath, AppQuery, PagedResponse, PaginationParams, SortField};
use crate::shared::authorization_service::{checks, AuthorizationService};
use crate::shared::error::{PlatformError, Result};
use crate::shared::middleware::Authenticated;
use crate::shared::multipart::UploadForm;
use crate::shared::slug::slugify;
use crate::shared::validation::{
    normalize_shop_username, validate_announcement, validate_shop_description, validate_shop_name,
};
use crate::shop::entity::{FollowerExcerpt, ReviewExcerpt, Shop, ShopPolicy, ShopStatus};
use crate::shop::repository::{OwnerExcerpt, ShopDetail, ShopImage, ShopRepository, MAX_GALLERY_IMAGES};
use crate::writer::{AggregateWriter, NewShop};

const SHOP_SORTS: &[SortField] = &[
    ("created_at", "created_at"),
    ("name", "name"),
    ("follower_count", "follower_count"),
    ("reviews_count", "reviews_count"),
];
const MAX_VACATION_MESSAGE_CHARS: usize = 500;

#[derive(Clone)]
pub struct ShopsState {
    pub shop_repo: Arc<ShopRepository>,
    pub writer: Arc<AggregateWriter>,
    pub authz_service: Arc<AuthorizationService>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FollowerExcerptResponse {
    pub user_id: String,
    pub login_name: String,
    pub first_name: String,
    pub last_name: String,
    pub thumbnail: Option<String>,
    pub joined_at: DateTime<Utc>,
}

impl From<FollowerExcerpt> for FollowerExcerptResponse {
    fn from(f: FollowerExcerpt) -> Self {
        Self {
            user_id: f.user_id,
            login_name: f.login_name,
            first_name: f.first_name,
            last_name: f.last_name,
            thumbnail: f.thumbnail,
            joined_at: f.joined_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewExcerptResponse {
    pub user_id: String,
    pub review_author: String,
    pub thumbnail: Option<String>,
    pub review: String,
    pub created_at: DateTime<Utc>,
}

impl From<ReviewExcerpt> for ReviewExcerptResponse {
    fn from(r: ReviewExcerpt) -> Self {
        Self {
            user_id: r.user_id,
            review_author: r.review_author,
            thumbnail: r.thumbnail,
            review: r.review,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShopResponse {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub username: String,
    pub slug: String,
    pub description: String,
    pub logo_url: Option<String>,
    pub banner_url: Option<String>,
    pub gallery: Vec<String>,
    pub announcement: String,
    pub announcement_modified_at: Option<DateTime<Utc>>,
    pub is_vacation: bool,
    pub vacation_message: String,
    pub status: ShopStatus,
    pub is_live: bool,
    pub follower_count: i64,
    pub followers: Vec<FollowerExcerptResponse>,
    pub reviews_count: i64,
    pub recent_reviews: Vec<ReviewExcerptResponse>,
    pub policy: ShopPolicy,
    pub listing_active_count: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<Shop> for ShopResponse {
    fn from(s: Shop) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            name: s.name,
            username: s.username,
            slug: s.slug,
            description: s.description,
            logo_url: s.logo_url,
            banner_url: s.banner_url,
            gallery: s.gallery,
            announcement: s.announcement,
            announcement_modified_at: s.announcement_modified_at.map(|d| d.to_chrono()),
            is_vacation: s.is_vacation,
            vacation_message: s.vacation_message,
            status: s.status,
            is_live: s.is_live,
            follower_count: s.follower_count,
            followers: s.followers.into_iter().map(Into::into).collect(),
            reviews_count: s.reviews_count,
            recent_reviews: s.recent_reviews.into_iter().map(Into::into).collect(),
            policy: s.policy,
            listing_active_count: s.listing_active_count,
            created_at: s.created_at,
            modified_at: s.modified_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShopOwnerResponse {
    pub id: String,
    pub login_name: String,
    pub first_name: String,
    pub last_name: String,
    pub thumbnail: Option<String>,
}

impl From<OwnerExcerpt> for ShopOwnerResponse {
    fn from(o: OwnerExcerpt) -> Self {
        Self {
            id: o.id,
            login_name: o.login_name,
            first_name: o.first_name,
            last_name: o.last_name,
            thumbnail: o.thumbnail,
        }
    }
}

/// Location shown on the shop page, from the owner's default address
#[derive(Debug, Serialize, ToSchema)]
pub struct ShopLocationResponse {
    pub city: String,
    pub state: String,
    pub country: String,
}

impl From<UserAddress> for ShopLocationResponse {
    fn from(a: UserAddress) -> Self {
        Self {
            city: a.city,
            state: a.state,
            country: a.country,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShopDetailResponse {
    #[serde(flatten)]
    pub shop: ShopResponse,
    pub owner: Option<ShopOwnerResponse>,
    /// Absent when the owner has no default address
    pub address: Option<ShopLocationResponse>,
}

impl From<ShopDetail> for ShopDetailResponse {
    fn from(d: ShopDetail) -> Self {
        Self {
            shop: d.shop.into(),
            owner: d.owner.map(Into::into),
            address: d.address.map(Into::into),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShopsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: PaginationParams,
    /// Substring matched against name, username, and description
    pub q: Option<String>,
}

/// Owner edits; absent fields are left alone.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateShopRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub description: Option<String>,
    /// Remote image to import as the new logo
    pub logo_url: Option<String>,
    /// Remote image to import as the new banner
    pub banner_url: Option<String>,
}

impl UpdateShopRequest {
    fn to_set_document(&self) -> Result<Document> {
        let mut set = Document::new();
        if let Some(name) = self.name.as_deref().map(str::trim) {
            validate_shop_name(name)?;
            set.insert("name", name);
        }
        if let Some(username) = self.username.as_deref() {
            let username = normalize_shop_username(username)?;
            set.insert("slug", slugify(&username));
            set.insert("username", username);
        }
        if let Some(description) = self.description.as_deref().map(str::trim) {
            validate_shop_description(description)?;
            set.insert("description", description);
        }
        Ok(set)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnnouncementRequest {
    pub announcement: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VacationRequest {
    pub is_vacation: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GalleryImageRequest {
    pub url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ShopStatusRequest {
    pub status: ShopStatus,
}

/// Open a shop (multipart: `name`, `username`, `description`, optional `logo` and `banner`)
#[utoipa::path(
    post,
    path = "/shops",
    tag = "shops",
    request_body(content_type = "multipart/form-data", description = "Shop fields and optional images"),
    responses(
        (status = 200, description = "Shop created", body = ApiResponse<ShopResponse>),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Username taken or account already owns a shop")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_shop(
    State(state): State<ShopsState>,
    auth: Authenticated,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<ShopResponse>>> {
    let mut form = UploadForm::read(multipart?).await?;
    let input = NewShop {
        name: form.required_text("name")?.to_string(),
        username: form.required_text("username")?.to_string(),
        description: form.text("description").unwrap_or_default().to_string(),
        logo: form.take_image("logo")?,
        banner: form.take_image("banner")?,
    };
    let shop = state.writer.create_shop(&auth.user_id, input).await?;
    Ok(Json(ApiResponse::ok("shop created", shop.into())))
}

/// Browse active shops
#[utoipa::path(
    get,
    path = "/shops",
    tag = "shops",
    params(ShopsQuery),
    responses((status = 200, description = "Shops", body = ApiResponse<PagedResponse<ShopResponse>>))
)]
pub async fn list_shops(
    State(state): State<ShopsState>,
    AppQuery(query): AppQuery<ShopsQuery>,
) -> Result<Json<ApiResponse<PagedResponse<ShopResponse>>>> {
    let page = query.pagination.resolve(SHOP_SORTS, true)?;
    let shops = state.shop_repo.list(query.q.as_deref(), &page).await?;
    Ok(Json(ApiResponse::ok("shops", shops.map(ShopResponse::from))))
}

/// Shop by id or slug, with its owner and location
#[utoipa::path(
    get,
    path = "/shops/{id}",
    tag = "shops",
    params(("id" = String, Path, description = "Shop ID or slug")),
    responses(
        (status = 200, description = "Shop found", body = ApiResponse<ShopDetailResponse>),
        (status = 404, description = "Shop not found")
    )
)]
pub async fn get_shop(
    State(state): State<ShopsState>,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<ShopDetailResponse>>> {
    let detail = state
        .shop_repo
        .find_detail(&id)
        .await?
        .ok_or_else(|| PlatformError::not_found("Shop", &id))?;
    Ok(Json(ApiResponse::ok("shop found", detail.into())))
}

/// Update name, username, description, or import a logo/banner by URL
#[utoipa::path(
    patch,
    path = "/shops/{id}",
    tag = "shops",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = UpdateShopRequest,
    responses(
        (status = 200, description = "Shop updated", body = ApiResponse<ShopResponse>),
        (status = 401, description = "Not the shop owner"),
        (status = 409, description = "Username taken")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_shop(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(req): AppJson<UpdateShopRequest>,
) -> Result<Json<ApiResponse<ShopResponse>>> {
    let mut shop = checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    let set = req.to_set_document()?;
    let logo = req.logo_url.as_deref().map(MediaSource::remote).transpose()?;
    let banner = req.banner_url.as_deref().map(MediaSource::remote).transpose()?;
    if set.is_empty() && logo.is_none() && banner.is_none() {
        return Err(PlatformError::validation("no shop fields to update"));
    }

    if !set.is_empty() {
        shop = state.shop_repo.update_fields(&id, set).await?;
    }
    if let Some(source) = logo {
        shop = state.writer.replace_shop_image(&id, ShopImage::Logo, source).await?;
    }
    if let Some(source) = banner {
        shop = state.writer.replace_shop_image(&id, ShopImage::Banner, source).await?;
    }
    Ok(Json(ApiResponse::ok("shop updated", shop.into())))
}

async fn replace_image(
    state: &ShopsState,
    auth: &Authenticated,
    shop_id: &str,
    image: ShopImage,
    multipart: Multipart,
) -> Result<Shop> {
    checks::require_shop_owner(&state.authz_service, auth, shop_id).await?;
    let mut form = UploadForm::read(multipart).await?;
    let source = form
        .take_image("image")?
        .ok_or_else(|| PlatformError::validation("image is required"))?;
    state.writer.replace_shop_image(shop_id, image, source).await
}

/// Replace the shop logo (multipart `image`)
#[utoipa::path(
    put,
    path = "/shops/{id}/logo",
    tag = "shops",
    params(("id" = String, Path, description = "Shop ID")),
    request_body(content_type = "multipart/form-data", description = "`image` file or URL"),
    responses((status = 200, description = "Logo replaced", body = ApiResponse<ShopResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn replace_logo(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<ShopResponse>>> {
    let shop = replace_image(&state, &auth, &id, ShopImage::Logo, multipart?).await?;
    Ok(Json(ApiResponse::ok("shop logo updated", shop.into())))
}

/// Replace the shop banner (multipart `image`)
#[utoipa::path(
    put,
    path = "/shops/{id}/banner",
    tag = "shops",
    params(("id" = String, Path, description = "Shop ID")),
    request_body(content_type = "multipart/form-data", description = "`image` file or URL"),
    responses((status = 200, description = "Banner replaced", body = ApiResponse<ShopResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn replace_banner(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<ShopResponse>>> {
    let shop = replace_image(&state, &auth, &id, ShopImage::Banner, multipart?).await?;
    Ok(Json(ApiResponse::ok("shop banner updated", shop.into())))
}

/// Add a gallery image (multipart `image`)
#[utoipa::path(
    post,
    path = "/shops/{id}/gallery",
    tag = "shops",
    params(("id" = String, Path, description = "Shop ID")),
    request_body(content_type = "multipart/form-data", description = "`image` file or URL"),
    responses(
        (status = 200, description = "Image added", body = ApiResponse<ShopResponse>),
        (status = 422, description = "Gallery is full")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_gallery_image(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<ShopResponse>>> {
    let shop = checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    if shop.gallery.len() >= MAX_GALLERY_IMAGES {
        return Err(PlatformError::limit_reached("gallery image", MAX_GALLERY_IMAGES as u64));
    }
    let mut form = UploadForm::read(multipart?).await?;
    let source = form
        .take_image("image")?
        .ok_or_else(|| PlatformError::validation("image is required"))?;
    let shop = state.writer.add_gallery_image(&id, source).await?;
    Ok(Json(ApiResponse::ok("gallery image added", shop.into())))
}

/// Remove a gallery image by URL
#[utoipa::path(
    delete,
    path = "/shops/{id}/gallery",
    tag = "shops",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = GalleryImageRequest,
    responses(
        (status = 200, description = "Image removed", body = ApiResponse<ShopResponse>),
        (status = 404, description = "Image not in gallery")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_gallery_image(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(req): AppJson<GalleryImageRequest>,
) -> Result<Json<ApiResponse<ShopResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    let shop = state.shop_repo.remove_gallery_image(&id, req.url.trim()).await?;
    Ok(Json(ApiResponse::ok("gallery image removed", shop.into())))
}

#[utoipa::path(
    put,
    path = "/shops/{id}/announcement",
    tag = "shops",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = AnnouncementRequest,
    responses((status = 200, description = "Announcement set", body = ApiResponse<ShopResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn update_announcement(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(req): AppJson<AnnouncementRequest>,
) -> Result<Json<ApiResponse<ShopResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    validate_announcement(req.announcement.trim())?;
    let shop = state.shop_repo.set_announcement(&id, &req.announcement).await?;
    Ok(Json(ApiResponse::ok("announcement updated", shop.into())))
}

#[utoipa::path(
    put,
    path = "/shops/{id}/vacation",
    tag = "shops",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = VacationRequest,
    responses((status = 200, description = "Vacation mode set", body = ApiResponse<ShopResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn update_vacation(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(req): AppJson<VacationRequest>,
) -> Result<Json<ApiResponse<ShopResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    if req.message.trim().chars().count() > MAX_VACATION_MESSAGE_CHARS {
        return Err(PlatformError::validation(format!(
            "vacation message must be at most {} characters",
            MAX_VACATION_MESSAGE_CHARS
        )));
    }
    let shop = state.shop_repo.set_vacation(&id, req.is_vacation, &req.message).await?;
    Ok(Json(ApiResponse::ok("vacation mode updated", shop.into())))
}

/// Replace the payment/shipping/refund policy block
#[utoipa::path(
    put,
    path = "/shops/{id}/policy",
    tag = "shops",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = ShopPolicy,
    responses((status = 200, description = "Policy updated", body = ApiResponse<ShopResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn update_policy(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(policy): AppJson<ShopPolicy>,
) -> Result<Json<ApiResponse<ShopResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    let shop = state.shop_repo.set_policy(&id, &policy).await?;
    Ok(Json(ApiResponse::ok("shop policy updated", shop.into())))
}

/// Activate or suspend a shop (admin)
#[utoipa::path(
    patch,
    path = "/shops/{id}/status",
    tag = "shops",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = ShopStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<ShopResponse>),
        (status = 403, description = "Not an admin"),
        (status = 422, description = "Transition not allowed")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_shop_status(
    State(state): State<ShopsState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(req): AppJson<ShopStatusRequest>,
) -> Result<Json<ApiResponse<ShopResponse>>> {
    checks::require_admin(&state.authz_service, &auth).await?;
    let shop = state.shop_repo.transition_status(&id, req.status).await?;
    info!(shop_id = %id, status = req.status.as_str(), admin_id = %auth.user_id, "Shop status changed");
    Ok(Json(ApiResponse::ok("shop status updated", shop.into())))
}

pub fn shops_router(state: ShopsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_shop, list_shops))
        .routes(routes!(get_shop, update_shop))
        .routes(routes!(replace_logo))
        .routes(routes!(replace_banner))
        .routes(routes!(add_gallery_image, remove_gallery_image))
        .routes(routes!(update_announcement))
        .routes(routes!(update_vacation))
        .routes(routes!(update_policy))
        .routes(routes!(update_shop_status))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_change_also_moves_slug() {
        let req = UpdateShopRequest {
            username: Some("Clay_Works".into()),
            ..Default::default()
        };
        let set = req.to_set_document().unwrap();
        assert_eq!(set.get_str("username").unwrap(), "clay_works");
        assert_eq!(set.get_str("slug").unwrap(), slugify("clay_works"));
    }

    #[test]
    fn test_invalid_fields_are_rejected() {
        let req = UpdateShopRequest {
            username: Some("9lives".into()),
            ..Default::default()
        };
        assert!(req.to_set_document().is_err());

        let req = UpdateShopRequest {
            description: Some("x".repeat(501)),
            ..Default::default()
        };
        assert!(req.to_set_document().is_err());
    }

    #[test]
    fn test_shop_response_flattens_detail() {
        let shop = Shop::new("u1", "Clay Works", "clay_works", "Pots");
        let detail = ShopDetail { shop, owner: None, address: None };
        let json = serde_json::to_value(ShopDetailResponse::from(detail)).unwrap();
        assert_eq!(json["username"], "clay_works");
        assert!(json["owner"].is_null());
        assert!(json["address"].is_null());
        assert!(json["created_at"].is_string());
    }
}
