//! Categories API

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::category::entity::Category;
use crate::category::repository::CategoryRepository;
use crate::category::tree::{build_category_tree, CategoryNode};
use crate::shared::api_common::{ApiResponse, AppJson, AppPath, AppQuery};
use crate::shared::authorization_service::{checks, AuthorizationService};
use crate::shared::error::Result;
use crate::shared::middleware::Authenticated;

#[derive(Clone)]
pub struct CategoriesState {
    pub category_repo: Arc<CategoryRepository>,
    pub authz_service: Arc<AuthorizationService>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategorySearchQuery {
    /// Substring matched against name, path, and parent
    pub s: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Parent slug; omit for a root category
    pub parent_id: Option<String>,
}

/// Full category forest, or the forest of search hits with `?s=`
#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    params(CategorySearchQuery),
    responses((status = 200, description = "Category forest", body = ApiResponse<Vec<CategoryNode>>))
)]
pub async fn list_categories(
    State(state): State<CategoriesState>,
    AppQuery(query): AppQuery<CategorySearchQuery>,
) -> Result<Json<ApiResponse<Vec<CategoryNode>>>> {
    let categories = match query.s.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(term) => state.category_repo.search(term).await?,
        None => state.category_repo.all().await?,
    };
    Ok(Json(ApiResponse::ok("categories", build_category_tree(categories))))
}

/// Add a category (admin)
#[utoipa::path(
    post,
    path = "/categories",
    tag = "categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 200, description = "Category created", body = ApiResponse<Category>),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Parent not found"),
        (status = 409, description = "Slug already exists")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_category(
    State(state): State<CategoriesState>,
    auth: Authenticated,
    AppJson(req): AppJson<CreateCategoryRequest>,
) -> Result<Json<ApiResponse<Category>>> {
    checks::require_admin(&state.authz_service, &auth).await?;
    let parent = match req.parent_id.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(parent_id) => Some(state.category_repo.get(parent_id).await?),
        None => None,
    };
    let category = Category::new(&req.name, &req.description, parent.as_ref())?;
    state.category_repo.insert(&category).await?;
    info!(category_id = %category.id, path = %category.path, "Category created");
    Ok(Json(ApiResponse::ok("category created", category)))
}

/// Direct children of a category
#[utoipa::path(
    get,
    path = "/categories/{id}/children",
    tag = "categories",
    params(("id" = String, Path, description = "Category slug")),
    responses((status = 200, description = "Children", body = ApiResponse<Vec<CategoryNode>>))
)]
pub async fn get_children(
    State(state): State<CategoriesState>,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<Vec<CategoryNode>>>> {
    let children = state.category_repo.children(&id).await?;
    Ok(Json(ApiResponse::ok("category children", build_category_tree(children))))
}

/// The category and its ancestors, as a single chain from the root
#[utoipa::path(
    get,
    path = "/categories/{id}/ancestors",
    tag = "categories",
    params(("id" = String, Path, description = "Category slug")),
    responses(
        (status = 200, description = "Ancestor forest", body = ApiResponse<Vec<CategoryNode>>),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_ancestors(
    State(state): State<CategoriesState>,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<Vec<CategoryNode>>>> {
    let lineage = state.category_repo.lineage(&id).await?;
    Ok(Json(ApiResponse::ok("category ancestors", build_category_tree(lineage))))
}

pub fn categories_router(state: CategoriesState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(list_categories, create_category))
        .routes(routes!(get_children))
        .routes(routes!(get_ancestors))
        .with_state(state)
}
