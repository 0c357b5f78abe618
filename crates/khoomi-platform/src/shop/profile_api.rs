//! Shop profile API: about page, return policies, compliance terms, and
//! seller verification.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::shared::api_common::{ApiResponse, AppJson, AppPath, Empty};
use crate::shared::authorization_service::{checks, AuthorizationService};
use crate::shared::error::{PlatformError, Result};
use crate::shared::ids::parse_id;
use crate::shared::middleware::{Authenticated, OptionalAuth};
use crate::shared::validation::max_chars;
use crate::shop::about::{AboutChanges, AboutStatus, ShopAbout, ShopAboutRepository};
use crate::shop::compliance::{CompliancePolicy, ComplianceRepository, ComplianceTerms};
use crate::shop::return_policy::{ReturnPolicyRepository, ReturnPolicyTerms, ShopReturnPolicy};
use crate::shop::verification::{IdCardKind, SellerVerification, VerificationRepository, VerificationSubmission};
use crate::shop::ShopRepository;

const MAX_HEADLINE_CHARS: usize = 100;
const MAX_STORY_CHARS: usize = 5000;
const MAX_RETURN_POLICIES: usize = 5;

#[derive(Clone)]
pub struct ShopProfileState {
    pub shop_repo: Arc<ShopRepository>,
    pub about_repo: Arc<ShopAboutRepository>,
    pub return_policy_repo: Arc<ReturnPolicyRepository>,
    pub compliance_repo: Arc<ComplianceRepository>,
    pub verification_repo: Arc<VerificationRepository>,
    pub authz_service: Arc<AuthorizationService>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShopAboutResponse {
    pub id: String,
    pub shop_id: String,
    pub status: AboutStatus,
    pub headline: String,
    pub story: String,
    pub instagram: String,
    pub facebook: String,
    pub x: String,
    pub modified_at: DateTime<Utc>,
}

impl From<ShopAbout> for ShopAboutResponse {
    fn from(a: ShopAbout) -> Self {
        Self {
            id: a.id,
            shop_id: a.shop_id,
            status: a.status,
            headline: a.headline,
            story: a.story,
            instagram: a.instagram,
            facebook: a.facebook,
            x: a.x,
            modified_at: a.modified_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AboutStatusRequest {
    pub status: AboutStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnPolicyResponse {
    pub id: String,
    pub shop_id: String,
    pub accepts_returns: bool,
    pub accepts_exchanges: bool,
    /// Days after delivery
    pub deadline: i32,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<ShopReturnPolicy> for ReturnPolicyResponse {
    fn from(p: ShopReturnPolicy) -> Self {
        Self {
            id: p.id,
            shop_id: p.shop_id,
            accepts_returns: p.accepts_returns,
            accepts_exchanges: p.accepts_exchanges,
            deadline: p.deadline,
            created_at: p.created_at,
            modified_at: p.modified_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompliancePolicyResponse {
    pub id: String,
    pub shop_id: String,
    pub terms_of_use: String,
    pub intellectual_property: String,
    pub seller_policy: String,
    pub modified_at: DateTime<Utc>,
}

impl From<CompliancePolicy> for CompliancePolicyResponse {
    fn from(p: CompliancePolicy) -> Self {
        Self {
            id: p.id,
            shop_id: p.shop_id,
            terms_of_use: p.terms_of_use,
            intellectual_property: p.intellectual_property,
            seller_policy: p.seller_policy,
            modified_at: p.modified_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerificationResponse {
    pub id: String,
    pub shop_id: String,
    pub first_name: String,
    pub last_name: String,
    pub id_card_kind: IdCardKind,
    /// Only the last four characters
    pub id_card_number: String,
    pub dob: String,
    pub nationality: String,
    pub country_of_residence: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<SellerVerification> for VerificationResponse {
    fn from(v: SellerVerification) -> Self {
        Self {
            id: v.id,
            shop_id: v.shop_id,
            first_name: v.first_name,
            last_name: v.last_name,
            id_card_kind: v.id_card_kind,
            id_card_number: mask_card_number(&v.id_card_number),
            dob: v.dob,
            nationality: v.nationality,
            country_of_residence: v.country_of_residence,
            is_verified: v.is_verified,
            created_at: v.created_at,
            modified_at: v.modified_at,
        }
    }
}

fn mask_card_number(number: &str) -> String {
    let chars: Vec<char> = number.chars().collect();
    let visible = chars.len().min(4);
    let hidden = chars.len() - visible;
    std::iter::repeat('*')
        .take(hidden)
        .chain(chars[hidden..].iter().copied())
        .collect()
}

fn validate_about_changes(changes: &AboutChanges) -> Result<()> {
    if let Some(headline) = &changes.headline {
        max_chars("headline", headline.trim(), MAX_HEADLINE_CHARS)?;
    }
    if let Some(story) = &changes.story {
        max_chars("story", story.trim(), MAX_STORY_CHARS)?;
    }
    Ok(())
}

/// About page; drafts are visible to the owner only
#[utoipa::path(
    get,
    path = "/shops/{id}/about",
    tag = "shop-profile",
    params(("id" = String, Path, description = "Shop ID")),
    responses(
        (status = 200, description = "About page", body = ApiResponse<ShopAboutResponse>),
        (status = 404, description = "No published about page")
    )
)]
pub async fn get_about(
    State(state): State<ShopProfileState>,
    auth: OptionalAuth,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<ShopAboutResponse>>> {
    let shop_id = parse_id("Shop", &id)?;
    let about = state
        .about_repo
        .find_by_shop(&shop_id)
        .await?
        .ok_or_else(|| PlatformError::not_found("ShopAbout", &shop_id))?;
    if about.status == AboutStatus::Draft {
        let shop = state.shop_repo.get(&shop_id).await?;
        let is_owner = auth.as_ref().is_some_and(|ctx| shop.is_owned_by(&ctx.user_id));
        if !is_owner {
            return Err(PlatformError::not_found("ShopAbout", &shop_id));
        }
    }
    Ok(Json(ApiResponse::ok("shop about", about.into())))
}

/// Replace the about page; headline and story are required
#[utoipa::path(
    put,
    path = "/shops/{id}/about",
    tag = "shop-profile",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = AboutChanges,
    responses(
        (status = 200, description = "About page replaced", body = ApiResponse<ShopAboutResponse>),
        (status = 401, description = "Caller does not own the shop")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_about(
    State(state): State<ShopProfileState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(changes): AppJson<AboutChanges>,
) -> Result<Json<ApiResponse<ShopAboutResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    validate_about_changes(&changes)?;
    let about = state.about_repo.update(&id, changes.to_replacement_document()?).await?;
    Ok(Json(ApiResponse::ok("shop about updated", about.into())))
}

/// Change some fields of the about page
#[utoipa::path(
    patch,
    path = "/shops/{id}/about",
    tag = "shop-profile",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = AboutChanges,
    responses(
        (status = 200, description = "About page updated", body = ApiResponse<ShopAboutResponse>),
        (status = 401, description = "Caller does not own the shop")
    ),
    security(("bearer_auth" = []))
)]
pub async fn patch_about(
    State(state): State<ShopProfileState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(changes): AppJson<AboutChanges>,
) -> Result<Json<ApiResponse<ShopAboutResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    validate_about_changes(&changes)?;
    let about = state.about_repo.update(&id, changes.to_set_document()).await?;
    Ok(Json(ApiResponse::ok("shop about updated", about.into())))
}

/// Write an about page for a shop that has none
#[utoipa::path(
    post,
    path = "/shops/{id}/about",
    tag = "shop-profile",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = AboutChanges,
    responses(
        (status = 200, description = "About page created", body = ApiResponse<ShopAboutResponse>),
        (status = 409, description = "Shop already has an about page")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_about(
    State(state): State<ShopProfileState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(changes): AppJson<AboutChanges>,
) -> Result<Json<ApiResponse<ShopAboutResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    validate_about_changes(&changes)?;
    let headline = changes.headline.as_deref().map(str::trim).unwrap_or_default();
    let story = changes.story.as_deref().map(str::trim).unwrap_or_default();
    if headline.is_empty() || story.is_empty() {
        return Err(PlatformError::validation("headline and story are required"));
    }
    let mut about = ShopAbout::new(&id, headline, story);
    about.instagram = changes.instagram.as_deref().map(str::trim).unwrap_or_default().to_string();
    about.facebook = changes.facebook.as_deref().map(str::trim).unwrap_or_default().to_string();
    about.x = changes.x.as_deref().map(str::trim).unwrap_or_default().to_string();
    state.about_repo.insert(&about).await?;
    Ok(Json(ApiResponse::ok("shop about created", about.into())))
}

/// Publish or unpublish the about page
#[utoipa::path(
    patch,
    path = "/shops/{id}/about/status",
    tag = "shop-profile",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = AboutStatusRequest,
    responses((status = 200, description = "Status changed", body = ApiResponse<ShopAboutResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn update_about_status(
    State(state): State<ShopProfileState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(req): AppJson<AboutStatusRequest>,
) -> Result<Json<ApiResponse<ShopAboutResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    let about = state.about_repo.set_status(&id, req.status).await?;
    Ok(Json(ApiResponse::ok("shop about status updated", about.into())))
}

#[utoipa::path(
    post,
    path = "/shops/{id}/policies",
    tag = "shop-profile",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = ReturnPolicyTerms,
    responses(
        (status = 200, description = "Policy created", body = ApiResponse<ReturnPolicyResponse>),
        (status = 422, description = "Too many return policies")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_return_policy(
    State(state): State<ShopProfileState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(terms): AppJson<ReturnPolicyTerms>,
) -> Result<Json<ApiResponse<ReturnPolicyResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    terms.validate()?;
    if state.return_policy_repo.list_by_shop(&id).await?.len() >= MAX_RETURN_POLICIES {
        return Err(PlatformError::limit_reached("return policy", MAX_RETURN_POLICIES as u64));
    }
    let policy = ShopReturnPolicy::new(&id, terms);
    state.return_policy_repo.insert(&policy).await?;
    Ok(Json(ApiResponse::ok("return policy created", policy.into())))
}

#[utoipa::path(
    get,
    path = "/shops/{id}/policies",
    tag = "shop-profile",
    params(("id" = String, Path, description = "Shop ID")),
    responses((status = 200, description = "Return policies", body = ApiResponse<Vec<ReturnPolicyResponse>>))
)]
pub async fn list_return_policies(
    State(state): State<ShopProfileState>,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<Vec<ReturnPolicyResponse>>>> {
    let shop_id = parse_id("Shop", &id)?;
    let policies = state.return_policy_repo.list_by_shop(&shop_id).await?;
    Ok(Json(ApiResponse::ok(
        "return policies",
        policies.into_iter().map(Into::into).collect(),
    )))
}

#[utoipa::path(
    put,
    path = "/shops/{id}/policies/{policy_id}",
    tag = "shop-profile",
    params(
        ("id" = String, Path, description = "Shop ID"),
        ("policy_id" = String, Path, description = "Return policy ID")
    ),
    request_body = ReturnPolicyTerms,
    responses((status = 200, description = "Policy updated", body = ApiResponse<ReturnPolicyResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn update_return_policy(
    State(state): State<ShopProfileState>,
    auth: Authenticated,
    AppPath((id, policy_id)): AppPath<(String, String)>,
    AppJson(terms): AppJson<ReturnPolicyTerms>,
) -> Result<Json<ApiResponse<ReturnPolicyResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    let policy_id = parse_id("ShopReturnPolicy", &policy_id)?;
    terms.validate()?;
    let policy = state.return_policy_repo.update(&id, &policy_id, &terms).await?;
    Ok(Json(ApiResponse::ok("return policy updated", policy.into())))
}

#[utoipa::path(
    delete,
    path = "/shops/{id}/policies/{policy_id}",
    tag = "shop-profile",
    params(
        ("id" = String, Path, description = "Shop ID"),
        ("policy_id" = String, Path, description = "Return policy ID")
    ),
    responses((status = 200, description = "Policy deleted", body = ApiResponse<Empty>)),
    security(("bearer_auth" = []))
)]
pub async fn delete_return_policy(
    State(state): State<ShopProfileState>,
    auth: Authenticated,
    AppPath((id, policy_id)): AppPath<(String, String)>,
) -> Result<Json<ApiResponse<Empty>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    let policy_id = parse_id("ShopReturnPolicy", &policy_id)?;
    state.return_policy_repo.delete(&id, &policy_id).await?;
    Ok(Json(ApiResponse::<Empty>::done("return policy deleted")))
}

#[utoipa::path(
    post,
    path = "/shops/{id}/compliance",
    tag = "shop-profile",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = ComplianceTerms,
    responses(
        (status = 200, description = "Compliance terms created", body = ApiResponse<CompliancePolicyResponse>),
        (status = 409, description = "Shop already has compliance terms")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_compliance(
    State(state): State<ShopProfileState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(terms): AppJson<ComplianceTerms>,
) -> Result<Json<ApiResponse<CompliancePolicyResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    terms.validate()?;
    let policy = CompliancePolicy::new(&id, terms);
    state.compliance_repo.insert(&policy).await?;
    Ok(Json(ApiResponse::ok("compliance terms created", policy.into())))
}

#[utoipa::path(
    get,
    path = "/shops/{id}/compliance",
    tag = "shop-profile",
    params(("id" = String, Path, description = "Shop ID")),
    responses(
        (status = 200, description = "Compliance terms", body = ApiResponse<CompliancePolicyResponse>),
        (status = 404, description = "No compliance terms")
    )
)]
pub async fn get_compliance(
    State(state): State<ShopProfileState>,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<CompliancePolicyResponse>>> {
    let shop_id = parse_id("Shop", &id)?;
    let policy = state
        .compliance_repo
        .find_by_shop(&shop_id)
        .await?
        .ok_or_else(|| PlatformError::not_found("CompliancePolicy", &shop_id))?;
    Ok(Json(ApiResponse::ok("compliance terms", policy.into())))
}

#[utoipa::path(
    put,
    path = "/shops/{id}/compliance",
    tag = "shop-profile",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = ComplianceTerms,
    responses((status = 200, description = "Compliance terms updated", body = ApiResponse<CompliancePolicyResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn update_compliance(
    State(state): State<ShopProfileState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(terms): AppJson<ComplianceTerms>,
) -> Result<Json<ApiResponse<CompliancePolicyResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    terms.validate()?;
    let policy = state.compliance_repo.update(&id, &terms).await?;
    Ok(Json(ApiResponse::ok("compliance terms updated", policy.into())))
}

/// Submit identity details for the shop owner
#[utoipa::path(
    post,
    path = "/shops/{id}/verification",
    tag = "shop-profile",
    params(("id" = String, Path, description = "Shop ID")),
    request_body = VerificationSubmission,
    responses(
        (status = 200, description = "Verification submitted", body = ApiResponse<VerificationResponse>),
        (status = 400, description = "Invalid details or under age"),
        (status = 409, description = "Already submitted")
    ),
    security(("bearer_auth" = []))
)]
pub async fn submit_verification(
    State(state): State<ShopProfileState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(submission): AppJson<VerificationSubmission>,
) -> Result<Json<ApiResponse<VerificationResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    let today: NaiveDate = Utc::now().date_naive();
    submission.validate(today)?;
    let verification = SellerVerification::new(&id, submission);
    state.verification_repo.insert(&verification).await?;
    info!(shop_id = %id, user_id = %auth.user_id, "Seller verification submitted");
    Ok(Json(ApiResponse::ok("verification submitted", verification.into())))
}

#[utoipa::path(
    get,
    path = "/shops/{id}/verification",
    tag = "shop-profile",
    params(("id" = String, Path, description = "Shop ID")),
    responses(
        (status = 200, description = "Verification record", body = ApiResponse<VerificationResponse>),
        (status = 404, description = "Nothing submitted")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_verification(
    State(state): State<ShopProfileState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<VerificationResponse>>> {
    checks::require_shop_owner(&state.authz_service, &auth, &id).await?;
    let verification = state
        .verification_repo
        .find_by_shop(&id)
        .await?
        .ok_or_else(|| PlatformError::not_found("SellerVerification", &id))?;
    Ok(Json(ApiResponse::ok("verification", verification.into())))
}

pub fn shop_profile_router(state: ShopProfileState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_about, get_about, update_about, patch_about))
        .routes(routes!(update_about_status))
        .routes(routes!(create_return_policy, list_return_policies))
        .routes(routes!(update_return_policy, delete_return_policy))
        .routes(routes!(create_compliance, get_compliance, update_compliance))
        .routes(routes!(submit_verification, get_verification))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_number_masked() {
        assert_eq!(mask_card_number("A12345678"), "*****5678");
        assert_eq!(mask_card_number("123"), "123");
        assert_eq!(mask_card_number(""), "");
    }

    #[test]
    fn test_about_length_limits() {
        let ok = AboutChanges {
            headline: Some("Handmade in Lagos".into()),
            ..Default::default()
        };
        assert!(validate_about_changes(&ok).is_ok());

        let long = AboutChanges {
            story: Some("s".repeat(MAX_STORY_CHARS + 1)),
            ..Default::default()
        };
        assert!(validate_about_changes(&long).is_err());
    }
}
