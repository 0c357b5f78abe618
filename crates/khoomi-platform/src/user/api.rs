//! Users API
//!
//! Registration, sessions, secure-code flows, and account self-service.

use std::sync::Arc;

use axum::extract::{multipart::MultipartRejection, Multipart, State};
use axum::Json;
use bson::doc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::auth::auth_service::{AuthService, Principal};
use crate::media::MediaSource;
use crate::shared::api_common::{ApiResponse, AppJson, AppPath, AppQuery, Empty, PagedResponse, PaginationParams, SortField};
use crate::shared::authorization_service::{checks, AuthorizationService};
use crate::shared::error::{PlatformError, Result};
use crate::shared::middleware::{Authenticated, ClientInfo};
use crate::shared::multipart::UploadForm;
use crate::shared::validation::{normalize_email, validate_personal_name};
use crate::user::entity::{Birthdate, LoginHistory, User, UserRole, UserStatus};
use crate::user::repository::UserRepository;
use crate::writer::{AggregateWriter, LoginAttempt, Registration};

const LOGIN_HISTORY_SORTS: &[SortField] = &[("date", "date")];
const MAX_BIO_CHARS: usize = 500;

/// Users service state
#[derive(Clone)]
pub struct UsersState {
    pub user_repo: Arc<UserRepository>,
    pub writer: Arc<AggregateWriter>,
    pub auth_service: Arc<AuthService>,
    pub authz_service: Arc<AuthorizationService>,
}

/// Account as seen by its owner
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub login_name: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub thumbnail: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub birthdate: Option<Birthdate>,
    pub email_verified: bool,
    pub is_seller: bool,
    pub role: UserRole,
    pub status: UserStatus,
    pub shop_id: Option<String>,
    pub favorite_shops: Vec<String>,
    pub transaction_buy_count: i64,
    pub transaction_sold_count: i64,
    pub login_counts: i64,
    pub last_login: Option<DateTime<Utc>>,
    pub allow_login_ip_notification: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            login_name: u.login_name,
            email: u.primary_email,
            first_name: u.first_name,
            last_name: u.last_name,
            thumbnail: u.thumbnail,
            phone: u.phone,
            bio: u.bio,
            birthdate: u.birthdate,
            email_verified: u.auth.email_verified,
            is_seller: u.is_seller,
            role: u.role,
            status: u.status,
            shop_id: u.shop_id,
            favorite_shops: u.favorite_shops,
            transaction_buy_count: u.transaction_buy_count,
            transaction_sold_count: u.transaction_sold_count,
            login_counts: u.login_counts,
            last_login: u.last_login.map(|d| d.to_chrono()),
            allow_login_ip_notification: u.allow_login_ip_notification,
            created_at: u.created_at,
            modified_at: u.modified_at,
        }
    }
}

/// Account as seen by anyone
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicProfileResponse {
    pub id: String,
    pub login_name: String,
    pub first_name: String,
    pub last_name: String,
    pub thumbnail: Option<String>,
    pub bio: Option<String>,
    pub is_seller: bool,
    pub shop_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicProfileResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            login_name: u.login_name,
            first_name: u.first_name,
            last_name: u.last_name,
            thumbnail: u.thumbnail,
            bio: u.bio,
            is_seller: u.is_seller,
            shop_id: u.shop_id,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginHistoryResponse {
    pub id: String,
    pub date: DateTime<Utc>,
    pub user_agent: String,
    pub ip_addr: String,
}

impl From<LoginHistory> for LoginHistoryResponse {
    fn from(h: LoginHistory) -> Self {
        Self {
            id: h.id,
            date: h.date,
            user_agent: h.user_agent,
            ip_addr: h.ip_addr,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyEmailQuery {
    /// User ID
    pub id: String,
    /// Code from the verification mail
    pub token: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PasswordResetRequestQuery {
    pub email: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PasswordResetQuery {
    pub id: String,
    pub token: String,
    pub newpassword: String,
}

/// Profile changes; absent fields are left alone.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    /// Remote image to import as the new thumbnail
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateDetailsRequest {
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub birthdate: Option<Birthdate>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserStatusRequest {
    pub status: UserStatus,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DeleteLoginHistoryRequest {
    /// Rows to delete; empty deletes the whole history
    #[serde(default)]
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedCountResponse {
    pub deleted: u64,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct LoginNotificationSetting {
    pub allow_login_ip_notification: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletionRequestResponse {
    pub requested_at: DateTime<Utc>,
}

fn issue_tokens(auth: &AuthService, user: User) -> Result<TokenResponse> {
    let principal = Principal {
        user_id: &user.id,
        email: &user.primary_email,
        login_name: &user.login_name,
        is_seller: user.is_seller,
    };
    let (access_token, expires_at) = auth.mint_access(&principal)?;
    let refresh_token = auth.mint_refresh(&principal)?;
    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_at,
        user: user.into(),
    })
}

impl UpdateProfileRequest {
    fn to_set_document(&self) -> Result<bson::Document> {
        let mut set = bson::Document::new();
        if let Some(first_name) = self.first_name.as_deref().map(str::trim) {
            validate_personal_name("first_name", first_name)?;
            set.insert("first_name", first_name);
        }
        if let Some(last_name) = self.last_name.as_deref().map(str::trim) {
            validate_personal_name("last_name", last_name)?;
            set.insert("last_name", last_name);
        }
        if let Some(email) = self.email.as_deref() {
            set.insert("primary_email", normalize_email(email)?);
            set.insert("auth.email_verified", false);
        }
        Ok(set)
    }
}

impl UpdateDetailsRequest {
    fn to_set_document(&self) -> Result<bson::Document> {
        let mut set = bson::Document::new();
        if let Some(phone) = self.phone.as_deref().map(str::trim) {
            let digits = phone.strip_prefix('+').unwrap_or(phone);
            if digits.len() < 7 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(PlatformError::validation("phone must be 7 to 15 digits, optionally prefixed with +"));
            }
            set.insert("phone", phone);
        }
        if let Some(bio) = self.bio.as_deref().map(str::trim) {
            if bio.chars().count() > MAX_BIO_CHARS {
                return Err(PlatformError::validation(format!("bio must be at most {} characters", MAX_BIO_CHARS)));
            }
            set.insert("bio", bio);
        }
        if let Some(birthdate) = &self.birthdate {
            if !birthdate.is_valid() {
                return Err(PlatformError::validation("birthdate is not a real date"));
            }
            set.insert("birthdate", bson::to_bson(birthdate)?);
        }
        Ok(set)
    }
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = Registration,
    responses(
        (status = 200, description = "User registered", body = ApiResponse<UserResponse>),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Duplicate email")
    )
)]
pub async fn register(
    State(state): State<UsersState>,
    AppJson(req): AppJson<Registration>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let user = state.writer.register(req).await?;
    Ok(Json(ApiResponse::ok("user registered", user.into())))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/users/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<UsersState>,
    client: ClientInfo,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>> {
    let user = state
        .writer
        .authenticate(LoginAttempt {
            email: &req.email,
            password: &req.password,
            ip: &client.ip,
            user_agent: &client.user_agent,
        })
        .await?;
    let tokens = issue_tokens(&state.auth_service, user)?;
    Ok(Json(ApiResponse::ok("logged in", tokens)))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/users/refresh",
    tag = "users",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Invalid, expired, or revoked refresh token")
    )
)]
pub async fn refresh(
    State(state): State<UsersState>,
    AppJson(req): AppJson<RefreshRequest>,
) -> Result<Json<ApiResponse<TokenResponse>>> {
    let claims = state.auth_service.validate_refresh(&req.token).await?;
    let user = state
        .user_repo
        .find_by_id(&claims.sub)
        .await?
        .ok_or_else(|| PlatformError::unauthorized("account no longer exists"))?;
    if user.is_banned() {
        return Err(PlatformError::forbidden("account is banned"));
    }

    state.auth_service.revoke(&req.token, &claims).await?;
    let tokens = issue_tokens(&state.auth_service, user)?;
    Ok(Json(ApiResponse::ok("token refreshed", tokens)))
}

/// Revoke the presented access token
#[utoipa::path(
    post,
    path = "/users/logout",
    tag = "users",
    responses((status = 200, description = "Logged out", body = ApiResponse<Empty>)),
    security(("bearer_auth" = []))
)]
pub async fn logout(State(state): State<UsersState>, auth: Authenticated) -> Result<Json<ApiResponse<Empty>>> {
    state.auth_service.revoke(&auth.token, &auth.claims).await?;
    info!(user_id = %auth.user_id, "User logged out");
    Ok(Json(ApiResponse::done("logged out")))
}

/// Current user
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    responses((status = 200, description = "Current user", body = ApiResponse<UserResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn get_me(State(state): State<UsersState>, auth: Authenticated) -> Result<Json<ApiResponse<UserResponse>>> {
    let user = state.user_repo.get(&auth.user_id).await?;
    Ok(Json(ApiResponse::ok("user found", user.into())))
}

/// Public profile
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = ApiResponse<PublicProfileResponse>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_public_profile(
    State(state): State<UsersState>,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<PublicProfileResponse>>> {
    let user = state.user_repo.get(&id).await?;
    Ok(Json(ApiResponse::ok("user found", user.into())))
}

/// Mail a fresh email-verification link
#[utoipa::path(
    post,
    path = "/users/send-verify-email",
    tag = "users",
    responses(
        (status = 200, description = "Verification mail queued", body = ApiResponse<Empty>),
        (status = 409, description = "Email already verified")
    ),
    security(("bearer_auth" = []))
)]
pub async fn send_verify_email(State(state): State<UsersState>, auth: Authenticated) -> Result<Json<ApiResponse<Empty>>> {
    state.writer.request_email_verification(&auth.user_id).await?;
    Ok(Json(ApiResponse::done("verification email sent")))
}

/// Consume an email-verification code
#[utoipa::path(
    get,
    path = "/users/verify-email",
    tag = "users",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = ApiResponse<UserResponse>),
        (status = 401, description = "Code invalid or expired")
    )
)]
pub async fn verify_email(
    State(state): State<UsersState>,
    AppQuery(query): AppQuery<VerifyEmailQuery>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let user = state.writer.verify_email(&query.id, &query.token).await?;
    Ok(Json(ApiResponse::ok("email verified", user.into())))
}

/// Mail a password-reset link. Unknown addresses get the same answer.
#[utoipa::path(
    post,
    path = "/users/send-password-reset",
    tag = "users",
    params(PasswordResetRequestQuery),
    responses((status = 200, description = "Reset mail queued if the account exists", body = ApiResponse<Empty>))
)]
pub async fn send_password_reset(
    State(state): State<UsersState>,
    AppQuery(query): AppQuery<PasswordResetRequestQuery>,
) -> Result<Json<ApiResponse<Empty>>> {
    state.writer.request_password_reset(&query.email).await?;
    Ok(Json(ApiResponse::done("password reset email sent")))
}

/// Set a new password with a reset code
#[utoipa::path(
    post,
    path = "/users/password-reset",
    tag = "users",
    params(PasswordResetQuery),
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<Empty>),
        (status = 400, description = "Password does not meet the policy"),
        (status = 401, description = "Code invalid or expired")
    )
)]
pub async fn password_reset(
    State(state): State<UsersState>,
    AppQuery(query): AppQuery<PasswordResetQuery>,
) -> Result<Json<ApiResponse<Empty>>> {
    state.writer.reset_password(&query.id, &query.token, &query.newpassword).await?;
    Ok(Json(ApiResponse::done("password reset successful")))
}

/// Update name, email, or thumbnail URL
#[utoipa::path(
    patch,
    path = "/users/me/profile",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserResponse>),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Email already in use")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile(
    State(state): State<UsersState>,
    auth: Authenticated,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let set = req.to_set_document()?;
    let thumbnail = req.thumbnail_url.as_deref().map(MediaSource::remote).transpose()?;
    if set.is_empty() && thumbnail.is_none() {
        return Err(PlatformError::validation("no profile fields to update"));
    }

    let mut user = if set.is_empty() {
        state.user_repo.get(&auth.user_id).await?
    } else {
        state.user_repo.update_fields(&auth.user_id, set).await?
    };
    if let Some(source) = thumbnail {
        user = state.writer.replace_thumbnail(&auth.user_id, source).await?;
    }
    Ok(Json(ApiResponse::ok("profile updated", user.into())))
}

/// Update phone, bio, or birthdate
#[utoipa::path(
    patch,
    path = "/users/me/details",
    tag = "users",
    request_body = UpdateDetailsRequest,
    responses((status = 200, description = "Details updated", body = ApiResponse<UserResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn update_details(
    State(state): State<UsersState>,
    auth: Authenticated,
    AppJson(req): AppJson<UpdateDetailsRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let set = req.to_set_document()?;
    if set.is_empty() {
        return Err(PlatformError::validation("no details to update"));
    }
    let user = state.user_repo.update_fields(&auth.user_id, set).await?;
    Ok(Json(ApiResponse::ok("details updated", user.into())))
}

/// Change password
#[utoipa::path(
    patch,
    path = "/users/me/password",
    tag = "users",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<Empty>),
        (status = 401, description = "Current password is wrong")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<UsersState>,
    auth: Authenticated,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<Empty>>> {
    state
        .writer
        .change_password(&auth.user_id, &req.current_password, &req.new_password)
        .await?;
    Ok(Json(ApiResponse::done("password changed")))
}

/// Upload a profile picture (`image` file part or `image` URL field)
#[utoipa::path(
    put,
    path = "/users/me/thumbnail",
    tag = "users",
    request_body(content_type = "multipart/form-data", description = "`image` file or URL"),
    responses(
        (status = 200, description = "Thumbnail replaced", body = ApiResponse<UserResponse>),
        (status = 400, description = "Missing or unsupported image")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_thumbnail(
    State(state): State<UsersState>,
    auth: Authenticated,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    let mut form = UploadForm::read(multipart?).await?;
    let source = form
        .take_image("image")?
        .ok_or_else(|| PlatformError::validation("image is required"))?;
    let user = state.writer.replace_thumbnail(&auth.user_id, source).await?;
    Ok(Json(ApiResponse::ok("thumbnail updated", user.into())))
}

/// Ask for the account to be deleted
#[utoipa::path(
    post,
    path = "/users/me/deletion-request",
    tag = "users",
    responses(
        (status = 200, description = "Deletion requested", body = ApiResponse<DeletionRequestResponse>),
        (status = 409, description = "Already requested")
    ),
    security(("bearer_auth" = []))
)]
pub async fn request_deletion(
    State(state): State<UsersState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<DeletionRequestResponse>>> {
    let request = state.user_repo.request_deletion(&auth.user_id).await?;
    info!(user_id = %auth.user_id, "Account deletion requested");
    Ok(Json(ApiResponse::ok(
        "account deletion requested",
        DeletionRequestResponse { requested_at: request.created_at },
    )))
}

/// Withdraw a pending deletion request
#[utoipa::path(
    delete,
    path = "/users/me/deletion-request",
    tag = "users",
    responses(
        (status = 200, description = "Request withdrawn", body = ApiResponse<Empty>),
        (status = 404, description = "No pending request")
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_deletion(State(state): State<UsersState>, auth: Authenticated) -> Result<Json<ApiResponse<Empty>>> {
    if !state.user_repo.cancel_deletion(&auth.user_id).await? {
        return Err(PlatformError::not_found("DeletionRequest", &auth.user_id));
    }
    Ok(Json(ApiResponse::done("account deletion cancelled")))
}

/// Ban, activate, or deactivate an account (admin)
#[utoipa::path(
    patch,
    path = "/users/{id}/status",
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    request_body = UserStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<UserResponse>),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_user_status(
    State(state): State<UsersState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(req): AppJson<UserStatusRequest>,
) -> Result<Json<ApiResponse<UserResponse>>> {
    checks::require_admin(&state.authz_service, &auth).await?;
    let user = state.user_repo.set_status(&id, req.status).await?;
    info!(user_id = %id, status = req.status.as_str(), admin_id = %auth.user_id, "User status changed");
    Ok(Json(ApiResponse::ok("user status updated", user.into())))
}

/// Login history, newest first
#[utoipa::path(
    get,
    path = "/users/{id}/login-history",
    tag = "users",
    params(("id" = String, Path, description = "User ID"), PaginationParams),
    responses((status = 200, description = "Login history", body = ApiResponse<PagedResponse<LoginHistoryResponse>>)),
    security(("bearer_auth" = []))
)]
pub async fn list_login_history(
    State(state): State<UsersState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppQuery(pagination): AppQuery<PaginationParams>,
) -> Result<Json<ApiResponse<PagedResponse<LoginHistoryResponse>>>> {
    checks::require_self(&state.authz_service, &auth, &id).await?;
    let page = pagination.resolve(LOGIN_HISTORY_SORTS, true)?;
    let history = state.user_repo.list_login_history(&id, &page).await?;
    Ok(Json(ApiResponse::ok("login history", history.map(LoginHistoryResponse::from))))
}

/// Delete selected login-history rows, or all of them
#[utoipa::path(
    delete,
    path = "/users/{id}/login-history",
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    request_body = DeleteLoginHistoryRequest,
    responses((status = 200, description = "Rows deleted", body = ApiResponse<DeletedCountResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn delete_login_history(
    State(state): State<UsersState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    body: Option<AppJson<DeleteLoginHistoryRequest>>,
) -> Result<Json<ApiResponse<DeletedCountResponse>>> {
    checks::require_self(&state.authz_service, &auth, &id).await?;
    let ids = body.map(|AppJson(req)| req.ids).unwrap_or_default();
    let deleted = state.user_repo.delete_login_history(&id, &ids).await?;
    Ok(Json(ApiResponse::ok("login history deleted", DeletedCountResponse { deleted })))
}

/// Whether a login from a new IP triggers a security mail
#[utoipa::path(
    get,
    path = "/users/{id}/login-notification",
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    responses((status = 200, description = "Current setting", body = ApiResponse<LoginNotificationSetting>)),
    security(("bearer_auth" = []))
)]
pub async fn get_login_notification(
    State(state): State<UsersState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
) -> Result<Json<ApiResponse<LoginNotificationSetting>>> {
    checks::require_self(&state.authz_service, &auth, &id).await?;
    let user = state.user_repo.get(&id).await?;
    Ok(Json(ApiResponse::ok(
        "login notification setting",
        LoginNotificationSetting { allow_login_ip_notification: user.allow_login_ip_notification },
    )))
}

#[utoipa::path(
    patch,
    path = "/users/{id}/login-notification",
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    request_body = LoginNotificationSetting,
    responses((status = 200, description = "Setting updated", body = ApiResponse<LoginNotificationSetting>)),
    security(("bearer_auth" = []))
)]
pub async fn update_login_notification(
    State(state): State<UsersState>,
    auth: Authenticated,
    AppPath(id): AppPath<String>,
    AppJson(req): AppJson<LoginNotificationSetting>,
) -> Result<Json<ApiResponse<LoginNotificationSetting>>> {
    checks::require_self(&state.authz_service, &auth, &id).await?;
    let user = state
        .user_repo
        .set_login_notification(&id, req.allow_login_ip_notification)
        .await?;
    Ok(Json(ApiResponse::ok(
        "login notification setting updated",
        LoginNotificationSetting { allow_login_ip_notification: user.allow_login_ip_notification },
    )))
}

/// Create users router
pub fn users_router(state: UsersState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(register))
        .routes(routes!(login))
        .routes(routes!(refresh))
        .routes(routes!(logout))
        .routes(routes!(get_me))
        .routes(routes!(send_verify_email))
        .routes(routes!(verify_email))
        .routes(routes!(send_password_reset))
        .routes(routes!(password_reset))
        .routes(routes!(update_profile))
        .routes(routes!(update_details))
        .routes(routes!(change_password))
        .routes(routes!(upload_thumbnail))
        .routes(routes!(request_deletion, cancel_deletion))
        .routes(routes!(get_public_profile))
        .routes(routes!(set_user_status))
        .routes(routes!(list_login_history, delete_login_history))
        .routes(routes!(get_login_notification, update_login_notification))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_update_document() {
        let req = UpdateProfileRequest {
            first_name: Some(" Grace ".into()),
            email: Some("Grace@Example.COM".into()),
            ..Default::default()
        };
        let set = req.to_set_document().unwrap();
        assert_eq!(set.get_str("first_name").unwrap(), "Grace");
        assert_eq!(set.get_str("primary_email").unwrap(), "grace@example.com");
        assert!(!set.get_bool("auth.email_verified").unwrap());
        assert!(!set.contains_key("last_name"));
    }

    #[test]
    fn test_profile_update_rejects_bad_name() {
        let req = UpdateProfileRequest {
            last_name: Some("lovelace".into()),
            ..Default::default()
        };
        assert!(req.to_set_document().is_err());
    }

    #[test]
    fn test_details_validation() {
        let req = UpdateDetailsRequest {
            phone: Some("+2348012345678".into()),
            birthdate: Some(Birthdate { day: 29, month: 2, year: 2000 }),
            ..Default::default()
        };
        let set = req.to_set_document().unwrap();
        assert_eq!(set.get_str("phone").unwrap(), "+2348012345678");
        assert_eq!(set.get_document("birthdate").unwrap().get_i32("year").unwrap(), 2000);

        let bad_phone = UpdateDetailsRequest { phone: Some("12ab".into()), ..Default::default() };
        assert!(bad_phone.to_set_document().is_err());

        let bad_date = UpdateDetailsRequest {
            birthdate: Some(Birthdate { day: 30, month: 2, year: 2001 }),
            ..Default::default()
        };
        assert!(bad_date.to_set_document().is_err());

        let long_bio = UpdateDetailsRequest { bio: Some("x".repeat(501)), ..Default::default() };
        assert!(long_bio.to_set_document().is_err());
    }
}
