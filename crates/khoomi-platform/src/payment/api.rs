//! Payment Information API
//!
//! Payout bank accounts. Only sellers may register them.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::payment::entity::{PaymentInformation, PaymentInput};
use crate::payment::repository::PaymentRepository;
use crate::shared::api_common::{ApiResponse, AppJson, AppPath, Empty};
use crate::shared::authorization_service::{checks, AuthContext, AuthorizationService};
use crate::shared::error::Result;
use crate::shared::middleware::Authenticated;
use crate::writer::AggregateWriter;

#[derive(Clone)]
pub struct PaymentsState {
    pub payment_repo: Arc<PaymentRepository>,
    pub writer: Arc<AggregateWriter>,
    pub authz_service: Arc<AuthorizationService>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentInformationResponse {
    pub id: String,
    pub user_id: String,
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<PaymentInformation> for PaymentInformationResponse {
    fn from(p: PaymentInformation) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            bank_name: p.bank_name,
            account_name: p.account_name,
            account_number: p.account_number,
            is_default: p.is_default,
            created_at: p.created_at,
            modified_at: p.modified_at,
        }
    }
}

async fn require_self_seller(state: &PaymentsState, auth: &AuthContext, user_id: &str) -> Result<()> {
    checks::require_self(&state.authz_service, auth, user_id).await?;
    checks::require_seller(&state.authz_service, auth).await?;
    Ok(())
}

/// Register a payout account
#[utoipa::path(
    post,
    path = "/users/{id}/payment-information",
    tag = "payment-information",
    params(("id" = String, Path, description = "User ID")),
    request_body = PaymentInput,
    responses(
        (status = 200, description = "Account created", body = ApiResponse<PaymentInformationResponse>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Not a seller"),
        (status = 422, description = "Account limit reached")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_payment_information(
    State(state): State<PaymentsState>,
    auth: Authenticated,
    AppPath(user_id): AppPath<String>,
    AppJson(req): AppJson<PaymentInput>,
) -> Result<Json<ApiResponse<PaymentInformationResponse>>> {
    require_self_seller(&state, &auth, &user_id).await?;
    req.validate()?;
    let account = state.writer.insert_flagged(PaymentInformation::new(user_id, req)).await?;
    Ok(Json(ApiResponse::ok("payment information created", account.into())))
}

/// List payout accounts, default first
#[utoipa::path(
    get,
    path = "/users/{id}/payment-information",
    tag = "payment-information",
    params(("id" = String, Path, description = "User ID")),
    responses((status = 200, description = "Accounts", body = ApiResponse<Vec<PaymentInformationResponse>>)),
    security(("bearer_auth" = []))
)]
pub async fn list_payment_information(
    State(state): State<PaymentsState>,
    auth: Authenticated,
    AppPath(user_id): AppPath<String>,
) -> Result<Json<ApiResponse<Vec<PaymentInformationResponse>>>> {
    require_self_seller(&state, &auth, &user_id).await?;
    let accounts = state.payment_repo.list(&user_id).await?;
    Ok(Json(ApiResponse::ok(
        "payment information",
        accounts.into_iter().map(PaymentInformationResponse::from).collect(),
    )))
}

#[utoipa::path(
    put,
    path = "/users/{id}/payment-information/{payment_id}",
    tag = "payment-information",
    params(
        ("id" = String, Path, description = "User ID"),
        ("payment_id" = String, Path, description = "Payment information ID")
    ),
    request_body = PaymentInput,
    responses(
        (status = 200, description = "Account updated", body = ApiResponse<PaymentInformationResponse>),
        (status = 404, description = "Account not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_payment_information(
    State(state): State<PaymentsState>,
    auth: Authenticated,
    AppPath((user_id, payment_id)): AppPath<(String, String)>,
    AppJson(req): AppJson<PaymentInput>,
) -> Result<Json<ApiResponse<PaymentInformationResponse>>> {
    require_self_seller(&state, &auth, &user_id).await?;
    req.validate()?;
    let account: PaymentInformation = state
        .writer
        .update_flagged(&user_id, &payment_id, req.to_set_document(), req.is_default)
        .await?;
    Ok(Json(ApiResponse::ok("payment information updated", account.into())))
}

#[utoipa::path(
    delete,
    path = "/users/{id}/payment-information/{payment_id}",
    tag = "payment-information",
    params(
        ("id" = String, Path, description = "User ID"),
        ("payment_id" = String, Path, description = "Payment information ID")
    ),
    responses(
        (status = 200, description = "Account deleted", body = ApiResponse<Empty>),
        (status = 404, description = "Account not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_payment_information(
    State(state): State<PaymentsState>,
    auth: Authenticated,
    AppPath((user_id, payment_id)): AppPath<(String, String)>,
) -> Result<Json<ApiResponse<Empty>>> {
    require_self_seller(&state, &auth, &user_id).await?;
    state.payment_repo.delete(&user_id, &payment_id).await?;
    Ok(Json(ApiResponse::done("payment information deleted")))
}

/// Make an account the default payout account
#[utoipa::path(
    put,
    path = "/users/{id}/payment-information/{payment_id}/default",
    tag = "payment-information",
    params(
        ("id" = String, Path, description = "User ID"),
        ("payment_id" = String, Path, description = "Payment information ID")
    ),
    responses(
        (status = 200, description = "Default changed", body = ApiResponse<PaymentInformationResponse>),
        (status = 404, description = "Account not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_default_payment_information(
    State(state): State<PaymentsState>,
    auth: Authenticated,
    AppPath((user_id, payment_id)): AppPath<(String, String)>,
) -> Result<Json<ApiResponse<PaymentInformationResponse>>> {
    require_self_seller(&state, &auth, &user_id).await?;
    let account: PaymentInformation = state.writer.set_default(&user_id, &payment_id).await?;
    Ok(Json(ApiResponse::ok("default payment information updated", account.into())))
}

pub fn payments_router(state: PaymentsState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(create_payment_information, list_payment_information))
        .routes(routes!(update_payment_information, delete_payment_information))
        .routes(routes!(set_default_payment_information))
        .with_state(state)
}
