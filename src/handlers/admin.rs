use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, patch, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminToken, AdminUser};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::models::InvoiceStatus;
use crate::services::{AdminDecision, DashboardView, InvoiceView};
use crate::ApiResponse;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdminLoginRequest {
    #[validate(email)]
    #[schema(example = "admin@harveyscafe.com")]
    pub email: String,
    #[validate(length(min = 1, max = 256))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub decision: AdminDecision,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DecisionResponse {
    pub invoice: InvoiceView,
    /// False when the invoice had already left the expected status
    pub changed: bool,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct DashboardQuery {
    pub status: Option<InvoiceStatus>,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(admin_login))
        .route("/admin/invoices", get(admin_dashboard))
        .route("/invoices/:id/status", patch(update_invoice_status))
}

/// Exchange the admin credentials for a bearer token
#[utoipa::path(
    post,
    path = "/api/v1/admin/login",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Token issued", body = crate::ApiResponse<AdminToken>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn admin_login(
    State(state): State<AppState>,
    Json(request): Json<AdminLoginRequest>,
) -> Result<Json<ApiResponse<AdminToken>>, ServiceError> {
    request.validate()?;
    let token = state.services.auth.login(&request.email, &request.password)?;
    Ok(Json(ApiResponse::success(token)))
}

/// Approve, reject or complete an invoice
#[utoipa::path(
    patch,
    path = "/api/v1/invoices/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Invoice ID")
    ),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Decision applied, or ignored because the invoice moved on", body = crate::ApiResponse<DecisionResponse>),
        (status = 401, description = "Missing or invalid admin token", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<DecisionResponse>>, ServiceError> {
    info!(admin = %admin.email, invoice_id = %id, decision = %request.decision, "Admin decision received");

    let outcome = state.services.order_status.decide(id, request.decision).await?;
    let response = DecisionResponse {
        invoice: InvoiceView::try_from(&outcome.invoice)?,
        changed: outcome.changed,
    };
    Ok(Json(ApiResponse::success(response)))
}

/// Dashboard listing with per-status counts
#[utoipa::path(
    get,
    path = "/api/v1/admin/invoices",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Invoices and counts", body = crate::ApiResponse<DashboardView>),
        (status = 401, description = "Missing or invalid admin token", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn admin_dashboard(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<DashboardQuery>,
) -> Json<ApiResponse<DashboardView>> {
    let dashboard = state.services.invoices.dashboard(query.status).await;
    Json(ApiResponse::success(dashboard))
}
