use axum::{
    extract::{Json, Path, Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::InvoiceView;
use crate::ApiResponse;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct CustomerInvoicesQuery {
    /// Customer email the invoices were placed under
    #[param(example = "asha@example.com")]
    pub customer: Option<String>,
}

pub fn invoice_routes() -> Router<AppState> {
    Router::new()
        .route("/invoices", get(list_customer_invoices))
        .route("/invoices/:id", get(get_invoice))
}

/// List a customer's invoices, newest first
///
/// Always answers 200; a store outage yields an empty list.
#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    params(CustomerInvoicesQuery),
    responses(
        (status = 200, description = "Invoices for the customer", body = crate::ApiResponse<Vec<InvoiceView>>)
    ),
    tag = "Invoices"
)]
pub async fn list_customer_invoices(
    State(state): State<AppState>,
    Query(query): Query<CustomerInvoicesQuery>,
) -> Json<ApiResponse<Vec<InvoiceView>>> {
    let email = query.customer.unwrap_or_default();
    let invoices = state.services.invoices.list_for_customer(&email).await;
    Json(ApiResponse::success(invoices))
}

/// Fetch one invoice
#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}",
    params(
        ("id" = Uuid, Path, description = "Invoice ID")
    ),
    responses(
        (status = 200, description = "Invoice", body = crate::ApiResponse<InvoiceView>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<InvoiceView>>, ServiceError> {
    let invoice = state
        .services
        .invoices
        .get(id)
        .await
        .ok_or_else(|| ServiceError::NotFound(format!("invoice {}", id)))?;
    Ok(Json(ApiResponse::success(invoice)))
}
