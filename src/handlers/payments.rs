use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::models::{Currency, CustomerSnapshot};
use crate::services::invoices::MoneyView;
use crate::services::{InvoiceView, PaymentSession, VerifyPayment};
use crate::ApiResponse;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePaymentOrderRequest {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub invoice_id: Uuid,
}

/// Checkout widget configuration for the advance payment.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentSessionResponse {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    #[schema(example = "order_NX1a2b3c4d")]
    pub gateway_order_id: String,
    /// Advance in minor units, as the gateway expects it
    #[schema(example = 5900)]
    pub amount_minor: i64,
    pub amount: MoneyView,
    pub currency: Currency,
    /// Public gateway key for the checkout widget
    pub key_id: String,
    pub description: String,
    pub prefill: CustomerSnapshot,
}

impl From<PaymentSession> for PaymentSessionResponse {
    fn from(session: PaymentSession) -> Self {
        Self {
            invoice_id: session.invoice_id,
            invoice_number: session.invoice_number,
            gateway_order_id: session.gateway_order_id,
            amount_minor: session.amount.minor(),
            currency: session.amount.currency(),
            amount: session.amount.into(),
            key_id: session.key_id,
            description: session.description,
            prefill: session.prefill,
        }
    }
}

/// Fields posted back by the checkout widget after a successful payment.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "invoice_id": "550e8400-e29b-41d4-a716-446655440000",
    "razorpay_order_id": "order_NX1a2b3c4d",
    "razorpay_payment_id": "pay_NX1e5f6g7h",
    "razorpay_signature": "52115a0d3400de9e86aade1f1b6eba9e8974604f4e267a9e9a16633a4c8dd2cb"
}))]
pub struct VerifyPaymentRequest {
    pub invoice_id: Uuid,
    #[serde(alias = "razorpay_order_id")]
    #[validate(length(min = 1, max = 64))]
    pub order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    #[validate(length(min = 1, max = 64))]
    pub payment_id: String,
    #[serde(alias = "razorpay_signature")]
    #[validate(length(min = 1, max = 128))]
    pub signature: String,
}

impl From<VerifyPaymentRequest> for VerifyPayment {
    fn from(request: VerifyPaymentRequest) -> Self {
        Self {
            invoice_id: request.invoice_id,
            order_id: request.order_id,
            payment_id: request.payment_id,
            signature: request.signature,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentVerificationResponse {
    pub invoice: InvoiceView,
    /// True when this payment had already confirmed the invoice
    pub already_verified: bool,
}

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payment-orders", post(create_payment_order))
        .route("/payment-verifications", post(verify_payment))
}

/// Open a gateway order for the 50% advance of an approved invoice
#[utoipa::path(
    post,
    path = "/api/v1/payment-orders",
    request_body = CreatePaymentOrderRequest,
    responses(
        (status = 201, description = "Gateway order opened", body = crate::ApiResponse<PaymentSessionResponse>),
        (status = 400, description = "Invoice is not approved", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway rejected the order", body = crate::errors::ErrorResponse),
        (status = 503, description = "Gateway unreachable", body = crate::errors::ErrorResponse),
        (status = 504, description = "Gateway timed out", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn create_payment_order(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentSessionResponse>>), ServiceError> {
    let session = state
        .services
        .payments
        .create_payment_order(request.invoice_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(session.into()))))
}

/// Verify the gateway signature and confirm the invoice
#[utoipa::path(
    post,
    path = "/api/v1/payment-verifications",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Invoice confirmed, or already confirmed by this payment", body = crate::ApiResponse<PaymentVerificationResponse>),
        (status = 400, description = "Invoice is not awaiting payment", body = crate::errors::ErrorResponse),
        (status = 401, description = "Signature or gateway order mismatch", body = crate::errors::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Invoice confirmed by a different payment", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<ApiResponse<PaymentVerificationResponse>>, ServiceError> {
    request.validate()?;

    let outcome = state.services.payments.verify_payment(request.into()).await?;
    let response = PaymentVerificationResponse {
        invoice: InvoiceView::try_from(&outcome.invoice)?,
        already_verified: outcome.already_verified,
    };
    Ok(Json(ApiResponse::success(response)))
}
