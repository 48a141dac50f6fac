use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::models::{Cart, Currency, CustomerSnapshot, FoodType, LineItem, Money, VisitOffset};
use crate::services::{InvoiceView, NewOrderRequest};
use crate::ApiResponse;

/// One cart line as sent by the ordering page.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderLineRequest {
    #[validate(length(min = 1, max = 120))]
    #[schema(example = "Veg Roll")]
    pub name: String,
    /// Menu price label, e.g. `₹59`
    #[validate(length(min = 1, max = 20))]
    #[schema(example = "₹59")]
    pub price: String,
    #[validate(range(min = 1, max = 99))]
    #[schema(example = 2)]
    pub quantity: u32,
    #[validate(length(min = 1, max = 60))]
    #[schema(example = "Rolls")]
    pub category: String,
    #[serde(default)]
    #[schema(example = "Regular")]
    pub selected_size: Option<String>,
    #[serde(default)]
    pub food_type: Option<FoodType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "items": [
        {"name": "Veg Roll", "price": "₹59", "quantity": 2, "category": "Rolls", "selected_size": "Regular", "food_type": "Veg"}
    ],
    "customer_name": "Asha Rao",
    "customer_email": "asha@example.com",
    "customer_phone": "+91 90000 00000",
    "visit_offset_minutes": 30
}))]
pub struct CreateOrderRequest {
    #[validate]
    pub items: Vec<OrderLineRequest>,
    #[validate(length(max = 120))]
    pub customer_name: String,
    #[validate(length(max = 254))]
    pub customer_email: String,
    #[validate(length(max = 32))]
    pub customer_phone: String,
    /// Minutes from now: 10, 15, 30, 45, 60, 90 or 120
    pub visit_offset_minutes: u32,
}

impl CreateOrderRequest {
    /// Parses price labels and folds the lines through a [`Cart`] so repeated
    /// choices collapse into one line.
    pub fn into_new_order(self, currency: Currency) -> Result<NewOrderRequest, ServiceError> {
        let visit_offset = VisitOffset::try_from(self.visit_offset_minutes)?;

        let mut cart = Cart::new();
        for line in self.items {
            let unit_price = Money::parse_label(&line.price, currency)?;
            let item = LineItem::new(line.name, unit_price, line.quantity, line.category)?
                .with_size(line.selected_size.filter(|size| !size.trim().is_empty()))
                .with_food_type(line.food_type);
            cart.add(item);
        }

        Ok(NewOrderRequest {
            customer: CustomerSnapshot {
                name: self.customer_name,
                email: self.customer_email,
                phone: self.customer_phone,
            },
            cart,
            visit_offset,
        })
    }
}

pub fn order_request_routes() -> Router<AppState> {
    Router::new().route("/order-requests", post(create_order_request))
}

/// Submit a cart for admin approval
#[utoipa::path(
    post,
    path = "/api/v1/order-requests",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order request recorded as pending", body = crate::ApiResponse<InvoiceView>,
            headers(
                ("X-Request-Id" = String, description = "Unique request identifier"),
            )
        ),
        (status = 400, description = "Empty cart, bad customer details, unknown item or price", body = crate::errors::ErrorResponse),
        (status = 500, description = "Invoice could not be stored", body = crate::errors::ErrorResponse),
        (status = 504, description = "Store timed out", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn create_order_request(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InvoiceView>>), ServiceError> {
    payload.validate()?;

    let request = payload.into_new_order(state.config.payment.currency)?;
    let invoice = state.services.order_requests.submit(request).await?;
    let view = InvoiceView::try_from(&invoice)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(view))))
}
