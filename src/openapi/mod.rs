use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Preorder API",
        version = "0.1.0",
        description = r#"
# Restaurant pre-order API

Customers build a cart from the menu and submit it as an order request with a
planned visit time. Staff approve or reject each request; once approved the
customer pays a 50% advance online and the remainder at the counter.

## Flow

1. `POST /order-requests` records a `pending` invoice
2. `PATCH /invoices/:id/status` (admin) approves or rejects it
3. `POST /payment-orders` opens a gateway order for the advance
4. `POST /payment-verifications` checks the gateway signature and confirms the invoice

## Authentication

Admin endpoints take `Authorization: Bearer <token>` from `POST /admin/login`.
"#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order request intake"),
        (name = "Payments", description = "Advance payment via the gateway"),
        (name = "Invoices", description = "Invoice lookups"),
        (name = "Admin", description = "Staff approval and dashboard"),
        (name = "Menu", description = "Restaurant menu")
    ),
    paths(
        crate::handlers::order_requests::create_order_request,
        crate::handlers::payments::create_payment_order,
        crate::handlers::payments::verify_payment,
        crate::handlers::invoices::list_customer_invoices,
        crate::handlers::invoices::get_invoice,
        crate::handlers::admin::admin_login,
        crate::handlers::admin::update_invoice_status,
        crate::handlers::admin::admin_dashboard,
        crate::handlers::menu::get_menu,
    ),
    components(
        schemas(
            crate::handlers::order_requests::CreateOrderRequest,
            crate::handlers::order_requests::OrderLineRequest,
            crate::handlers::payments::CreatePaymentOrderRequest,
            crate::handlers::payments::PaymentSessionResponse,
            crate::handlers::payments::VerifyPaymentRequest,
            crate::handlers::payments::PaymentVerificationResponse,
            crate::handlers::admin::AdminLoginRequest,
            crate::handlers::admin::UpdateStatusRequest,
            crate::handlers::admin::DecisionResponse,
            crate::handlers::menu::MenuResponse,
            crate::services::InvoiceView,
            crate::services::DashboardView,
            crate::services::StatusCounts,
            crate::services::AdminDecision,
            crate::models::InvoiceStatus,
            crate::models::PaymentStatus,
            crate::auth::AdminToken,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
