#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    middleware,
    response::Response,
    Router,
};
use preorder_api::{
    auth::hash_password,
    config::AppConfig,
    db,
    events::{self, EventSender},
    gateway::{PaymentGateway, RazorpayGateway, SignatureVerifier},
    handlers::AppServices,
    middleware_helpers::request_id_middleware,
    models::{Currency, MenuCatalog},
    AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

pub const GATEWAY_SECRET: &str = "test_gateway_secret";
pub const ADMIN_EMAIL: &str = "admin@harveyscafe.com";
pub const ADMIN_PASSWORD: &str = "correct horse battery staple";

/// Application harness backed by a SQLite file in a temp dir and a mock gateway.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: MockServer,
    admin_token: String,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir");
        let gateway = MockServer::start().await;

        let mut cfg = AppConfig::new(
            format!(
                "sqlite://{}?mode=rwc",
                db_dir.path().join("preorders.db").display()
            ),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.store_timeout_secs = 2;
        cfg.gateway_timeout_secs = 2;
        cfg.payment.key_id = "rzp_test_key".to_string();
        cfg.payment.key_secret = GATEWAY_SECRET.to_string();
        cfg.payment.base_url = gateway.uri();
        cfg.admin_email = Some(ADMIN_EMAIL.to_string());
        cfg.admin_password_hash = Some(hash_password(ADMIN_PASSWORD).expect("hash password"));

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway_client: Arc<dyn PaymentGateway> = Arc::new(
            RazorpayGateway::new(&cfg.payment, cfg.gateway_timeout()).expect("gateway client"),
        );
        let menu = Arc::new(MenuCatalog::embedded(Currency::Inr).expect("bundled menu"));

        let services = AppServices::new(
            db_arc.clone(),
            gateway_client,
            menu,
            event_sender.clone(),
            &cfg,
        )
        .expect("services");

        let admin_token = services
            .auth
            .login(ADMIN_EMAIL, ADMIN_PASSWORD)
            .expect("admin login")
            .access_token;

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", preorder_api::api_v1_routes())
            .layer(middleware::from_fn(request_id_middleware))
            .with_state(state.clone());

        Self {
            router,
            state,
            gateway,
            admin_token,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(self.admin_token())).await
    }

    /// Submits two Regular Veg Rolls for Asha and returns the invoice JSON.
    pub async fn submit_veg_rolls(&self) -> Value {
        let response = self
            .request(
                Method::POST,
                "/api/v1/order-requests",
                Some(veg_roll_order("asha@example.com")),
                None,
            )
            .await;
        assert_eq!(response.status(), 201);
        response_json(response).await["data"].clone()
    }

    pub async fn decide(&self, invoice_id: &str, decision: &str) -> Response {
        self.request_as_admin(
            Method::PATCH,
            &format!("/api/v1/invoices/{}/status", invoice_id),
            Some(json!({ "decision": decision })),
        )
        .await
    }

    /// Stubs the gateway so order creation and lookup both return `order_id`,
    /// opened for `invoice_id` with the given receipt.
    pub async fn mock_gateway_order(
        &self,
        order_id: &str,
        invoice_id: &str,
        receipt: &str,
        amount_minor: i64,
    ) {
        let order = json!({
            "id": order_id,
            "entity": "order",
            "amount": amount_minor,
            "amount_paid": 0,
            "currency": "INR",
            "receipt": receipt,
            "status": "created",
            "notes": { "invoice_id": invoice_id }
        });
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(order.clone()))
            .mount(&self.gateway)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/orders/{}", order_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(order))
            .mount(&self.gateway)
            .await;
    }

    /// Signature the checkout widget would hand back for a genuine payment.
    pub fn sign(&self, order_id: &str, payment_id: &str) -> String {
        SignatureVerifier::new(GATEWAY_SECRET)
            .expect("verifier")
            .sign(order_id, payment_id)
    }

    pub async fn invoice(&self, invoice_id: &str) -> Value {
        let response = self
            .request(Method::GET, &format!("/api/v1/invoices/{}", invoice_id), None, None)
            .await;
        assert_eq!(response.status(), 200);
        response_json(response).await["data"].clone()
    }
}

pub fn veg_roll_order(email: &str) -> Value {
    json!({
        "items": [{
            "name": "Veg Roll",
            "price": "₹59",
            "quantity": 2,
            "category": "Rolls",
            "selected_size": "Regular",
            "food_type": "Veg"
        }],
        "customer_name": "Asha Rao",
        "customer_email": email,
        "customer_phone": "+91 90000 00000",
        "visit_offset_minutes": 30
    })
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
