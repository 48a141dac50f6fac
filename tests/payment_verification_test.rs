//! Payment verification is the only trust boundary: anything that does not
//! carry a valid gateway signature for this invoice's order must leave the
//! invoice untouched.

mod common;

use axum::http::Method;
use common::{response_json, TestApp};
use serde_json::{json, Value};

async fn approved_invoice(app: &TestApp) -> Value {
    let invoice = app.submit_veg_rolls().await;
    let response = app.decide(invoice["id"].as_str().unwrap(), "approve").await;
    assert_eq!(response.status(), 200);
    invoice
}

async fn verify(app: &TestApp, payload: Value) -> axum::response::Response {
    app.request(Method::POST, "/api/v1/payment-verifications", Some(payload), None)
        .await
}

#[tokio::test]
async fn tampered_signature_leaves_invoice_approved() {
    let app = TestApp::new().await;
    let invoice = approved_invoice(&app).await;
    let invoice_id = invoice["id"].as_str().unwrap();
    app.mock_gateway_order(
        "order_T1",
        invoice_id,
        invoice["invoice_number"].as_str().unwrap(),
        5_900,
    )
    .await;

    let genuine = app.sign("order_T1", "pay_T1");
    let flipped = if genuine.starts_with('0') { "1" } else { "0" };
    let signature = format!("{}{}", flipped, &genuine[1..]);

    let response = verify(
        &app,
        json!({
            "invoice_id": invoice_id,
            "order_id": "order_T1",
            "payment_id": "pay_T1",
            "signature": signature,
        }),
    )
    .await;
    assert_eq!(response.status(), 401);
    assert_eq!(
        response_json(response).await["message"],
        "Unauthorized: invalid payment signature"
    );

    let stored = app.invoice(invoice_id).await;
    assert_eq!(stored["status"], "approved");
    assert_eq!(stored["payment_status"], "pending");
    assert!(stored.get("gateway_payment_id").is_none());
}

#[tokio::test]
async fn signature_for_another_payment_is_rejected() {
    let app = TestApp::new().await;
    let invoice = approved_invoice(&app).await;
    let invoice_id = invoice["id"].as_str().unwrap();

    let response = verify(
        &app,
        json!({
            "invoice_id": invoice_id,
            "order_id": "order_T2",
            "payment_id": "pay_T2",
            "signature": app.sign("order_T2", "pay_OTHER"),
        }),
    )
    .await;
    assert_eq!(response.status(), 401);
    assert_eq!(app.invoice(invoice_id).await["status"], "approved");
}

#[tokio::test]
async fn gateway_order_for_a_different_invoice_is_rejected() {
    let app = TestApp::new().await;
    let invoice = approved_invoice(&app).await;
    let invoice_id = invoice["id"].as_str().unwrap();
    // Validly signed, but the order was opened for someone else's receipt
    app.mock_gateway_order("order_T3", invoice_id, "INV-19990101-001", 5_900)
        .await;

    let response = verify(
        &app,
        json!({
            "invoice_id": invoice_id,
            "order_id": "order_T3",
            "payment_id": "pay_T3",
            "signature": app.sign("order_T3", "pay_T3"),
        }),
    )
    .await;
    assert_eq!(response.status(), 401);
    assert_eq!(app.invoice(invoice_id).await["status"], "approved");
}

#[tokio::test]
async fn order_opened_for_another_invoice_cannot_confirm_this_one() {
    let app = TestApp::new().await;
    let paid_for = approved_invoice(&app).await;
    let other = approved_invoice(&app).await;
    let other_id = other["id"].as_str().unwrap();
    // Receipt and amount match `other`; only the invoice id note differs
    app.mock_gateway_order(
        "order_T6",
        paid_for["id"].as_str().unwrap(),
        other["invoice_number"].as_str().unwrap(),
        5_900,
    )
    .await;

    let response = verify(
        &app,
        json!({
            "invoice_id": other_id,
            "order_id": "order_T6",
            "payment_id": "pay_T6",
            "signature": app.sign("order_T6", "pay_T6"),
        }),
    )
    .await;
    assert_eq!(response.status(), 401);
    assert_eq!(app.invoice(other_id).await["status"], "approved");
    assert_eq!(
        app.invoice(paid_for["id"].as_str().unwrap()).await["status"],
        "approved"
    );
}

#[tokio::test]
async fn pending_invoice_cannot_be_paid() {
    let app = TestApp::new().await;
    let invoice = app.submit_veg_rolls().await;
    let invoice_id = invoice["id"].as_str().unwrap();

    let response = verify(
        &app,
        json!({
            "invoice_id": invoice_id,
            "order_id": "order_T4",
            "payment_id": "pay_T4",
            "signature": app.sign("order_T4", "pay_T4"),
        }),
    )
    .await;
    assert_eq!(response.status(), 400);
    assert_eq!(app.invoice(invoice_id).await["status"], "pending");
}

#[tokio::test]
async fn different_payment_after_confirmation_conflicts() {
    let app = TestApp::new().await;
    let invoice = approved_invoice(&app).await;
    let invoice_id = invoice["id"].as_str().unwrap();
    app.mock_gateway_order(
        "order_T5",
        invoice_id,
        invoice["invoice_number"].as_str().unwrap(),
        5_900,
    )
    .await;

    let first = verify(
        &app,
        json!({
            "invoice_id": invoice_id,
            "order_id": "order_T5",
            "payment_id": "pay_T5",
            "signature": app.sign("order_T5", "pay_T5"),
        }),
    )
    .await;
    assert_eq!(first.status(), 200);

    let second = verify(
        &app,
        json!({
            "invoice_id": invoice_id,
            "order_id": "order_T5",
            "payment_id": "pay_T5b",
            "signature": app.sign("order_T5", "pay_T5b"),
        }),
    )
    .await;
    assert_eq!(second.status(), 409);

    let stored = app.invoice(invoice_id).await;
    assert_eq!(stored["gateway_payment_id"], "pay_T5");
}

#[tokio::test]
async fn gateway_rejection_is_a_bad_gateway() {
    let app = TestApp::new().await;
    let invoice = approved_invoice(&app).await;
    // No mocks mounted: the stub server answers 404 to order creation
    let response = app
        .request(
            Method::POST,
            "/api/v1/payment-orders",
            Some(json!({ "invoice_id": invoice["id"] })),
            None,
        )
        .await;
    assert_eq!(response.status(), 502);
    assert_eq!(app.invoice(invoice["id"].as_str().unwrap()).await["status"], "approved");
}
