use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{record_audit, with_timeout};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{NewGatewayOrder, PaymentGateway, SignatureVerifier};
use crate::models::{
    Currency, CustomerSnapshot, Invoice, InvoiceStatus, Money, PaymentStatus, StatusChange,
};
use crate::repositories::{AuditEntry, InvoiceRepository};

/// Everything the checkout widget needs to collect the advance.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentSession {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub gateway_order_id: String,
    pub amount: Money,
    pub key_id: String,
    pub prefill: CustomerSnapshot,
    pub description: String,
}

/// Callback data returned by the checkout widget.
#[derive(Debug, Clone)]
pub struct VerifyPayment {
    pub invoice_id: Uuid,
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOutcome {
    pub invoice: Invoice,
    /// The same payment had already confirmed this invoice; nothing was written
    pub already_verified: bool,
}

/// Advance payment: opens gateway orders and confirms invoices on a valid signature.
#[derive(Clone)]
pub struct PaymentService {
    repo: Arc<dyn InvoiceRepository>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
    events: EventSender,
    key_id: String,
    currency: Currency,
    merchant_name: String,
    store_timeout: Duration,
    gateway_timeout: Duration,
}

impl PaymentService {
    pub fn new(
        repo: Arc<dyn InvoiceRepository>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSender,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            repo,
            gateway,
            verifier: SignatureVerifier::new(&config.payment.key_secret)?,
            events,
            key_id: config.payment.key_id.clone(),
            currency: config.payment.currency,
            merchant_name: config.restaurant.name.clone(),
            store_timeout: config.store_timeout(),
            gateway_timeout: config.gateway_timeout(),
        })
    }

    /// Opens a gateway order for the advance of an approved invoice. No local write.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn create_payment_order(&self, invoice_id: Uuid) -> Result<PaymentSession, ServiceError> {
        let invoice = self.load(invoice_id).await?;
        if invoice.status != InvoiceStatus::Approved {
            return Err(ServiceError::InvalidOperation(format!(
                "invoice {} is '{}'; payment opens only after approval",
                invoice.invoice_number, invoice.status
            )));
        }

        let advance = invoice.amounts.advance;
        let request = NewGatewayOrder {
            amount_minor: advance.minor(),
            currency: self.currency,
            receipt: invoice.invoice_number.clone(),
            notes: BTreeMap::from([
                ("invoice_id".to_string(), invoice.id.to_string()),
                ("customer_name".to_string(), invoice.customer.name.clone()),
                ("customer_email".to_string(), invoice.customer.email.clone()),
                ("customer_phone".to_string(), invoice.customer.phone.clone()),
                ("visit_time".to_string(), invoice.visit_time.to_rfc3339()),
            ]),
        };

        let order = with_timeout(self.gateway_timeout, "gateway order creation", async {
            self.gateway
                .create_order(&request)
                .await
                .map_err(ServiceError::from)
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to open gateway order");
            e
        })?;

        info!(gateway_order_id = %order.id, amount = %advance, "Payment session opened");

        Ok(PaymentSession {
            invoice_id: invoice.id,
            invoice_number: invoice.invoice_number,
            gateway_order_id: order.id,
            amount: advance,
            key_id: self.key_id.clone(),
            prefill: invoice.customer,
            description: format!("Advance payment for pre-order at {}", self.merchant_name),
        })
    }

    /// Confirms an approved invoice once the gateway signature checks out.
    ///
    /// The signature is checked before anything else; a mismatch touches no
    /// state. Replaying the same payment is answered from the stored invoice.
    #[instrument(skip(self, request), fields(invoice_id = %request.invoice_id, order_id = %request.order_id))]
    pub async fn verify_payment(
        &self,
        request: VerifyPayment,
    ) -> Result<VerificationOutcome, ServiceError> {
        if !self
            .verifier
            .verify(&request.order_id, &request.payment_id, &request.signature)
        {
            warn!(
                payment_id = %request.payment_id,
                "Rejected payment verification: signature mismatch"
            );
            return Err(ServiceError::Unauthorized(
                "invalid payment signature".to_string(),
            ));
        }

        let invoice = self.load(request.invoice_id).await?;
        if let Some(settled) = settled_outcome(&invoice, &request) {
            return settled;
        }

        self.check_gateway_order(&invoice, &request).await?;

        let change = StatusChange::new(InvoiceStatus::Approved, InvoiceStatus::Confirmed)?
            .with_payment_status(PaymentStatus::AdvancePaid)
            .with_gateway_ids(request.order_id.clone(), request.payment_id.clone());

        let changed = with_timeout(
            self.store_timeout,
            "payment confirmation",
            self.repo.transition(invoice.id, &change),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to confirm verified payment");
            e
        })?;

        if !changed {
            let current = self.load(invoice.id).await?;
            info!(current = %current.status, "Invoice changed during verification");
            return settled_outcome(&current, &request).unwrap_or_else(|| {
                Err(ServiceError::Conflict(format!(
                    "invoice {} changed while verifying payment",
                    current.invoice_number
                )))
            });
        }

        let mut invoice = invoice;
        invoice.apply(&change);
        info!(
            payment_id = %request.payment_id,
            advance = %invoice.amounts.advance,
            "Advance payment verified; invoice confirmed"
        );

        record_audit(
            self.repo.as_ref(),
            self.store_timeout,
            AuditEntry::new(
                invoice.id,
                "payment_verified",
                json!({
                    "gateway_order_id": request.order_id,
                    "gateway_payment_id": request.payment_id,
                    "advance": invoice.amounts.advance.to_decimal(),
                }),
            ),
        )
        .await;
        self.events
            .send_or_log(Event::PaymentVerified {
                invoice_id: invoice.id,
                gateway_order_id: request.order_id,
                gateway_payment_id: request.payment_id,
                advance: invoice.amounts.advance.label(),
            })
            .await;

        Ok(VerificationOutcome {
            invoice,
            already_verified: false,
        })
    }

    /// The signed order must be the one opened for this invoice's advance.
    async fn check_gateway_order(
        &self,
        invoice: &Invoice,
        request: &VerifyPayment,
    ) -> Result<(), ServiceError> {
        let order = with_timeout(self.gateway_timeout, "gateway order lookup", async {
            self.gateway
                .fetch_order(&request.order_id)
                .await
                .map_err(ServiceError::from)
        })
        .await?;

        // Invoice numbers can collide; the id note is what pins the order to one invoice.
        let invoice_id = invoice.id.to_string();
        let owner_matches = order.note("invoice_id") == Some(invoice_id.as_str());
        let receipt_matches = order.receipt.as_deref() == Some(invoice.invoice_number.as_str());
        let amount_matches = order.amount_minor == invoice.amounts.advance.minor()
            && order.currency == invoice.amounts.currency();
        if !owner_matches || !receipt_matches || !amount_matches {
            warn!(
                receipt = ?order.receipt,
                order_invoice_id = ?order.note("invoice_id"),
                amount = order.amount_minor,
                "Rejected payment verification: gateway order does not belong to invoice"
            );
            return Err(ServiceError::Unauthorized(
                "payment does not match this invoice".to_string(),
            ));
        }
        Ok(())
    }

    async fn load(&self, invoice_id: Uuid) -> Result<Invoice, ServiceError> {
        with_timeout(
            self.store_timeout,
            "invoice lookup",
            self.repo.find_by_id(invoice_id),
        )
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("invoice {}", invoice_id)))
    }
}

/// Decides verification without a write when the invoice is past `approved`
/// or not yet there. `None` means the invoice is approved and may be confirmed.
fn settled_outcome(
    invoice: &Invoice,
    request: &VerifyPayment,
) -> Option<Result<VerificationOutcome, ServiceError>> {
    match invoice.status {
        InvoiceStatus::Approved => None,
        InvoiceStatus::Confirmed | InvoiceStatus::Completed => {
            if invoice.gateway_payment_id.as_deref() == Some(request.payment_id.as_str()) {
                info!("Payment already verified; returning stored invoice");
                Some(Ok(VerificationOutcome {
                    invoice: invoice.clone(),
                    already_verified: true,
                }))
            } else {
                Some(Err(ServiceError::Conflict(format!(
                    "invoice {} is already paid by another payment",
                    invoice.invoice_number
                ))))
            }
        }
        status => Some(Err(ServiceError::InvalidOperation(format!(
            "invoice {} is '{}'; only approved invoices accept payment",
            invoice.invoice_number, status
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, GatewayOrder, MockPaymentGateway};
    use crate::repositories::MockInvoiceRepository;
    use crate::services::test_support::{event_channel, invoice_in, test_config};
    use assert_matches::assert_matches;

    fn signed(invoice: &Invoice, order_id: &str, payment_id: &str) -> VerifyPayment {
        let verifier = SignatureVerifier::new("gateway-secret").unwrap();
        VerifyPayment {
            invoice_id: invoice.id,
            order_id: order_id.into(),
            payment_id: payment_id.into(),
            signature: verifier.sign(order_id, payment_id),
        }
    }

    fn gateway_order(invoice: &Invoice, id: &str) -> GatewayOrder {
        GatewayOrder {
            id: id.into(),
            amount_minor: invoice.amounts.advance.minor(),
            currency: Currency::Inr,
            receipt: Some(invoice.invoice_number.clone()),
            status: "paid".into(),
            notes: BTreeMap::from([("invoice_id".to_string(), invoice.id.to_string())]),
        }
    }

    fn service(repo: MockInvoiceRepository, gateway: MockPaymentGateway) -> PaymentService {
        let (events, _rx) = event_channel();
        PaymentService::new(Arc::new(repo), Arc::new(gateway), events, &test_config()).unwrap()
    }

    #[tokio::test]
    async fn tampered_signature_touches_nothing() {
        let invoice = invoice_in(InvoiceStatus::Approved, PaymentStatus::Pending);
        let mut request = signed(&invoice, "order_1", "pay_1");
        request.payment_id = "pay_2".into();

        let mut repo = MockInvoiceRepository::new();
        repo.expect_find_by_id().never();
        repo.expect_transition().never();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_fetch_order().never();

        assert_matches!(
            service(repo, gateway).verify_payment(request).await,
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[tokio::test]
    async fn valid_signature_confirms_approved_invoice() {
        let invoice = invoice_in(InvoiceStatus::Approved, PaymentStatus::Pending);
        let request = signed(&invoice, "order_1", "pay_1");
        let order = gateway_order(&invoice, "order_1");

        let mut repo = MockInvoiceRepository::new();
        let stored = invoice.clone();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));
        repo.expect_transition()
            .withf(|_, change| {
                change.from == InvoiceStatus::Approved
                    && change.to == InvoiceStatus::Confirmed
                    && change.payment_status == Some(PaymentStatus::AdvancePaid)
                    && change.gateway_payment_id.as_deref() == Some("pay_1")
            })
            .times(1)
            .returning(|_, _| Ok(true));
        repo.expect_record_audit().returning(|_| Ok(()));
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_fetch_order()
            .returning(move |_| Ok(order.clone()));

        let outcome = service(repo, gateway).verify_payment(request).await.unwrap();
        assert!(!outcome.already_verified);
        assert_eq!(outcome.invoice.status, InvoiceStatus::Confirmed);
        assert_eq!(outcome.invoice.payment_status, PaymentStatus::AdvancePaid);
        assert_eq!(outcome.invoice.gateway_order_id.as_deref(), Some("order_1"));
    }

    #[tokio::test]
    async fn replayed_payment_is_idempotent() {
        let mut invoice = invoice_in(InvoiceStatus::Confirmed, PaymentStatus::AdvancePaid);
        invoice.gateway_order_id = Some("order_1".into());
        invoice.gateway_payment_id = Some("pay_1".into());
        let request = signed(&invoice, "order_1", "pay_1");

        let mut repo = MockInvoiceRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(invoice.clone())));
        repo.expect_transition().never();
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_fetch_order().never();

        let outcome = service(repo, gateway).verify_payment(request).await.unwrap();
        assert!(outcome.already_verified);
    }

    #[tokio::test]
    async fn second_payment_for_confirmed_invoice_conflicts() {
        let mut invoice = invoice_in(InvoiceStatus::Confirmed, PaymentStatus::AdvancePaid);
        invoice.gateway_payment_id = Some("pay_1".into());
        let request = signed(&invoice, "order_1", "pay_other");

        let mut repo = MockInvoiceRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(invoice.clone())));

        assert_matches!(
            service(repo, MockPaymentGateway::new())
                .verify_payment(request)
                .await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn pending_invoice_cannot_be_paid() {
        let invoice = invoice_in(InvoiceStatus::Pending, PaymentStatus::Pending);
        let request = signed(&invoice, "order_1", "pay_1");

        let mut repo = MockInvoiceRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(invoice.clone())));
        repo.expect_transition().never();

        assert_matches!(
            service(repo, MockPaymentGateway::new())
                .verify_payment(request)
                .await,
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[tokio::test]
    async fn order_for_another_invoice_is_rejected() {
        let invoice = invoice_in(InvoiceStatus::Approved, PaymentStatus::Pending);
        let request = signed(&invoice, "order_1", "pay_1");
        let mut order = gateway_order(&invoice, "order_1");
        order.receipt = Some("INV-20240501-999".into());

        let mut repo = MockInvoiceRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(invoice.clone())));
        repo.expect_transition().never();
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_fetch_order()
            .returning(move |_| Ok(order.clone()));

        assert_matches!(
            service(repo, gateway).verify_payment(request).await,
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[tokio::test]
    async fn order_opened_for_a_namesake_invoice_is_rejected() {
        // Same invoice number and advance, different invoice
        let paid_for = invoice_in(InvoiceStatus::Approved, PaymentStatus::Pending);
        let namesake = invoice_in(InvoiceStatus::Approved, PaymentStatus::Pending);
        assert_eq!(paid_for.invoice_number, namesake.invoice_number);
        let order = gateway_order(&paid_for, "order_1");
        let request = signed(&namesake, "order_1", "pay_1");

        let mut repo = MockInvoiceRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(namesake.clone())));
        repo.expect_transition().never();
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_fetch_order()
            .returning(move |_| Ok(order.clone()));

        assert_matches!(
            service(repo, gateway).verify_payment(request).await,
            Err(ServiceError::Unauthorized(_))
        );
    }

    #[tokio::test]
    async fn concurrent_confirmation_by_same_payment_is_idempotent() {
        let approved = invoice_in(InvoiceStatus::Approved, PaymentStatus::Pending);
        let request = signed(&approved, "order_1", "pay_1");
        let order = gateway_order(&approved, "order_1");
        let mut confirmed = approved.clone();
        confirmed.status = InvoiceStatus::Confirmed;
        confirmed.payment_status = PaymentStatus::AdvancePaid;
        confirmed.gateway_payment_id = Some("pay_1".into());

        let mut repo = MockInvoiceRepository::new();
        let mut seq = mockall::Sequence::new();
        repo.expect_find_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(approved.clone())));
        repo.expect_transition()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(false));
        repo.expect_find_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(confirmed.clone())));
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_fetch_order()
            .returning(move |_| Ok(order.clone()));

        let outcome = service(repo, gateway).verify_payment(request).await.unwrap();
        assert!(outcome.already_verified);
    }

    #[tokio::test]
    async fn payment_order_requires_approval() {
        let invoice = invoice_in(InvoiceStatus::Pending, PaymentStatus::Pending);
        let id = invoice.id;

        let mut repo = MockInvoiceRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(invoice.clone())));
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_order().never();

        assert_matches!(
            service(repo, gateway).create_payment_order(id).await,
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[tokio::test]
    async fn payment_order_asks_for_the_advance() {
        let invoice = invoice_in(InvoiceStatus::Approved, PaymentStatus::Pending);
        let id = invoice.id;
        let receipt = invoice.invoice_number.clone();

        let mut repo = MockInvoiceRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(invoice.clone())));
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_order()
            .withf(move |order| {
                order.amount_minor == 5_900
                    && order.receipt == receipt
                    && order.notes.get("invoice_id") == Some(&id.to_string())
            })
            .returning(|order| {
                Ok(GatewayOrder {
                    id: "order_new".into(),
                    amount_minor: order.amount_minor,
                    currency: order.currency,
                    receipt: Some(order.receipt.clone()),
                    status: "created".into(),
                    notes: order.notes.clone(),
                })
            });

        let session = service(repo, gateway).create_payment_order(id).await.unwrap();
        assert_eq!(session.gateway_order_id, "order_new");
        assert_eq!(session.amount.label(), "₹59");
        assert_eq!(session.key_id, "rzp_test_key");
        assert_eq!(session.prefill.email, "asha@example.com");
    }

    #[tokio::test]
    async fn unreachable_gateway_is_retryable() {
        let invoice = invoice_in(InvoiceStatus::Approved, PaymentStatus::Pending);
        let id = invoice.id;

        let mut repo = MockInvoiceRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(invoice.clone())));
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_order()
            .returning(|_| Err(GatewayError::Unreachable("connection refused".into())));

        let err = service(repo, gateway)
            .create_payment_order(id)
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ServiceUnavailable(_));
        assert!(err.is_retryable());
    }
}
