use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::{record_audit, with_timeout};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    generate_invoice_number, AmountBreakdown, Cart, Currency, CustomerSnapshot, Invoice,
    InvoiceStatus, MenuCatalog, PaymentStatus, RestaurantDetails, VisitOffset,
};
use crate::repositories::{AuditEntry, InvoiceRepository};

/// A cart handed over for admin approval.
#[derive(Debug, Clone)]
pub struct NewOrderRequest {
    pub customer: CustomerSnapshot,
    pub cart: Cart,
    pub visit_offset: VisitOffset,
}

/// Turns carts into `pending` invoices.
#[derive(Clone)]
pub struct OrderRequestService {
    repo: Arc<dyn InvoiceRepository>,
    menu: Arc<MenuCatalog>,
    events: EventSender,
    restaurant: RestaurantDetails,
    currency: Currency,
    enforce_menu_prices: bool,
    store_timeout: Duration,
}

impl OrderRequestService {
    pub fn new(
        repo: Arc<dyn InvoiceRepository>,
        menu: Arc<MenuCatalog>,
        events: EventSender,
        config: &AppConfig,
    ) -> Self {
        Self {
            repo,
            menu,
            events,
            restaurant: config.restaurant.details(),
            currency: config.payment.currency,
            enforce_menu_prices: config.enforce_menu_prices,
            store_timeout: config.store_timeout(),
        }
    }

    /// Persists a new invoice in (`pending`, `pending`). Exactly one insert on success.
    #[instrument(skip(self, request), fields(customer = %request.customer.email, lines = request.cart.lines().len()))]
    pub async fn submit(&self, request: NewOrderRequest) -> Result<Invoice, ServiceError> {
        if request.cart.is_empty() {
            return Err(ServiceError::ValidationError(
                "cart is empty; add at least one item".to_string(),
            ));
        }
        let customer = validate_customer(request.customer)?;

        if self.enforce_menu_prices {
            for line in request.cart.lines() {
                self.menu.check_line(line)?;
            }
        }

        let items = request.cart.into_line_items();
        let amounts = AmountBreakdown::from_items(&items, self.currency)?;

        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: generate_invoice_number(now),
            customer,
            items,
            amounts,
            visit_time: request.visit_offset.visit_time(now),
            status: InvoiceStatus::Pending,
            payment_status: PaymentStatus::Pending,
            gateway_order_id: None,
            gateway_payment_id: None,
            restaurant: self.restaurant.clone(),
            created_at: now,
            updated_at: now,
        };

        with_timeout(self.store_timeout, "invoice insert", self.repo.insert(&invoice))
            .await
            .map_err(|e| {
                error!(invoice_id = %invoice.id, error = %e, "Failed to persist order request");
                e
            })?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.amounts.total,
            "Order request submitted"
        );

        record_audit(
            self.repo.as_ref(),
            self.store_timeout,
            AuditEntry::new(
                invoice.id,
                "submitted",
                json!({
                    "invoice_number": invoice.invoice_number,
                    "total": invoice.amounts.total.to_decimal(),
                    "visit_offset_minutes": request.visit_offset.minutes(),
                }),
            ),
        )
        .await;

        self.events
            .send_or_log(Event::OrderRequested {
                invoice_id: invoice.id,
                invoice_number: invoice.invoice_number.clone(),
                customer_name: invoice.customer.name.clone(),
                item_count: invoice.item_count(),
                total: invoice.amounts.total.label(),
                visit_time: invoice.visit_time,
            })
            .await;

        Ok(invoice)
    }
}

fn validate_customer(customer: CustomerSnapshot) -> Result<CustomerSnapshot, ServiceError> {
    let customer = CustomerSnapshot {
        name: customer.name.trim().to_string(),
        email: customer.email.trim().to_string(),
        phone: customer.phone.trim().to_string(),
    };

    let mut missing = Vec::new();
    if customer.name.is_empty() {
        missing.push("name");
    }
    if customer.email.is_empty() {
        missing.push("email");
    }
    if customer.phone.is_empty() {
        missing.push("phone");
    }
    if !missing.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "customer {} required",
            missing.join(", ")
        )));
    }
    if !validator::validate_email(customer.email.as_str()) {
        return Err(ServiceError::ValidationError(format!(
            "'{}' is not a valid email address",
            customer.email
        )));
    }
    Ok(customer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineItem, Money};
    use crate::repositories::MockInvoiceRepository;
    use crate::services::test_support::{event_channel, test_config, veg_rolls};
    use assert_matches::assert_matches;

    fn menu() -> Arc<MenuCatalog> {
        Arc::new(MenuCatalog::embedded(Currency::Inr).unwrap())
    }

    fn request(cart: Cart) -> NewOrderRequest {
        NewOrderRequest {
            customer: CustomerSnapshot {
                name: " Asha ".into(),
                email: "asha@example.com".into(),
                phone: "+91 9000000000".into(),
            },
            cart,
            visit_offset: VisitOffset::try_from(30).unwrap(),
        }
    }

    #[tokio::test]
    async fn submit_persists_pending_invoice_and_notifies() {
        let mut repo = MockInvoiceRepository::new();
        repo.expect_insert()
            .withf(|invoice| {
                invoice.status == InvoiceStatus::Pending
                    && invoice.payment_status == PaymentStatus::Pending
                    && invoice.amounts.subtotal.minor() == 11_800
            })
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_record_audit().times(1).returning(|_| Ok(()));

        let (events, mut rx) = event_channel();
        let service = OrderRequestService::new(Arc::new(repo), menu(), events, &test_config());

        let invoice = service
            .submit(request(veg_rolls().into_iter().collect()))
            .await
            .unwrap();

        assert_eq!(invoice.customer.name, "Asha");
        assert_eq!(invoice.amounts.advance.label(), "₹59");
        assert_eq!(invoice.amounts.remaining.label(), "₹59");
        assert_eq!(
            invoice.visit_time - invoice.created_at,
            chrono::Duration::minutes(30)
        );
        assert!(invoice.invoice_number.starts_with("INV-"));
        assert_matches!(
            rx.recv().await,
            Some(Event::OrderRequested { item_count: 2, ref total, .. }) if total == "₹118"
        );
    }

    #[tokio::test]
    async fn empty_cart_never_reaches_the_store() {
        let mut repo = MockInvoiceRepository::new();
        repo.expect_insert().never();

        let (events, _rx) = event_channel();
        let service = OrderRequestService::new(Arc::new(repo), menu(), events, &test_config());

        assert_matches!(
            service.submit(request(Cart::new())).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn invalid_customer_is_rejected_before_insert() {
        let mut repo = MockInvoiceRepository::new();
        repo.expect_insert().never();

        let (events, _rx) = event_channel();
        let service = OrderRequestService::new(Arc::new(repo), menu(), events, &test_config());

        let mut bad_email = request(veg_rolls().into_iter().collect());
        bad_email.customer.email = "not-an-email".into();
        assert_matches!(
            service.submit(bad_email).await,
            Err(ServiceError::ValidationError(msg)) if msg.contains("email")
        );

        let mut no_phone = request(veg_rolls().into_iter().collect());
        no_phone.customer.phone = "   ".into();
        assert_matches!(
            service.submit(no_phone).await,
            Err(ServiceError::ValidationError(msg)) if msg.contains("phone")
        );
    }

    #[tokio::test]
    async fn price_that_disagrees_with_menu_is_rejected() {
        let mut repo = MockInvoiceRepository::new();
        repo.expect_insert().never();

        let (events, _rx) = event_channel();
        let service = OrderRequestService::new(Arc::new(repo), menu(), events, &test_config());

        let cheap = Money::parse_label("₹1", Currency::Inr).unwrap();
        let cart: Cart = [LineItem::new("Veg Roll", cheap, 1, "Rolls").unwrap()]
            .into_iter()
            .collect();
        assert_matches!(
            service.submit(request(cart)).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn store_failure_surfaces_and_skips_notification() {
        let mut repo = MockInvoiceRepository::new();
        repo.expect_insert()
            .returning(|_| Err(ServiceError::DatabaseError(sea_orm::DbErr::Custom("down".into()))));
        repo.expect_record_audit().never();

        let (events, mut rx) = event_channel();
        let service = OrderRequestService::new(Arc::new(repo), menu(), events, &test_config());

        let result = service.submit(request(veg_rolls().into_iter().collect())).await;
        assert_matches!(result, Err(ServiceError::DatabaseError(_)));
        drop(service);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn audit_failure_does_not_fail_submission() {
        let mut repo = MockInvoiceRepository::new();
        repo.expect_insert().returning(|_| Ok(()));
        repo.expect_record_audit()
            .returning(|_| Err(ServiceError::DatabaseError(sea_orm::DbErr::Custom("audit".into()))));

        let (events, _rx) = event_channel();
        let service = OrderRequestService::new(Arc::new(repo), menu(), events, &test_config());

        assert!(service
            .submit(request(veg_rolls().into_iter().collect()))
            .await
            .is_ok());
    }
}
