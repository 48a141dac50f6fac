use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::errors::ServiceError;
use crate::repositories::{AuditEntry, InvoiceRepository};

// Customer intake
pub mod order_requests;

// Admin gate
pub mod order_status;

// Advance payment
pub mod payments;

// Read-side projections
pub mod invoices;

pub use invoices::{DashboardView, InvoiceQueryService, InvoiceView, StatusCounts};
pub use order_requests::{NewOrderRequest, OrderRequestService};
pub use order_status::{AdminDecision, DecisionOutcome, OrderStatusService};
pub use payments::{PaymentService, PaymentSession, VerificationOutcome, VerifyPayment};

/// Bounds a collaborator call; an elapsed deadline becomes [`ServiceError::Timeout`].
pub(crate) async fn with_timeout<T, F>(
    limit: Duration,
    operation: &str,
    future: F,
) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, ServiceError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(ServiceError::Timeout(format!(
            "{} did not complete within {}ms",
            operation,
            limit.as_millis()
        ))),
    }
}

/// Audit rows are secondary: a failed write is logged and the caller carries on.
pub(crate) async fn record_audit(repo: &dyn InvoiceRepository, limit: Duration, entry: AuditEntry) {
    let invoice_id = entry.invoice_id;
    let action = entry.action.clone();
    if let Err(e) = with_timeout(limit, "audit write", repo.record_audit(entry)).await {
        warn!(%invoice_id, %action, error = %e, "Failed to record audit entry");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use crate::config::{AppConfig, RestaurantConfig};
    use crate::events::{Event, EventSender};
    use crate::models::{
        AmountBreakdown, Currency, CustomerSnapshot, Invoice, InvoiceStatus, LineItem, Money,
        PaymentStatus,
    };

    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            0,
            "test".into(),
        );
        config.payment.key_id = "rzp_test_key".into();
        config.payment.key_secret = "gateway-secret".into();
        config.store_timeout_secs = 1;
        config.gateway_timeout_secs = 1;
        config
    }

    pub fn event_channel() -> (EventSender, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(16);
        (EventSender::new(tx), rx)
    }

    pub fn veg_rolls() -> Vec<LineItem> {
        let price = Money::parse_label("₹59", Currency::Inr).unwrap();
        vec![LineItem::new("Veg Roll", price, 2, "Rolls")
            .unwrap()
            .with_size(Some("Regular".into()))]
    }

    pub fn invoice_in(status: InvoiceStatus, payment_status: PaymentStatus) -> Invoice {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let items = veg_rolls();
        Invoice {
            id: Uuid::new_v4(),
            invoice_number: "INV-20240501-042".into(),
            customer: CustomerSnapshot {
                name: "Asha".into(),
                email: "asha@example.com".into(),
                phone: "+91 9000000000".into(),
            },
            amounts: AmountBreakdown::from_items(&items, Currency::Inr).unwrap(),
            items,
            visit_time: at + ChronoDuration::minutes(30),
            status,
            payment_status,
            gateway_order_id: None,
            gateway_payment_id: None,
            restaurant: RestaurantConfig::default().details(),
            created_at: at,
            updated_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn slow_collaborator_becomes_timeout() {
        let result: Result<(), ServiceError> = with_timeout(
            Duration::from_millis(10),
            "invoice lookup",
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            },
        )
        .await;
        assert_matches!(result, Err(ServiceError::Timeout(msg)) if msg.contains("invoice lookup"));
    }

    #[tokio::test]
    async fn inner_errors_pass_through() {
        let result: Result<(), ServiceError> = with_timeout(Duration::from_secs(1), "insert", async {
            Err(ServiceError::NotFound("x".into()))
        })
        .await;
        assert_matches!(result, Err(ServiceError::NotFound(_)));
    }
}
