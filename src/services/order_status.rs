use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{Display, EnumString};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{record_audit, with_timeout};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Invoice, InvoiceStatus, PaymentStatus, StatusChange};
use crate::repositories::{AuditEntry, InvoiceRepository};

/// What an admin can do with an invoice from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdminDecision {
    Approve,
    Reject,
    /// Customer visited and settled the remaining half
    Complete,
}

impl AdminDecision {
    fn status_change(&self) -> Result<StatusChange, ServiceError> {
        match self {
            AdminDecision::Approve => {
                StatusChange::new(InvoiceStatus::Pending, InvoiceStatus::Approved)
            }
            AdminDecision::Reject => {
                StatusChange::new(InvoiceStatus::Pending, InvoiceStatus::Cancelled)
            }
            AdminDecision::Complete => {
                StatusChange::new(InvoiceStatus::Confirmed, InvoiceStatus::Completed)
                    .map(|change| change.with_payment_status(PaymentStatus::FullyPaid))
            }
        }
    }

    fn event(&self, invoice_id: Uuid) -> Event {
        match self {
            AdminDecision::Approve => Event::OrderApproved(invoice_id),
            AdminDecision::Reject => Event::OrderRejected(invoice_id),
            AdminDecision::Complete => Event::OrderCompleted(invoice_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    pub invoice: Invoice,
    /// False when the invoice was no longer in the expected status
    pub changed: bool,
}

/// Admin approval gate. Every transition is a conditional update.
#[derive(Clone)]
pub struct OrderStatusService {
    repo: Arc<dyn InvoiceRepository>,
    events: EventSender,
    store_timeout: Duration,
}

impl OrderStatusService {
    pub fn new(repo: Arc<dyn InvoiceRepository>, events: EventSender, config: &AppConfig) -> Self {
        Self {
            repo,
            events,
            store_timeout: config.store_timeout(),
        }
    }

    /// Applies `decision` if the invoice is still in the expected prior status;
    /// otherwise returns the invoice untouched with `changed = false`.
    #[instrument(skip(self), fields(invoice_id = %invoice_id, decision = %decision))]
    pub async fn decide(
        &self,
        invoice_id: Uuid,
        decision: AdminDecision,
    ) -> Result<DecisionOutcome, ServiceError> {
        let mut invoice = self.load(invoice_id).await?;
        let change = decision.status_change()?;

        if invoice.status != change.from {
            info!(
                current = %invoice.status,
                expected = %change.from,
                "Invoice not in expected status; decision ignored"
            );
            return Ok(DecisionOutcome {
                invoice,
                changed: false,
            });
        }

        let changed = with_timeout(
            self.store_timeout,
            "status transition",
            self.repo.transition(invoice_id, &change),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to apply admin decision");
            e
        })?;

        if !changed {
            // another admin got there first
            let current = self.load(invoice_id).await?;
            info!(current = %current.status, "Lost race on admin decision");
            return Ok(DecisionOutcome {
                invoice: current,
                changed: false,
            });
        }

        invoice.apply(&change);
        info!(status = %invoice.status, "Admin decision applied");

        record_audit(
            self.repo.as_ref(),
            self.store_timeout,
            AuditEntry::new(
                invoice_id,
                decision.to_string(),
                json!({ "from": change.from, "to": change.to }),
            ),
        )
        .await;
        self.events.send_or_log(decision.event(invoice_id)).await;

        Ok(DecisionOutcome {
            invoice,
            changed: true,
        })
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
