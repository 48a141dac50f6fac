use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::with_timeout;
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::{
    Currency, CustomerSnapshot, FoodType, Invoice, InvoiceStatus, LineItem, Money, PaymentStatus,
    RestaurantDetails,
};
use crate::repositories::InvoiceRepository;

/// An amount as a fixed-scale decimal plus its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MoneyView {
    #[schema(value_type = String, example = "118.00")]
    pub amount: Decimal,
    #[schema(example = "₹118")]
    pub label: String,
}

impl From<Money> for MoneyView {
    fn from(money: Money) -> Self {
        Self {
            amount: money.to_decimal(),
            label: money.label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LineItemView {
    pub name: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_type: Option<FoodType>,
    pub quantity: u32,
    pub unit_price: MoneyView,
    pub line_total: MoneyView,
}

impl TryFrom<&LineItem> for LineItemView {
    type Error = ServiceError;

    fn try_from(line: &LineItem) -> Result<Self, Self::Error> {
        Ok(Self {
            name: line.name.clone(),
            category: line.category.clone(),
            selected_size: line.selected_size.clone(),
            food_type: line.food_type,
            quantity: line.quantity,
            unit_price: line.unit_price.into(),
            line_total: line.line_total()?.into(),
        })
    }
}

/// Display projection of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct InvoiceView {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer: CustomerSnapshot,
    pub items: Vec<LineItemView>,
    pub item_count: u32,
    pub currency: Currency,
    pub subtotal: MoneyView,
    /// Half of the total, collected online after approval
    pub advance: MoneyView,
    /// Settled at the restaurant
    pub remaining: MoneyView,
    pub total: MoneyView,
    pub visit_time: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_payment_id: Option<String>,
    pub restaurant: RestaurantDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&Invoice> for InvoiceView {
    type Error = ServiceError;

    fn try_from(invoice: &Invoice) -> Result<Self, Self::Error> {
        let items = invoice
            .items
            .iter()
            .map(LineItemView::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: invoice.id,
            invoice_number: invoice.invoice_number.clone(),
            customer: invoice.customer.clone(),
            items,
            item_count: invoice.item_count(),
            currency: invoice.amounts.currency(),
            subtotal: invoice.amounts.subtotal.into(),
            advance: invoice.amounts.advance.into(),
            remaining: invoice.amounts.remaining.into(),
            total: invoice.amounts.total.into(),
            visit_time: invoice.visit_time,
            status: invoice.status,
            payment_status: invoice.payment_status,
            gateway_order_id: invoice.gateway_order_id.clone(),
            gateway_payment_id: invoice.gateway_payment_id.clone(),
            restaurant: invoice.restaurant.clone(),
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub pending: usize,
    pub approved: usize,
    pub confirmed: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub total: usize,
}

impl StatusCounts {
    fn tally<'a>(invoices: impl IntoIterator<Item = &'a Invoice>) -> Self {
        let mut counts = Self::default();
        for invoice in invoices {
            match invoice.status {
                InvoiceStatus::Pending => counts.pending += 1,
                InvoiceStatus::Approved => counts.approved += 1,
                InvoiceStatus::Confirmed => counts.confirmed += 1,
                InvoiceStatus::Completed => counts.completed += 1,
                InvoiceStatus::Cancelled => counts.cancelled += 1,
            }
            counts.total += 1;
        }
        counts
    }
}

/// Admin dashboard: filtered rows plus counts across every status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DashboardView {
    pub invoices: Vec<InvoiceView>,
    pub counts: StatusCounts,
}

/// Read side. Store failures degrade to empty results instead of errors.
#[derive(Clone)]
pub struct InvoiceQueryService {
    repo: Arc<dyn InvoiceRepository>,
    store_timeout: Duration,
}

impl InvoiceQueryService {
    pub fn new(repo: Arc<dyn InvoiceRepository>, config: &AppConfig) -> Self {
        Self {
            repo,
            store_timeout: config.store_timeout(),
        }
    }

    /// Invoices for `email`, newest first. Empty on any store failure.
    #[instrument(skip(self))]
    pub async fn list_for_customer(&self, email: &str) -> Vec<InvoiceView> {
        let email = email.trim();
        if email.is_empty() {
            return Vec::new();
        }
        match with_timeout(
            self.store_timeout,
            "customer invoice listing",
            self.repo.list_by_customer(email),
        )
        .await
        {
            Ok(invoices) => project(&invoices),
            Err(e) => {
                error!(error = %e, "Failed to list customer invoices; returning none");
                Vec::new()
            }
        }
    }

    /// A single invoice; a store failure reads as absent.
    #[instrument(skip(self), fields(invoice_id = %id))]
    pub async fn get(&self, id: Uuid) -> Option<InvoiceView> {
        match with_timeout(self.store_timeout, "invoice lookup", self.repo.find_by_id(id)).await {
            Ok(Some(invoice)) => InvoiceView::try_from(&invoice)
                .map_err(|e| warn!(error = %e, "Invoice could not be projected"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                error!(error = %e, "Failed to load invoice; treating as absent");
                None
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self, status: Option<InvoiceStatus>) -> DashboardView {
        let all = match with_timeout(self.store_timeout, "invoice listing", self.repo.list(None))
            .await
        {
            Ok(invoices) => invoices,
            Err(e) => {
                error!(error = %e, "Failed to load dashboard invoices; returning none");
                Vec::new()
            }
        };

        let counts = StatusCounts::tally(&all);
        let rows: Vec<Invoice> = match status {
            Some(status) => all.into_iter().filter(|i| i.status == status).collect(),
            None => all,
        };

        DashboardView {
            invoices: project(&rows),
            counts,
        }
    }
}

fn project(invoices: &[Invoice]) -> Vec<InvoiceView> {
    invoices
        .iter()
        .filter_map(|invoice| match InvoiceView::try_from(invoice) {
            Ok(view) => Some(view),
            Err(e) => {
                warn!(invoice_id = %invoice.id, error = %e, "Skipping invoice that cannot be projected");
                None
            }
        })
        .collect()
}
