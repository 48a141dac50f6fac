use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::{Currency, Money, MoneyError};
use crate::errors::ServiceError;

/// Fulfillment state of an invoice.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Approved,
    Confirmed,
    Completed,
    Cancelled,
}

impl InvoiceStatus {
    /// Transition table for the admin-gated lifecycle.
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        use InvoiceStatus::*;
        matches!(
            (self, next),
            (Pending, Approved) | (Pending, Cancelled) | (Approved, Confirmed) | (Confirmed, Completed)
        )
    }
}

/// Money-collection state, orthogonal to [`InvoiceStatus`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    AdvancePaid,
    FullyPaid,
    Refunded,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
pub enum FoodType {
    #[serde(rename = "Veg")]
    #[strum(serialize = "Veg")]
    Veg,
    #[serde(rename = "Non-Veg")]
    #[strum(serialize = "Non-Veg")]
    NonVeg,
}

/// One cart line frozen into an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_type: Option<FoodType>,
}

impl LineItem {
    pub fn new(
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
        category: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "item name must not be empty".to_string(),
            ));
        }
        if quantity == 0 {
            return Err(ServiceError::ValidationError(format!(
                "quantity for '{}' must be at least 1",
                name
            )));
        }
        Ok(Self {
            name,
            unit_price,
            quantity,
            category: category.into(),
            selected_size: None,
            food_type: None,
        })
    }

    pub fn with_size(mut self, size: Option<String>) -> Self {
        self.selected_size = size.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn with_food_type(mut self, food_type: Option<FoodType>) -> Self {
        self.food_type = food_type;
        self
    }

    pub fn line_total(&self) -> Result<Money, MoneyError> {
        self.unit_price.checked_mul(self.quantity)
    }

    /// Lines describing the same menu choice are merged in a cart.
    pub fn same_choice(&self, other: &LineItem) -> bool {
        self.name == other.name
            && self.unit_price == other.unit_price
            && self.category == other.category
            && self.selected_size == other.selected_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CustomerSnapshot {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RestaurantDetails {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
}

/// Subtotal with its advance/remaining split; `total == subtotal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountBreakdown {
    pub subtotal: Money,
    pub advance: Money,
    pub remaining: Money,
    pub total: Money,
}

impl AmountBreakdown {
    pub fn from_subtotal(subtotal: Money) -> Self {
        let (advance, remaining) = subtotal.split_advance();
        Self {
            subtotal,
            advance,
            remaining,
            total: subtotal,
        }
    }

    pub fn from_items(items: &[LineItem], currency: Currency) -> Result<Self, MoneyError> {
        let subtotal = items.iter().try_fold(Money::zero(currency), |acc, item| {
            acc.checked_add(item.line_total()?)
        })?;
        Ok(Self::from_subtotal(subtotal))
    }

    pub fn currency(&self) -> Currency {
        self.total.currency()
    }
}

/// Allowed visit offsets, in minutes from submission.
pub const VISIT_OFFSETS_MINUTES: [u32; 7] = [10, 15, 30, 45, 60, 90, 120];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitOffset(u32);

impl VisitOffset {
    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn visit_time(&self, submitted_at: DateTime<Utc>) -> DateTime<Utc> {
        submitted_at + Duration::minutes(i64::from(self.0))
    }
}

impl TryFrom<u32> for VisitOffset {
    type Error = ServiceError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        if VISIT_OFFSETS_MINUTES.contains(&minutes) {
            Ok(VisitOffset(minutes))
        } else {
            Err(ServiceError::ValidationError(format!(
                "visit offset {} is not one of {:?} minutes",
                minutes, VISIT_OFFSETS_MINUTES
            )))
        }
    }
}

/// `INV-YYYYMMDD-RRR`; collisions are tolerated.
pub fn generate_invoice_number(at: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!("INV-{}-{:03}", at.format("%Y%m%d"), suffix)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer: CustomerSnapshot,
    pub items: Vec<LineItem>,
    pub amounts: AmountBreakdown,
    pub visit_time: DateTime<Utc>,
    pub status: InvoiceStatus,
    pub payment_status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub restaurant: RestaurantDetails,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Applies a change already persisted by the store.
    pub fn apply(&mut self, change: &StatusChange) {
        self.status = change.to;
        if let Some(payment_status) = change.payment_status {
            self.payment_status = payment_status;
        }
        if change.gateway_order_id.is_some() {
            self.gateway_order_id = change.gateway_order_id.clone();
        }
        if change.gateway_payment_id.is_some() {
            self.gateway_payment_id = change.gateway_payment_id.clone();
        }
        self.updated_at = change.at;
    }
}

/// Conditional update: applied only while the invoice is still in `from`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub from: InvoiceStatus,
    pub to: InvoiceStatus,
    pub payment_status: Option<PaymentStatus>,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusChange {
    pub fn new(from: InvoiceStatus, to: InvoiceStatus) -> Result<Self, ServiceError> {
        if !from.can_transition_to(to) {
            return Err(ServiceError::InvalidOperation(format!(
                "cannot move invoice from '{}' to '{}'",
                from, to
            )));
        }
        Ok(Self {
            from,
            to,
            payment_status: None,
            gateway_order_id: None,
            gateway_payment_id: None,
            at: Utc::now(),
        })
    }

    pub fn with_payment_status(mut self, payment_status: PaymentStatus) -> Self {
        self.payment_status = Some(payment_status);
        self
    }

    pub fn with_gateway_ids(mut self, order_id: String, payment_id: String) -> Self {
        self.gateway_order_id = Some(order_id);
        self.gateway_payment_id = Some(payment_id);
        self
    }
}
