use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use super::{BaseRepository, Repository};
use crate::entities::invoice::{ActiveModel, Column, Entity as InvoiceEntity, Model};
use crate::entities::invoice_audit;
use crate::errors::ServiceError;
use crate::models::{
    AmountBreakdown, Currency, CustomerSnapshot, Invoice, InvoiceStatus, LineItem, Money,
    PaymentStatus, RestaurantDetails, StatusChange,
};

/// Secondary record of something that happened to an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub invoice_id: Uuid,
    pub action: String,
    pub detail: JsonValue,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(invoice_id: Uuid, action: impl Into<String>, detail: JsonValue) -> Self {
        Self {
            invoice_id,
            action: action.into(),
            detail,
            at: Utc::now(),
        }
    }
}

/// Invoice store. Reads are plain lookups; status changes are conditional updates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn insert(&self, invoice: &Invoice) -> Result<(), ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>, ServiceError>;

    /// Invoices for a customer email, newest first.
    async fn list_by_customer(&self, email: &str) -> Result<Vec<Invoice>, ServiceError>;

    /// All invoices, optionally filtered by status, newest first.
    async fn list(&self, status: Option<InvoiceStatus>) -> Result<Vec<Invoice>, ServiceError>;

    /// Applies `change` only while the invoice is still in `change.from`.
    /// Returns whether a row was updated.
    async fn transition(&self, id: Uuid, change: &StatusChange) -> Result<bool, ServiceError>;

    async fn record_audit(&self, entry: AuditEntry) -> Result<(), ServiceError>;
}

/// sea-orm backed [`InvoiceRepository`]
#[derive(Debug, Clone)]
pub struct SeaOrmInvoiceRepository {
    base: BaseRepository,
}

impl SeaOrmInvoiceRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    fn to_domain_list(models: Vec<Model>) -> Result<Vec<Invoice>, ServiceError> {
        models.into_iter().map(to_domain).collect()
    }
}

#[async_trait]
impl InvoiceRepository for SeaOrmInvoiceRepository {
    async fn insert(&self, invoice: &Invoice) -> Result<(), ServiceError> {
        to_active_model(invoice)?
            .insert(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>, ServiceError> {
        InvoiceEntity::find_by_id(id)
            .one(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)?
            .map(to_domain)
            .transpose()
    }

    async fn list_by_customer(&self, email: &str) -> Result<Vec<Invoice>, ServiceError> {
        let models = InvoiceEntity::find()
            .filter(Column::CustomerEmail.eq(email))
            .order_by_desc(Column::CreatedAt)
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)?;
        Self::to_domain_list(models)
    }

    async fn list(&self, status: Option<InvoiceStatus>) -> Result<Vec<Invoice>, ServiceError> {
        let mut query = InvoiceEntity::find();
        if let Some(status) = status {
            query = query.filter(Column::Status.eq(status.to_string()));
        }
        let models = query
            .order_by_desc(Column::CreatedAt)
            .all(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)?;
        Self::to_domain_list(models)
    }

    async fn transition(&self, id: Uuid, change: &StatusChange) -> Result<bool, ServiceError> {
        let mut update = InvoiceEntity::update_many()
            .col_expr(Column::Status, Expr::value(change.to.to_string()))
            .col_expr(Column::UpdatedAt, Expr::value(change.at));

        if let Some(payment_status) = change.payment_status {
            update = update.col_expr(Column::PaymentStatus, Expr::value(payment_status.to_string()));
        }
        if let Some(order_id) = &change.gateway_order_id {
            update = update.col_expr(Column::GatewayOrderId, Expr::value(order_id.clone()));
        }
        if let Some(payment_id) = &change.gateway_payment_id {
            update = update.col_expr(Column::GatewayPaymentId, Expr::value(payment_id.clone()));
        }

        let result = update
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(change.from.to_string()))
            .exec(self.base.get_db())
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(result.rows_affected == 1)
    }

    async fn record_audit(&self, entry: AuditEntry) -> Result<(), ServiceError> {
        invoice_audit::ActiveModel {
            id: Set(Uuid::new_v4()),
            invoice_id: Set(entry.invoice_id),
            action: Set(entry.action),
            detail: Set(entry.detail),
            created_at: Set(entry.at),
        }
        .insert(self.base.get_db())
        .await
        .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }
}

/// Domain invoice to a row. Money is written as minor units.
pub fn to_active_model(invoice: &Invoice) -> Result<ActiveModel, ServiceError> {
    Ok(ActiveModel {
        id: Set(invoice.id),
        invoice_number: Set(invoice.invoice_number.clone()),
        customer_name: Set(invoice.customer.name.clone()),
        customer_email: Set(invoice.customer.email.clone()),
        customer_phone: Set(invoice.customer.phone.clone()),
        items: Set(serde_json::to_value(&invoice.items)?),
        currency: Set(invoice.amounts.currency().to_string()),
        subtotal_minor: Set(invoice.amounts.subtotal.minor()),
        advance_minor: Set(invoice.amounts.advance.minor()),
        remaining_minor: Set(invoice.amounts.remaining.minor()),
        total_minor: Set(invoice.amounts.total.minor()),
        visit_time: Set(invoice.visit_time),
        status: Set(invoice.status.to_string()),
        payment_status: Set(invoice.payment_status.to_string()),
        gateway_order_id: Set(invoice.gateway_order_id.clone()),
        gateway_payment_id: Set(invoice.gateway_payment_id.clone()),
        restaurant: Set(serde_json::to_value(&invoice.restaurant)?),
        created_at: Set(invoice.created_at),
        updated_at: Set(invoice.updated_at),
    })
}

/// Row back to a domain invoice. A row that does not decode is an internal error.
pub fn to_domain(model: Model) -> Result<Invoice, ServiceError> {
    let corrupt = |what: &str, detail: String| {
        ServiceError::InternalError(format!("invoice {} has invalid {}: {}", model.id, what, detail))
    };

    let currency =
        Currency::from_str(&model.currency).map_err(|e| corrupt("currency", e.to_string()))?;
    let money = |minor: i64| {
        Money::from_minor(minor, currency).map_err(|e| corrupt("amount", e.to_string()))
    };
    let amounts = AmountBreakdown {
        subtotal: money(model.subtotal_minor)?,
        advance: money(model.advance_minor)?,
        remaining: money(model.remaining_minor)?,
        total: money(model.total_minor)?,
    };

    let status =
        InvoiceStatus::from_str(&model.status).map_err(|e| corrupt("status", e.to_string()))?;
    let payment_status = PaymentStatus::from_str(&model.payment_status)
        .map_err(|e| corrupt("payment status", e.to_string()))?;
    let items: Vec<LineItem> = serde_json::from_value(model.items.clone())
        .map_err(|e| corrupt("items", e.to_string()))?;
    let restaurant: RestaurantDetails = serde_json::from_value(model.restaurant.clone())
        .map_err(|e| corrupt("restaurant", e.to_string()))?;

    Ok(Invoice {
        id: model.id,
        invoice_number: model.invoice_number,
        customer: CustomerSnapshot {
            name: model.customer_name,
            email: model.customer_email,
            phone: model.customer_phone,
        },
        items,
        amounts,
        visit_time: model.visit_time,
        status,
        payment_status,
        gateway_order_id: model.gateway_order_id,
        gateway_payment_id: model.gateway_payment_id,
        restaurant,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}
