use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted invoice row. Money columns are minor units in `currency`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub items: Json,
    pub currency: String,
    pub subtotal_minor: i64,
    pub advance_minor: i64,
    pub remaining_minor: i64,
    pub total_minor: i64,
    pub visit_time: DateTime<Utc>,
    pub status: String,
    pub payment_status: String,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub restaurant: Json,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::invoice_audit::Entity")]
    AuditEntries,
}

impl Related<super::invoice_audit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuditEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
