//! Payment gateway seam.
//!
//! The gateway opens an order for the advance amount and later vouches for a
//! payment through an HMAC signature over `order_id|payment_id`.

pub mod razorpay;
pub mod signature;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::errors::ServiceError;
use crate::models::Currency;

pub use razorpay::RazorpayGateway;
pub use signature::SignatureVerifier;

/// Order to open at the gateway. `amount_minor` is in paise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGatewayOrder {
    #[serde(rename = "amount")]
    pub amount_minor: i64,
    pub currency: Currency,
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
}

/// An order as the gateway reports it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    #[serde(rename = "amount")]
    pub amount_minor: i64,
    pub currency: Currency,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "notes_map")]
    pub notes: BTreeMap<String, String>,
}

impl GatewayOrder {
    pub fn note(&self, key: &str) -> Option<&str> {
        self.notes.get(key).map(String::as_str)
    }
}

// Razorpay sends `"notes": []` when an order carries no notes.
fn notes_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let notes = match Value::deserialize(deserializer)? {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| match value {
                Value::String(text) => (key, text),
                other => (key, other.to_string()),
            })
            .collect(),
        _ => BTreeMap::new(),
    };
    Ok(notes)
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway unreachable: {0}")]
    Unreachable(String),

    #[error("payment gateway timed out")]
    Timeout,

    #[error("payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected payment gateway response: {0}")]
    InvalidResponse(String),
}

impl From<GatewayError> for ServiceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unreachable(_) => ServiceError::ServiceUnavailable(err.to_string()),
            GatewayError::Timeout => ServiceError::Timeout(err.to_string()),
            GatewayError::Rejected { .. } | GatewayError::InvalidResponse(_) => {
                ServiceError::ExternalServiceError(err.to_string())
            }
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, order: &NewGatewayOrder) -> Result<GatewayOrder, GatewayError>;

    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, GatewayError>;
}
