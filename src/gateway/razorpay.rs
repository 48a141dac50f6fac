use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{GatewayError, GatewayOrder, NewGatewayOrder, PaymentGateway};
use crate::config::PaymentGatewayConfig;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Orders API client authenticated with `key_id:key_secret`.
#[derive(Clone)]
pub struct RazorpayGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    pub fn new(config: &PaymentGatewayConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build payment gateway HTTP client")?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &PaymentGatewayConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_order(response: Response) -> Result<GatewayOrder, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => envelope
                    .error
                    .description
                    .or(envelope.error.code)
                    .unwrap_or_else(|| "no error description".to_string()),
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            };
            warn!(status = status.as_u16(), %message, "Payment gateway rejected request");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Unreachable(err.to_string())
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    #[instrument(skip(self, order), fields(receipt = %order.receipt, amount = order.amount_minor))]
    async fn create_order(&self, order: &NewGatewayOrder) -> Result<GatewayOrder, GatewayError> {
        let response = self
            .client
            .post(self.url("/v1/orders"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(order)
            .send()
            .await
            .map_err(transport_error)?;

        let created = Self::read_order(response).await?;
        debug!(gateway_order_id = %created.id, "Gateway order created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn fetch_order(&self, order_id: &str) -> Result<GatewayOrder, GatewayError> {
        let response = self
            .client
            .get(self.url(&format!("/v1/orders/{}", order_id)))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(transport_error)?;

        Self::read_order(response).await
    }
}
