//! Coinbase Commerce adapter.
//!
//! Charges settle in crypto but are quoted in USD, converted from the
//! INR order total at a fixed configured rate and floored at $3.00.
//! Webhooks are signed with HMAC-SHA256 over the raw body, hex-encoded
//! in `X-CC-Webhook-Signature`.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use pollstake_core::{PaymentStatus, ProviderKind};

use crate::sign;
use crate::{http_client, parse_json, ChargeRequest, CreatedCharge, GatewayError, PaymentProvider, WebhookEvent};

/// Minimum charge Coinbase Commerce will open, in USD cents.
pub const MIN_CHARGE_USD_CENTS: i64 = 300;

pub struct CoinbaseProvider {
    base_url: String,
    api_key: String,
    webhook_secret: String,
    /// Fixed INR-per-USD conversion rate, e.g. 83.0.
    inr_per_usd: f64,
}

impl CoinbaseProvider {
    pub fn new(
        api_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        inr_per_usd: f64,
    ) -> Self {
        Self {
            base_url: "https://api.commerce.coinbase.com".into(),
            api_key: api_key.into(),
            webhook_secret: webhook_secret.into(),
            inr_per_usd,
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Convert paise to USD cents at the fixed rate, raising the result
    /// to the provider's $3 floor. Non-positive input is invalid.
    pub fn usd_cents_for(&self, paise: i64) -> Result<i64, GatewayError> {
        if paise <= 0 {
            return Err(GatewayError::InvalidAmount(format!(
                "charge amount must be positive, got {paise} paise"
            )));
        }
        let cents = (paise as f64 / self.inr_per_usd).round() as i64;
        Ok(cents.max(MIN_CHARGE_USD_CENTS))
    }
}

/// Map a Coinbase charge timeline status into the normalized set.
pub fn normalize_status(native: &str) -> PaymentStatus {
    match native {
        "COMPLETED" | "RESOLVED" => PaymentStatus::Success,
        "EXPIRED" | "CANCELED" => PaymentStatus::Failed,
        // NEW, PENDING, UNRESOLVED, and anything unrecognized stay pending.
        _ => PaymentStatus::Pending,
    }
}

/// Map a webhook event type into the normalized set.
pub fn normalize_event(event_type: &str) -> PaymentStatus {
    match event_type {
        "charge:confirmed" | "charge:resolved" => PaymentStatus::Success,
        "charge:failed" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

#[async_trait]
impl PaymentProvider for CoinbaseProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Coinbase
    }

    async fn create_charge(&self, req: &ChargeRequest) -> Result<CreatedCharge, GatewayError> {
        let usd_cents = self.usd_cents_for(req.amount)?;
        let body = json!({
            "name": "Poll vote purchase",
            "description": format!("Order {}", req.order_id),
            "pricing_type": "fixed_price",
            "local_price": {
                "amount": format!("{}.{:02}", usd_cents / 100, usd_cents % 100),
                "currency": "USD",
            },
            "metadata": { "order_id": req.order_id },
            "redirect_url": req.return_url,
        });

        let response = http_client()?
            .post(format!("{}/charges", self.base_url))
            .header("X-CC-Api-Key", &self.api_key)
            .header("X-CC-Version", "2018-03-22")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(order_id = %req.order_id, %status, "coinbase charge creation rejected");
            return Err(GatewayError::ProviderUnavailable(format!(
                "coinbase returned {status}"
            )));
        }

        let payload = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        let code = payload
            .pointer("/data/code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::MalformedPayload("missing data.code".into()))?;
        let hosted_url = payload
            .pointer("/data/hosted_url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::MalformedPayload("missing data.hosted_url".into()))?;

        info!(order_id = %req.order_id, charge_code = %code, usd_cents, "coinbase charge created");
        Ok(CreatedCharge {
            provider_ref: code.to_string(),
            checkout_url: hosted_url.to_string(),
        })
    }

    async fn fetch_status(&self, provider_ref: &str) -> Result<PaymentStatus, GatewayError> {
        let response = http_client()?
            .get(format!("{}/charges/{}", self.base_url, provider_ref))
            .header("X-CC-Api-Key", &self.api_key)
            .header("X-CC-Version", "2018-03-22")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ProviderUnavailable(format!(
                "coinbase returned {status}"
            )));
        }

        let payload = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        // The last timeline entry carries the current charge status.
        let native = payload
            .pointer("/data/timeline")
            .and_then(|v| v.as_array())
            .and_then(|t| t.last())
            .and_then(|e| e.get("status"))
            .and_then(|v| v.as_str())
            .unwrap_or("NEW");
        Ok(normalize_status(native))
    }

    fn verify_webhook_signature(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<(), GatewayError> {
        let sig = signature_header.ok_or(GatewayError::MissingSignature)?;
        sign::verify_sha256_hex(self.webhook_secret.as_bytes(), raw_body, sig)
    }

    fn webhook_event(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError> {
        let payload = parse_json(raw_body)?;
        let event_type = payload
            .pointer("/event/type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::MalformedPayload("missing event.type".into()))?
            .to_string();
        let code = payload
            .pointer("/event/data/code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::MalformedPayload("missing event.data.code".into()))?;
        Ok(WebhookEvent {
            provider_ref: code.to_string(),
            status: normalize_event(&event_type),
            event_type,
        })
    }

    fn signature_header(&self) -> &'static str {
        "x-cc-webhook-signature"
    }
}
