//! Cashfree payment gateway adapter.
//!
//! Charges are INR order sessions; webhooks are signed with
//! HMAC-SHA256 over `timestamp + raw_body`, base64-encoded, in the
//! `x-webhook-signature` header with the timestamp alongside in
//! `x-webhook-timestamp` (presented here as `timestamp.signature`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use pollstake_core::{format_rupees, PaymentStatus, ProviderKind};

use crate::sign;
use crate::{http_client, parse_json, ChargeRequest, CreatedCharge, GatewayError, PaymentProvider, WebhookEvent};

pub struct CashfreeProvider {
    base_url: String,
    app_id: String,
    secret_key: String,
}

impl CashfreeProvider {
    pub fn new(base_url: impl Into<String>, app_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            app_id: app_id.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn sandbox(app_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self::new("https://sandbox.cashfree.com", app_id, secret_key)
    }
}

/// Map Cashfree's payment status vocabulary into the normalized set.
pub fn normalize_status(native: &str) -> PaymentStatus {
    match native {
        "SUCCESS" => PaymentStatus::Success,
        "FAILED" | "CANCELLED" | "USER_DROPPED" | "VOID" => PaymentStatus::Failed,
        // NOT_ATTEMPTED, PENDING, and anything unrecognized stay pending.
        _ => PaymentStatus::Pending,
    }
}

#[derive(Deserialize)]
struct CreateOrderResponse {
    cf_order_id: serde_json::Value,
    payment_session_id: String,
}

#[derive(Deserialize)]
struct PaymentEntry {
    payment_status: Option<String>,
}

#[async_trait]
impl PaymentProvider for CashfreeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cashfree
    }

    async fn create_charge(&self, req: &ChargeRequest) -> Result<CreatedCharge, GatewayError> {
        if req.amount <= 0 {
            return Err(GatewayError::InvalidAmount(format!(
                "charge amount must be positive, got {} paise",
                req.amount
            )));
        }

        let body = json!({
            "order_id": req.order_id,
            "order_amount": format_rupees(req.amount),
            "order_currency": req.currency,
            "customer_details": {
                "customer_id": req.customer_email.replace(['@', '.'], "_"),
                "customer_email": req.customer_email,
                "customer_phone": req.customer_phone,
            },
            "order_meta": {
                "return_url": req.return_url,
                "notify_url": req.notify_url,
            },
        });

        let response = http_client()?
            .post(format!("{}/pg/orders", self.base_url))
            .header("x-client-id", &self.app_id)
            .header("x-client-secret", &self.secret_key)
            .header("x-api-version", "2023-08-01")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(order_id = %req.order_id, %status, "cashfree order creation rejected");
            return Err(GatewayError::ProviderUnavailable(format!(
                "cashfree returned {status}"
            )));
        }

        let created: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        info!(order_id = %req.order_id, cf_order_id = %created.cf_order_id, "cashfree order created");
        Ok(CreatedCharge {
            // Cashfree correlates by our own order id; the session id is
            // what the checkout page consumes.
            provider_ref: req.order_id.clone(),
            checkout_url: created.payment_session_id,
        })
    }

    async fn fetch_status(&self, provider_ref: &str) -> Result<PaymentStatus, GatewayError> {
        let response = http_client()?
            .get(format!("{}/pg/orders/{}/payments", self.base_url, provider_ref))
            .header("x-client-id", &self.app_id)
            .header("x-client-secret", &self.secret_key)
            .header("x-api-version", "2023-08-01")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ProviderUnavailable(format!(
                "cashfree returned {status}"
            )));
        }

        let payments: Vec<PaymentEntry> = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;

        let normalized = payments
            .first()
            .and_then(|p| p.payment_status.as_deref())
            .map(normalize_status)
            .unwrap_or(PaymentStatus::Pending);
        Ok(normalized)
    }

    fn verify_webhook_signature(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<(), GatewayError> {
        let header = signature_header.ok_or(GatewayError::MissingSignature)?;
        // Header format: "<timestamp>.<base64 signature>"; the MAC covers
        // timestamp + raw body.
        let (timestamp, sig) = header.split_once('.').ok_or(GatewayError::SignatureInvalid)?;
        let mut signed = Vec::with_capacity(timestamp.len() + raw_body.len());
        signed.extend_from_slice(timestamp.as_bytes());
        signed.extend_from_slice(raw_body);
        sign::verify_sha256_base64(self.secret_key.as_bytes(), &signed, sig)
    }

    fn webhook_event(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError> {
        let payload = parse_json(raw_body)?;
        let event_type = payload
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let data = payload.get("data").cloned().unwrap_or_default();
        let order_id = data
            .pointer("/order/order_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::MalformedPayload("missing data.order.order_id".into()))?;
        let native = data
            .pointer("/payment/payment_status")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        Ok(WebhookEvent {
            provider_ref: order_id.to_string(),
            status: normalize_status(native),
            event_type,
        })
    }

    fn signature_header(&self) -> &'static str {
        "x-webhook-signature"
    }
}
