//! NOWPayments adapter.
//!
//! Crypto settlement quoted from INR; the IPN callback is signed with
//! HMAC-SHA512 over the payload re-serialized with sorted keys, hex in
//! `x-nowpayments-sig`.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use pollstake_core::{PaymentStatus, ProviderKind};

use crate::sign;
use crate::{http_client, parse_json, ChargeRequest, CreatedCharge, GatewayError, PaymentProvider, WebhookEvent};

/// Minimum fiat charge NOWPayments accepts, in paise (Rs 250.00).
pub const MIN_CHARGE_PAISE: i64 = 25_000;

pub struct NowPaymentsProvider {
    base_url: String,
    api_key: String,
    ipn_secret: String,
}

impl NowPaymentsProvider {
    pub fn new(api_key: impl Into<String>, ipn_secret: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.nowpayments.io/v1".into(),
            api_key: api_key.into(),
            ipn_secret: ipn_secret.into(),
        }
    }
}

/// Map NOWPayments' payment status vocabulary into the normalized set.
pub fn normalize_status(native: &str) -> PaymentStatus {
    match native {
        "finished" | "confirmed" => PaymentStatus::Success,
        "failed" | "refunded" | "expired" => PaymentStatus::Failed,
        // waiting, confirming, sending, partially_paid, and unknown
        // states stay pending.
        _ => PaymentStatus::Pending,
    }
}

#[async_trait]
impl PaymentProvider for NowPaymentsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Nowpayments
    }

    async fn create_charge(&self, req: &ChargeRequest) -> Result<CreatedCharge, GatewayError> {
        if req.amount <= 0 {
            return Err(GatewayError::InvalidAmount(format!(
                "charge amount must be positive, got {} paise",
                req.amount
            )));
        }
        // Raise small orders to the provider floor rather than failing;
        // the difference is absorbed by the gateway charge the user
        // already accepted at checkout.
        let charged = req.amount.max(MIN_CHARGE_PAISE);

        let body = json!({
            "price_amount": charged as f64 / 100.0,
            "price_currency": req.currency.to_lowercase(),
            "order_id": req.order_id,
            "order_description": format!("Poll vote order {}", req.order_id),
            "ipn_callback_url": req.notify_url,
            "success_url": req.return_url,
        });

        let response = http_client()?
            .post(format!("{}/invoice", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(order_id = %req.order_id, %status, "nowpayments invoice creation rejected");
            return Err(GatewayError::ProviderUnavailable(format!(
                "nowpayments returned {status}"
            )));
        }

        let payload = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        let invoice_id = payload
            .get("id")
            .map(|v| v.to_string().trim_matches('"').to_string())
            .ok_or_else(|| GatewayError::MalformedPayload("missing invoice id".into()))?;
        let invoice_url = payload
            .get("invoice_url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::MalformedPayload("missing invoice_url".into()))?;

        info!(order_id = %req.order_id, invoice_id = %invoice_id, "nowpayments invoice created");
        Ok(CreatedCharge {
            provider_ref: invoice_id,
            checkout_url: invoice_url.to_string(),
        })
    }

    async fn fetch_status(&self, provider_ref: &str) -> Result<PaymentStatus, GatewayError> {
        let response = http_client()?
            .get(format!("{}/payment/{}", self.base_url, provider_ref))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::ProviderUnavailable(format!(
                "nowpayments returned {status}"
            )));
        }

        let payload = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| GatewayError::MalformedPayload(e.to_string()))?;
        let native = payload
            .get("payment_status")
            .and_then(|v| v.as_str())
            .unwrap_or("waiting");
        Ok(normalize_status(native))
    }

    fn verify_webhook_signature(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<(), GatewayError> {
        let sig = signature_header.ok_or(GatewayError::MissingSignature)?;
        // The IPN signature covers the key-sorted re-serialization, not
        // the raw bytes.
        let canonical = sign::canonical_sorted_json(raw_body)?;
        sign::verify_sha512_hex(self.ipn_secret.as_bytes(), canonical.as_bytes(), sig)
    }

    fn webhook_event(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError> {
        let payload = parse_json(raw_body)?;
        let invoice_id = payload
            .get("invoice_id")
            .or_else(|| payload.get("payment_id"))
            .map(|v| v.to_string().trim_matches('"').to_string())
            .ok_or_else(|| GatewayError::MalformedPayload("missing invoice_id".into()))?;
        let native = payload
            .get("payment_status")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        Ok(WebhookEvent {
            provider_ref: invoice_id,
            status: normalize_status(&native),
            event_type: native,
        })
    }

    fn signature_header(&self) -> &'static str {
        "x-nowpayments-sig"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_status_mapping() {
        assert_eq!(normalize_status("finished"), PaymentStatus::Success);
        assert_eq!(normalize_status("confirmed"), PaymentStatus::Success);
        assert_eq!(normalize_status("failed"), PaymentStatus::Failed);
        assert_eq!(normalize_status("refunded"), PaymentStatus::Failed);
        assert_eq!(normalize_status("waiting"), PaymentStatus::Pending);
        assert_eq!(normalize_status("partially_paid"), PaymentStatus::Pending);
        assert_eq!(normalize_status("brand_new_state"), PaymentStatus::Pending);
    }

    #[test]
    fn test_ipn_signature_over_sorted_payload() {
        let p = NowPaymentsProvider::new("key", "ipn_secret");
        // Keys deliberately out of order; the signature is over the
        // sorted form, so both orderings verify with the same MAC.
        let unsorted = br#"{"payment_status":"finished","invoice_id":42}"#;
        let canonical = sign::canonical_sorted_json(unsorted).unwrap();
        let sig = sign::hmac_sha512_hex(b"ipn_secret", canonical.as_bytes());

        assert!(p.verify_webhook_signature(unsorted, Some(&sig)).is_ok());
        let reordered = br#"{"invoice_id":42,"payment_status":"finished"}"#;
        assert!(p.verify_webhook_signature(reordered, Some(&sig)).is_ok());
        assert!(matches!(
            p.verify_webhook_signature(unsorted, None).unwrap_err(),
            GatewayError::MissingSignature
        ));
    }

    #[test]
    fn test_webhook_event_parses_ids() {
        let p = NowPaymentsProvider::new("key", "secret");
        let body = br#"{"invoice_id":42,"payment_status":"finished"}"#;
        let event = p.webhook_event(body).unwrap();
        assert_eq!(event.provider_ref, "42");
        assert_eq!(event.status, PaymentStatus::Success);
        assert_eq!(event.event_type, "finished");
    }
}
