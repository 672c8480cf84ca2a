//! Scripted in-process provider for tests and local development.
//!
//! Plays the same role the real adapters do but settles nothing:
//! created charges are recorded, statuses come from a script the test
//! sets up, and webhooks verify against a configured secret with the
//! HMAC-SHA256-hex scheme.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use pollstake_core::{new_id, PaymentStatus, ProviderKind};

use crate::sign;
use crate::{parse_json, ChargeRequest, CreatedCharge, GatewayError, PaymentProvider, WebhookEvent};

pub struct MockProvider {
    webhook_secret: String,
    statuses: Mutex<HashMap<String, PaymentStatus>>,
    created: Mutex<Vec<ChargeRequest>>,
    fail_charges: Mutex<bool>,
}

impl MockProvider {
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            statuses: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            fail_charges: Mutex::new(false),
        }
    }

    /// Script the status `fetch_status` reports for a provider ref.
    pub fn set_status(&self, provider_ref: impl Into<String>, status: PaymentStatus) {
        self.statuses.lock().unwrap().insert(provider_ref.into(), status);
    }

    /// Make subsequent `create_charge` calls fail as if the provider
    /// were down.
    pub fn fail_next_charges(&self, fail: bool) {
        *self.fail_charges.lock().unwrap() = fail;
    }

    /// Charge requests recorded so far, in creation order.
    pub fn created_charges(&self) -> Vec<ChargeRequest> {
        self.created.lock().unwrap().clone()
    }

    /// Build a signed webhook body+header pair for a provider ref, the
    /// way the real gateway would deliver it.
    pub fn signed_webhook(&self, provider_ref: &str, native_status: &str) -> (Vec<u8>, String) {
        let body = serde_json::json!({
            "provider_ref": provider_ref,
            "status": native_status,
        });
        let raw = serde_json::to_vec(&body).unwrap_or_default();
        let sig = sign::hmac_sha256_hex(self.webhook_secret.as_bytes(), &raw);
        (raw, sig)
    }
}

fn normalize_status(native: &str) -> PaymentStatus {
    match native {
        "success" => PaymentStatus::Success,
        "failed" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    async fn create_charge(&self, req: &ChargeRequest) -> Result<CreatedCharge, GatewayError> {
        if *self.fail_charges.lock().unwrap() {
            return Err(GatewayError::ProviderUnavailable("mock provider down".into()));
        }
        if req.amount <= 0 {
            return Err(GatewayError::InvalidAmount(format!(
                "charge amount must be positive, got {} paise",
                req.amount
            )));
        }
        let provider_ref = format!("mock_{}", new_id());
        self.created.lock().unwrap().push(req.clone());
        self.statuses
            .lock()
            .unwrap()
            .insert(provider_ref.clone(), PaymentStatus::Pending);
        Ok(CreatedCharge {
            checkout_url: format!("https://checkout.invalid/{provider_ref}"),
            provider_ref,
        })
    }

    async fn fetch_status(&self, provider_ref: &str) -> Result<PaymentStatus, GatewayError> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(provider_ref)
            .copied()
            .unwrap_or(PaymentStatus::Pending))
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
        let provider_ref = payload
            .get("provider_ref")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GatewayError::MalformedPayload("missing provider_ref".into()))?
            .to_string();
        let native = payload
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        Ok(WebhookEvent {
            provider_ref,
            status: normalize_status(&native),
            event_type: native,
        })
    }

    fn signature_header(&self) -> &'static str {
        "x-mock-signature"
    }
}
