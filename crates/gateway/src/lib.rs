//! Pollstake Gateway
//!
//! The payment provider capability interface and its adapters. Every
//! gateway maps its native status vocabulary into the normalized
//! 3-value set and verifies webhook signatures with its documented
//! HMAC scheme; the settlement engine consumes all of them through the
//! single [`PaymentProvider`] trait, selected by configuration.

pub mod cashfree;
pub mod coinbase;
pub mod mock;
pub mod nowpayments;
pub mod sign;

pub use cashfree::CashfreeProvider;
pub use coinbase::CoinbaseProvider;
pub use mock::MockProvider;
pub use nowpayments::NowPaymentsProvider;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use pollstake_core::{PaymentStatus, ProviderKind};

/// Default timeout for provider HTTP calls. On timeout the order stays
/// pending and is retried by polling; nothing is committed.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("invalid charge amount: {0}")]
    InvalidAmount(String),
    #[error("webhook signature header missing")]
    MissingSignature,
    #[error("webhook signature invalid")]
    SignatureInvalid,
    #[error("malformed provider payload: {0}")]
    MalformedPayload(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        // Network failures and 5xx responses are recoverable; the caller
        // retries via polling. Provider internals are logged, not leaked.
        GatewayError::ProviderUnavailable(e.to_string())
    }
}

/// A request to open an external charge for an order.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Our order id, carried as provider metadata for correlation.
    pub order_id: String,
    /// Total amount in paise (base + gateway charge).
    pub amount: i64,
    pub currency: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub return_url: String,
    pub notify_url: String,
}

/// A successfully created external charge.
#[derive(Debug, Clone)]
pub struct CreatedCharge {
    /// Provider-side correlation id (charge code, payment id, ...).
    pub provider_ref: String,
    /// URL the user is redirected to for payment.
    pub checkout_url: String,
}

/// A payment event extracted from a verified webhook payload.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    /// Correlates back to `Order::provider_ref`.
    pub provider_ref: String,
    pub status: PaymentStatus,
    /// Native event name, echoed in the webhook response.
    pub event_type: String,
}

/// Uniform contract every payment gateway adapter implements.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Open an external charge. Fails with `ProviderUnavailable` on
    /// network/5xx errors and `InvalidAmount` below the provider
    /// minimum; nothing is persisted by the adapter itself.
    async fn create_charge(&self, req: &ChargeRequest) -> Result<CreatedCharge, GatewayError>;

    /// Fetch the normalized status of a charge. Unmapped native states
    /// report `Pending`, never `Success`.
    async fn fetch_status(&self, provider_ref: &str) -> Result<PaymentStatus, GatewayError>;

    /// Verify a webhook signature over the raw body. Fails closed: a
    /// missing header is rejected before the payload is inspected.
    fn verify_webhook_signature(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<(), GatewayError>;

    /// Parse a (signature-verified) webhook body into a normalized event.
    fn webhook_event(&self, raw_body: &[u8]) -> Result<WebhookEvent, GatewayError>;

    /// Name of the HTTP header carrying this provider's signature.
    fn signature_header(&self) -> &'static str;
}

fn parse_json(raw: &[u8]) -> Result<serde_json::Value, GatewayError> {
    serde_json::from_slice(raw).map_err(|e| GatewayError::MalformedPayload(e.to_string()))
}

fn http_client() -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .build()
        .map_err(|e| GatewayError::ProviderUnavailable(e.to_string()))
}
