//! Environment configuration for the service binary.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use pollstake_core::{ProviderKind, Role};
use pollstake_gateway::{
    CashfreeProvider, CoinbaseProvider, MockProvider, NowPaymentsProvider, PaymentProvider,
};
use pollstake_settlement::OrderConfig;

use crate::auth::StaticTokenAuth;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub ledger_path: PathBuf,
    pub provider_kind: ProviderKind,
    pub return_url: String,
    pub notify_url: String,
    pub admin_user_id: String,
    pub admin_token: Option<String>,
    /// Extra `token=user_id` pairs, comma separated.
    pub user_tokens: Vec<(String, String)>,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider_kind = var_or("PAYMENT_PROVIDER", "mock")
            .parse::<ProviderKind>()
            .map_err(ConfigError::Invalid)?;
        let user_tokens = env::var("API_TOKENS")
            .unwrap_or_default()
            .split(',')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                pair.split_once('=')
                    .map(|(token, user)| (token.to_string(), user.to_string()))
                    .ok_or_else(|| {
                        ConfigError::Invalid(format!("API_TOKENS entry {pair:?} is not token=user"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
            ledger_path: PathBuf::from(var_or("LEDGER_PATH", "data/ledger.json")),
            provider_kind,
            return_url: var_or("RETURN_URL", "http://localhost:3000/payment/return"),
            notify_url: var_or("NOTIFY_URL", "http://localhost:8080/api/payments/webhook"),
            admin_user_id: var_or("ADMIN_USER_ID", "admin"),
            admin_token: env::var("ADMIN_TOKEN").ok(),
            user_tokens,
        })
    }

    /// Instantiate the configured payment provider. Each adapter pulls
    /// its own credentials from the environment so unused providers
    /// need no configuration.
    pub fn provider(&self) -> Result<Arc<dyn PaymentProvider>, ConfigError> {
        Ok(match self.provider_kind {
            ProviderKind::Cashfree => {
                let app_id = require("CASHFREE_APP_ID")?;
                let secret = require("CASHFREE_SECRET_KEY")?;
                match env::var("CASHFREE_BASE_URL") {
                    Ok(base) => Arc::new(CashfreeProvider::new(base, app_id, secret)),
                    Err(_) => Arc::new(CashfreeProvider::sandbox(app_id, secret)),
                }
            }
            ProviderKind::Coinbase => {
                let inr_per_usd: f64 = var_or("INR_PER_USD", "83.0")
                    .parse()
                    .map_err(|_| ConfigError::Invalid("INR_PER_USD must be a number".into()))?;
                Arc::new(CoinbaseProvider::new(
                    require("COINBASE_API_KEY")?,
                    require("COINBASE_WEBHOOK_SECRET")?,
                    inr_per_usd,
                ))
            }
            ProviderKind::Nowpayments => Arc::new(NowPaymentsProvider::new(
                require("NOWPAYMENTS_API_KEY")?,
                require("NOWPAYMENTS_IPN_SECRET")?,
            )),
            ProviderKind::Mock => {
                Arc::new(MockProvider::new(var_or("MOCK_WEBHOOK_SECRET", "mock_secret")))
            }
        })
    }

    pub fn auth(&self) -> StaticTokenAuth {
        let mut auth = StaticTokenAuth::new();
        if let Some(token) = &self.admin_token {
            auth = auth.with_token(token.clone(), self.admin_user_id.clone(), Role::Admin);
        }
        for (token, user_id) in &self.user_tokens {
            auth = auth.with_token(token.clone(), user_id.clone(), Role::User);
        }
        auth
    }

    pub fn order_config(&self) -> OrderConfig {
        OrderConfig {
            return_url: self.return_url.clone(),
            notify_url: self.notify_url.clone(),
            currency: "INR".into(),
        }
    }
}
