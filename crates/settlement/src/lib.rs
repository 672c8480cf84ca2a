//! Pollstake Settlement
//!
//! The order manager and settlement engine. Orders are opened against
//! an external payment provider; a confirmed payment settles into a
//! vote through one idempotent procedure that the verification poll
//! and the webhook both converge on. Result declaration redistributes
//! the collected pool to winning votes.

pub mod engine;
pub mod orders;
pub mod views;


pub use engine::{ResultSummary, SettleOutcome, SettlementEngine, WebhookOutcome};
pub use orders::{OrderConfig, OrderManager};

use thiserror::Error;

use pollstake_gateway::GatewayError;
use pollstake_store::StoreError;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("result already declared for poll {0}")]
    AlreadyDeclared(String),
}
