//! Pollstake API
//!
//! The axum HTTP surface: public poll reads, the payment flow
//! (create-order, verify, webhook), wallet and withdrawal endpoints,
//! and the admin plane (poll CRUD, result declaration, KYC review,
//! settings, ledger views).

pub mod admin;
pub mod auth;
pub mod config;
pub mod error;
pub mod payments;
pub mod polls;
pub mod wallet;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use pollstake_gateway::PaymentProvider;
use pollstake_settlement::{OrderManager, SettlementEngine};
use pollstake_store::LedgerStore;
use pollstake_wallet::WalletManager;

pub use auth::{AuthProvider, AuthUser, StaticTokenAuth};
pub use config::ApiConfig;
pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LedgerStore>,
    pub provider: Arc<dyn PaymentProvider>,
    pub auth: Arc<dyn AuthProvider>,
    pub orders: Arc<OrderManager>,
    pub engine: Arc<SettlementEngine>,
    pub wallet: Arc<WalletManager>,
}

impl AppState {
    pub fn new(
        store: Arc<LedgerStore>,
        provider: Arc<dyn PaymentProvider>,
        auth: Arc<dyn AuthProvider>,
        order_config: pollstake_settlement::OrderConfig,
    ) -> Self {
        Self {
            orders: Arc::new(OrderManager::new(
                store.clone(),
                provider.clone(),
                order_config,
            )),
            engine: Arc::new(SettlementEngine::new(store.clone(), provider.clone())),
            wallet: Arc::new(WalletManager::new(store.clone())),
            store,
            provider,
            auth,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/polls", get(polls::list_polls))
        .route("/api/polls/:id", get(polls::get_poll))
        .route("/api/my-polls", get(polls::my_polls))
        .route("/api/payments/create-order", post(payments::create_order))
        .route("/api/payments/verify", post(payments::verify))
        .route("/api/payments/webhook", post(payments::webhook))
        .route("/api/wallet", get(wallet::wallet_summary))
        .route("/api/withdrawal/request", post(wallet::request_withdrawal))
        .route("/api/kyc/submit", post(admin::submit_kyc))
        .route("/api/settings/public", get(admin::public_settings))
        .route("/api/admin/polls", post(admin::create_poll))
        .route(
            "/api/admin/polls/:id",
            put(admin::update_poll).delete(admin::delete_poll),
        )
        .route("/api/admin/polls/:id/set-result", post(admin::set_result))
        .route("/api/admin/polls/:id/result-stats", get(admin::result_stats))
        .route("/api/admin/kyc/:user_id/approve", post(admin::approve_kyc))
        .route("/api/admin/kyc/:user_id/reject", post(admin::reject_kyc))
        .route("/api/admin/withdrawals", get(wallet::list_withdrawals))
        .route("/api/admin/withdrawals/:id", put(wallet::review_withdrawal))
        .route("/api/admin/settings", put(admin::update_settings))
        .route("/api/admin/transactions", get(admin::transactions))
        .route("/api/admin/dashboard-stats", get(admin::dashboard_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
