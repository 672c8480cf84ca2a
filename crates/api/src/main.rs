use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pollstake_api::{router, ApiConfig, AppState};
use pollstake_core::{now_ts, KycStatus, Role, User};
use pollstake_store::LedgerStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        error!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ApiConfig::from_env()?;
    let store = Arc::new(LedgerStore::load_or_default(&config.ledger_path)?);
    ensure_admin(&store, &config.admin_user_id).await?;

    let provider = config.provider()?;
    info!(provider = %provider.kind(), "payment provider configured");
    let auth = Arc::new(config.auth());
    let state = AppState::new(store, provider, auth, config.order_config());

    // Sweep any orders a crash left half settled before serving.
    let repaired = state.engine.reconcile().await?;
    if repaired > 0 {
        info!(repaired, "recovered partially settled orders");
    }

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shut down cleanly");
    Ok(())
}

/// The admin token must resolve to a real ledger user.
async fn ensure_admin(
    store: &LedgerStore,
    admin_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let admin_id = admin_id.to_string();
    store
        .write(move |s| {
            if s.users.contains_key(&admin_id) {
                return Ok(());
            }
            s.users.insert(
                admin_id.clone(),
                User {
                    id: admin_id.clone(),
                    email: format!("{admin_id}@localhost"),
                    name: admin_id.clone(),
                    phone: String::new(),
                    role: Role::Admin,
                    cash_wallet: 0,
                    kyc_status: KycStatus::NotSubmitted,
                    upi_id: None,
                    created_at: now_ts(),
                },
            );
            Ok::<_, pollstake_store::StoreError>(())
        })
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("failed to install ctrl-c handler");
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("failed to install sigterm handler: {e}"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received sigterm"),
    }
}
