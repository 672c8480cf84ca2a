//! Pollstake Wallet
//!
//! Cash wallet views and the withdrawal flow. A withdrawal debits the
//! full requested amount up front; the platform charge comes out of
//! the payout, and a rejection refunds the original amount.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use pollstake_core::{
    fee_bps, new_id, now_ts, KycStatus, Transaction, WithdrawalRequest, WithdrawalStatus,
};
use pollstake_store::{LedgerStore, StoreError};

#[derive(Debug, Error)]
pub enum WalletError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// A user's balance with their withdrawal and ledger history.
#[derive(Debug, Clone, Serialize)]
pub struct WalletSummary {
    pub balance: i64,
    pub withdrawals: Vec<WithdrawalRequest>,
    pub transactions: Vec<Transaction>,
}

pub struct WalletManager {
    store: Arc<LedgerStore>,
}

impl WalletManager {
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// Open a withdrawal request, debiting the full amount atomically.
    ///
    /// Requires approved KYC and a UPI id on file. The charge is a
    /// flooring basis-point fee on the amount; `net_amount` is what
    /// gets paid out. Validation failures leave the balance untouched.
    pub async fn request_withdrawal(
        &self,
        user_id: &str,
        amount: i64,
    ) -> Result<WithdrawalRequest, WalletError> {
        if amount <= 0 {
            return Err(WalletError::InvalidAmount(
                "withdrawal amount must be positive".into(),
            ));
        }
        let user_id = user_id.to_string();
        let request = self
            .store
            .write(move |s| {
                let settings = s.settings_or_default();
                let user = s.user(&user_id)?;
                if user.kyc_status != KycStatus::Approved {
                    return Err(WalletError::Forbidden(
                        "KYC approval required before withdrawal".into(),
                    ));
                }
                let Some(upi_id) = user.upi_id.clone() else {
                    return Err(WalletError::InvalidState(
                        "no UPI id on file for payout".into(),
                    ));
                };
                if amount > user.cash_wallet {
                    return Err(WalletError::InvalidAmount(format!(
                        "requested {} exceeds balance {}",
                        amount, user.cash_wallet
                    )));
                }

                let charge = fee_bps(amount, settings.withdrawal_charge_bps);
                s.debit_wallet_if_sufficient(&user_id, amount)?;
                let request = WithdrawalRequest {
                    id: new_id(),
                    user_id,
                    amount,
                    withdrawal_charge: charge,
                    net_amount: amount - charge,
                    upi_id,
                    status: WithdrawalStatus::Pending,
                    requested_at: now_ts(),
                    reviewed_at: None,
                };
                s.withdrawals.insert(request.id.clone(), request.clone());
                Ok(request)
            })
            .await?;

        info!(
            withdrawal_id = %request.id,
            amount = request.amount,
            net_amount = request.net_amount,
            "withdrawal requested"
        );
        Ok(request)
    }

    /// Complete or reject a pending withdrawal.
    ///
    /// Rejection refunds the original requested amount, not the net
    /// payout, atomically with the status change.
    pub async fn review_withdrawal(
        &self,
        withdrawal_id: &str,
        decision: WithdrawalStatus,
    ) -> Result<WithdrawalRequest, WalletError> {
        if decision == WithdrawalStatus::Pending {
            return Err(WalletError::InvalidState(
                "review decision must be completed or rejected".into(),
            ));
        }
        let withdrawal_id = withdrawal_id.to_string();
        let request = self
            .store
            .write(move |s| {
                let request = s.withdrawal(&withdrawal_id)?.clone();
                if request.status != WithdrawalStatus::Pending {
                    return Err(WalletError::InvalidState(format!(
                        "withdrawal {withdrawal_id} already reviewed"
                    )));
                }
                if decision == WithdrawalStatus::Rejected {
                    s.credit_wallet(&request.user_id, request.amount)?;
                }
                let request = s.withdrawal_mut(&withdrawal_id)?;
                request.status = decision;
                request.reviewed_at = Some(now_ts());
                Ok(request.clone())
            })
            .await?;

        info!(withdrawal_id = %request.id, decision = ?request.status, "withdrawal reviewed");
        Ok(request)
    }

    /// Balance plus withdrawal and transaction history, newest first.
    pub async fn wallet_summary(&self, user_id: &str) -> Result<WalletSummary, WalletError> {
        self.store
            .read(|s| {
                let user = s.user(user_id)?;
                let mut withdrawals: Vec<WithdrawalRequest> = s
                    .withdrawals
                    .values()
                    .filter(|w| w.user_id == user_id)
                    .cloned()
                    .collect();
                withdrawals.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
                Ok(WalletSummary {
                    balance: user.cash_wallet,
                    withdrawals,
                    transactions: s.transactions_for(user_id),
                })
            })
            .await
    }

    /// All withdrawal requests, pending first then newest first.
    pub async fn list_withdrawals(&self) -> Vec<WithdrawalRequest> {
        self.store
            .read(|s| {
                let mut all: Vec<WithdrawalRequest> = s.withdrawals.values().cloned().collect();
                all.sort_by(|a, b| {
                    let pending = |w: &WithdrawalRequest| w.status != WithdrawalStatus::Pending;
                    pending(a)
                        .cmp(&pending(b))
                        .then(b.requested_at.cmp(&a.requested_at))
                });
                all
            })
            .await
    }
}
