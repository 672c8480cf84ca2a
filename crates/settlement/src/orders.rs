//! Order creation against the active payment provider.

use std::sync::Arc;

use tracing::{info, warn};

use pollstake_core::{fee_bps, new_id, now_ts, Order, PaymentStatus, PollStatus};
use pollstake_gateway::{ChargeRequest, PaymentProvider};
use pollstake_store::LedgerStore;

use crate::SettlementError;

/// Deployment-level knobs for outbound charges.
#[derive(Debug, Clone)]
pub struct OrderConfig {
    /// Where the gateway redirects the user after checkout.
    pub return_url: String,
    /// Webhook endpoint the gateway calls back on.
    pub notify_url: String,
    pub currency: String,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            return_url: "http://localhost:3000/payment/return".into(),
            notify_url: "http://localhost:8080/api/payments/webhook".into(),
            currency: "INR".into(),
        }
    }
}

/// Cap on votes per order. Request bodies carry `num_votes` verbatim,
/// so amounts are computed with checked arithmetic and anything past
/// this bound is rejected before quoting.
pub const MAX_VOTES_PER_ORDER: u64 = 100_000;

pub struct OrderManager {
    store: Arc<LedgerStore>,
    provider: Arc<dyn PaymentProvider>,
    config: OrderConfig,
}

impl OrderManager {
    pub fn new(
        store: Arc<LedgerStore>,
        provider: Arc<dyn PaymentProvider>,
        config: OrderConfig,
    ) -> Self {
        Self { store, provider, config }
    }

    /// Open a payment order for `num_votes` votes on a poll option.
    ///
    /// Amounts come from the current settings: the gateway charge is a
    /// flooring basis-point fee on `vote_price * num_votes`. The order
    /// is persisted as `Pending`, with its provider correlation ids,
    /// only after the external charge call succeeds; a provider failure
    /// leaves no trace in the ledger.
    pub async fn create_order(
        &self,
        user_id: &str,
        poll_id: &str,
        option_index: usize,
        num_votes: u64,
    ) -> Result<Order, SettlementError> {
        if num_votes == 0 {
            return Err(SettlementError::InvalidAmount(
                "num_votes must be at least 1".into(),
            ));
        }
        if num_votes > MAX_VOTES_PER_ORDER {
            return Err(SettlementError::InvalidAmount(format!(
                "num_votes {num_votes} exceeds the per-order limit of {MAX_VOTES_PER_ORDER}"
            )));
        }

        let order_id = new_id();

        // Validation and fee quote in one transaction; reading settings
        // materializes defaults, which is the only write on this path.
        let (email, phone, base_amount, gateway_charge) = self
            .store
            .write(|s| {
                let settings = s.settings_or_default();
                let user = s.user(user_id)?;
                let (email, phone) = (user.email.clone(), user.phone.clone());
                let poll = s.poll(poll_id)?;
                if poll.status != PollStatus::Active {
                    return Err(SettlementError::InvalidState(format!(
                        "poll {poll_id} is not accepting votes"
                    )));
                }
                if option_index >= poll.options.len() {
                    return Err(SettlementError::InvalidState(format!(
                        "option index {option_index} out of range for poll {poll_id}"
                    )));
                }
                let base = poll.vote_price.checked_mul(num_votes as i64).ok_or_else(|| {
                    SettlementError::InvalidAmount(format!(
                        "{num_votes} votes at {} paise overflows the order amount",
                        poll.vote_price
                    ))
                })?;
                let charge = fee_bps(base, settings.payment_gateway_charge_bps);
                Ok((email, phone, base, charge))
            })
            .await?;
        let total_amount = base_amount.checked_add(gateway_charge).ok_or_else(|| {
            SettlementError::InvalidAmount("order amount overflows with the gateway charge".into())
        })?;

        // External call happens outside any lock.
        let created = self
            .provider
            .create_charge(&ChargeRequest {
                order_id: order_id.clone(),
                amount: total_amount,
                currency: self.config.currency.clone(),
                customer_email: email,
                customer_phone: phone,
                return_url: self.config.return_url.clone(),
                notify_url: self.config.notify_url.clone(),
            })
            .await
            .map_err(|e| {
                warn!(order_id = %order_id, error = %e, "charge creation failed");
                e
            })?;

        let order = Order {
            id: order_id,
            provider: self.provider.kind(),
            provider_ref: created.provider_ref,
            checkout_url: created.checkout_url,
            user_id: user_id.to_string(),
            poll_id: poll_id.to_string(),
            option_index,
            num_votes,
            base_amount,
            gateway_charge,
            total_amount,
            payment_status: PaymentStatus::Pending,
            created_at: now_ts(),
            verified_at: None,
        };

        let persisted = order.clone();
        self.store
            .write(move |s| {
                s.orders.insert(persisted.id.clone(), persisted);
                Ok::<_, SettlementError>(())
            })
            .await?;

        info!(
            order_id = %order.id,
            provider = %order.provider,
            total_amount = order.total_amount,
            "order created"
        );
        Ok(order)
    }
}
