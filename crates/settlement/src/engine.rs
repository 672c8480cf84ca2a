//! The settlement engine.
//!
//! `settle_order` is the single idempotent procedure every confirmation
//! path converges on. The conditional `Pending -> Success` transition
//! decides exactly one winner; the vote upsert, tally increment, and
//! ledger append ride in the same store transaction, so a failure in
//! any step rolls the whole unit back.

use std::sync::Arc;

use tracing::{info, warn};

use pollstake_core::{
    new_id, now_ts, pool_share, PaymentStatus, PollStatus, Transaction, TransactionKind,
    VoteResult,
};
use pollstake_gateway::PaymentProvider;
use pollstake_store::{LedgerState, LedgerStore};

use crate::SettlementError;

/// What a settlement attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// This call performed the settlement.
    Settled,
    /// A previous call already settled the order.
    AlreadySettled,
    /// The payment failed; the order is terminally failed.
    MarkedFailed,
    /// Nothing to do (payment still pending, or state diverged).
    Ignored,
}

/// Result of processing one webhook delivery.
#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub event_type: String,
    pub outcome: SettleOutcome,
}

/// Totals from a result settlement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultSummary {
    pub winners: usize,
    pub losers: usize,
    /// Total paise credited to winners.
    pub distributed: i64,
}

pub struct SettlementEngine {
    store: Arc<LedgerStore>,
    provider: Arc<dyn PaymentProvider>,
}

impl SettlementEngine {
    pub fn new(store: Arc<LedgerStore>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { store, provider }
    }

    /// Apply an observed payment status to an order.
    ///
    /// Idempotent: replays and concurrent calls return `AlreadySettled`
    /// without touching tallies. Settling into a poll whose result has
    /// been declared is rejected and rolled back.
    pub async fn settle_order(
        &self,
        order_id: &str,
        observed: PaymentStatus,
    ) -> Result<SettleOutcome, SettlementError> {
        let order_id = order_id.to_string();
        let outcome = self
            .store
            .write(move |s| settle_in_txn(s, &order_id, observed))
            .await?;
        match outcome {
            SettleOutcome::Settled => info!(observed = %observed, "order settled"),
            SettleOutcome::MarkedFailed => info!("order marked failed"),
            _ => {}
        }
        Ok(outcome)
    }

    /// Poll the provider for an order's status and settle accordingly.
    pub async fn verify_order(
        &self,
        order_id: &str,
    ) -> Result<(PaymentStatus, SettleOutcome), SettlementError> {
        let (provider_ref, current) = self
            .store
            .read(|s| {
                s.order(order_id)
                    .map(|o| (o.provider_ref.clone(), o.payment_status))
            })
            .await?;
        // A terminal order needs no provider round trip.
        if current == PaymentStatus::Success {
            return Ok((current, SettleOutcome::AlreadySettled));
        }
        let observed = self.provider.fetch_status(&provider_ref).await?;
        let outcome = self.settle_order(order_id, observed).await?;
        Ok((observed, outcome))
    }

    /// Verify and settle a webhook delivery.
    ///
    /// The signature is checked before the payload is inspected. An
    /// event for an unknown provider ref is acknowledged and ignored so
    /// the gateway stops retrying it.
    pub async fn handle_webhook(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome, SettlementError> {
        self.provider
            .verify_webhook_signature(raw_body, signature_header)?;
        let event = self.provider.webhook_event(raw_body)?;

        let order_id = self
            .store
            .read(|s| s.order_by_provider_ref(&event.provider_ref).map(|o| o.id.clone()))
            .await;
        let Some(order_id) = order_id else {
            warn!(provider_ref = %event.provider_ref, event = %event.event_type, "webhook for unknown order");
            return Ok(WebhookOutcome {
                event_type: event.event_type,
                outcome: SettleOutcome::Ignored,
            });
        };

        let outcome = self.settle_order(&order_id, event.status).await?;
        Ok(WebhookOutcome {
            event_type: event.event_type,
            outcome,
        })
    }

    /// Declare a poll's winning option and distribute the pool.
    ///
    /// The declaration itself commits first and is irreversible; the
    /// per-vote distribution then runs as independent atomic units, so
    /// a crash mid-batch leaves only `Pending` votes behind, which
    /// [`SettlementEngine::resume_result_settlement`] finishes.
    pub async fn declare_result(
        &self,
        poll_id: &str,
        winning_index: usize,
    ) -> Result<ResultSummary, SettlementError> {
        let poll_id = poll_id.to_string();
        let marked_id = poll_id.clone();
        self.store
            .write(move |s| {
                let poll = s.poll_mut(&marked_id)?;
                if poll.status == PollStatus::ResultDeclared {
                    return Err(SettlementError::AlreadyDeclared(marked_id.clone()));
                }
                if winning_index >= poll.options.len() {
                    return Err(SettlementError::InvalidState(format!(
                        "option index {winning_index} out of range for poll {marked_id}"
                    )));
                }
                poll.status = PollStatus::ResultDeclared;
                poll.winning_option = Some(winning_index);
                poll.result_declared_at = Some(now_ts());
                Ok(())
            })
            .await?;
        info!(poll_id = %poll_id, winning_index, "result declared");

        self.resume_result_settlement(&poll_id).await
    }

    /// Distribute payouts for an already-declared poll.
    ///
    /// Only votes still `Pending` are touched, so re-running after a
    /// partial batch completes the remainder and a full re-run is a
    /// no-op.
    pub async fn resume_result_settlement(
        &self,
        poll_id: &str,
    ) -> Result<ResultSummary, SettlementError> {
        let (pool, winning_index, winning_votes, pending) = self
            .store
            .read(|s| {
                let poll = s.poll(poll_id)?;
                let winning_index = match (poll.status, poll.winning_option) {
                    (PollStatus::ResultDeclared, Some(idx)) => idx,
                    _ => {
                        return Err(SettlementError::InvalidState(format!(
                            "poll {poll_id} has no declared result"
                        )))
                    }
                };
                // Tallies are frozen once declared, so the pool and the
                // winning vote count are stable across the whole batch.
                let pool = poll.total_pool();
                let winning_votes = poll.options[winning_index].votes_count;
                let pending: Vec<String> = s
                    .votes_on_poll(poll_id)
                    .into_iter()
                    .filter(|v| v.result == VoteResult::Pending)
                    .map(|v| v.id)
                    .collect();
                Ok((pool, winning_index, winning_votes, pending))
            })
            .await?;

        let mut summary = ResultSummary {
            winners: 0,
            losers: 0,
            distributed: 0,
        };
        for vote_id in pending {
            let poll_id = poll_id.to_string();
            let settled = self
                .store
                .write(move |s| {
                    let Some(vote) = s.votes.get_mut(&vote_id) else {
                        return Ok::<_, SettlementError>(None);
                    };
                    if vote.result != VoteResult::Pending {
                        return Ok(None);
                    }
                    let now = now_ts();
                    if vote.option_index != winning_index {
                        vote.result = VoteResult::Loss;
                        vote.updated_at = now;
                        return Ok(Some((false, 0)));
                    }
                    let payout = pool_share(pool, vote.num_votes, winning_votes);
                    vote.result = VoteResult::Win;
                    vote.winning_amount = payout;
                    vote.updated_at = now;
                    let user_id = vote.user_id.clone();
                    s.credit_wallet(&user_id, payout)?;
                    s.append_transaction(Transaction {
                        id: new_id(),
                        user_id,
                        kind: TransactionKind::Winning,
                        amount: payout,
                        gateway_charge: None,
                        poll_id: Some(poll_id),
                        order_id: None,
                        status: "success".into(),
                        created_at: now,
                    });
                    Ok(Some((true, payout)))
                })
                .await?;
            match settled {
                Some((false, _)) => summary.losers += 1,
                Some((true, payout)) => {
                    summary.winners += 1;
                    summary.distributed += payout;
                }
                None => {}
            }
        }
        info!(
            poll_id,
            winners = summary.winners,
            losers = summary.losers,
            distributed = summary.distributed,
            "result settlement complete"
        );
        Ok(summary)
    }

    /// Re-drive settlement for orders marked `Success` that have no
    /// matching ledger entry. Returns how many orders were repaired.
    pub async fn reconcile(&self) -> Result<usize, SettlementError> {
        let candidates: Vec<String> = self
            .store
            .read(|s| {
                s.orders
                    .values()
                    .filter(|o| o.payment_status == PaymentStatus::Success)
                    .filter(|o| {
                        !s.transactions
                            .iter()
                            .any(|t| t.order_id.as_deref() == Some(o.id.as_str()))
                    })
                    .map(|o| o.id.clone())
                    .collect()
            })
            .await;

        let mut repaired = 0;
        for order_id in candidates {
            let done = self
                .store
                .write(move |s| {
                    // Re-check under the lock; a concurrent repair may
                    // have written the ledger entry already.
                    let order = s.order(&order_id)?.clone();
                    if s.transactions
                        .iter()
                        .any(|t| t.order_id.as_deref() == Some(order.id.as_str()))
                    {
                        return Ok::<_, SettlementError>(false);
                    }
                    let poll = s.poll(&order.poll_id)?;
                    if poll.status != PollStatus::Active {
                        warn!(order_id = %order.id, poll_id = %order.poll_id, "unsettled paid order on declared poll");
                        return Ok(false);
                    }
                    apply_settlement(s, &order.id)?;
                    Ok(true)
                })
                .await?;
            if done {
                repaired += 1;
            }
        }
        if repaired > 0 {
            info!(repaired, "reconciliation sweep repaired orders");
        }
        Ok(repaired)
    }
}

fn settle_in_txn(
    s: &mut LedgerState,
    order_id: &str,
    observed: PaymentStatus,
) -> Result<SettleOutcome, SettlementError> {
    match observed {
        PaymentStatus::Pending => Ok(SettleOutcome::Ignored),
        PaymentStatus::Failed => {
            let flipped =
                s.transition_order(order_id, PaymentStatus::Pending, PaymentStatus::Failed)?;
            Ok(if flipped {
                SettleOutcome::MarkedFailed
            } else {
                SettleOutcome::Ignored
            })
        }
        PaymentStatus::Success => {
            if !s.transition_order(order_id, PaymentStatus::Pending, PaymentStatus::Success)? {
                let current = s.order(order_id)?.payment_status;
                return Ok(if current == PaymentStatus::Success {
                    SettleOutcome::AlreadySettled
                } else {
                    SettleOutcome::Ignored
                });
            }
            let poll_id = s.order(order_id)?.poll_id.clone();
            if s.poll(&poll_id)?.status != PollStatus::Active {
                // Rolls back the transition with the rest of the txn.
                return Err(SettlementError::InvalidState(format!(
                    "poll {poll_id} result already declared, payment cannot settle"
                )));
            }
            apply_settlement(s, order_id)?;
            Ok(SettleOutcome::Settled)
        }
    }
}

/// Steps 3-6 of vote settlement: stamp the order, upsert the vote,
/// bump the tally, append the ledger entry. Caller holds the write
/// transaction and has already won the status transition (or, for
/// reconciliation, re-checked the ledger gap).
fn apply_settlement(s: &mut LedgerState, order_id: &str) -> Result<(), SettlementError> {
    let now = now_ts();
    let order = s.order_mut(order_id)?;
    order.verified_at = Some(now);
    let order = order.clone();

    s.upsert_vote_increment(
        &order.user_id,
        &order.poll_id,
        order.option_index,
        order.num_votes,
        order.base_amount,
    );
    s.increment_option_tally(
        &order.poll_id,
        order.option_index,
        order.num_votes,
        order.base_amount,
    )?;
    s.append_transaction(Transaction {
        id: new_id(),
        user_id: order.user_id,
        kind: TransactionKind::Vote,
        amount: order.base_amount,
        gateway_charge: Some(order.gateway_charge),
        poll_id: Some(order.poll_id),
        order_id: Some(order.id),
        status: "success".into(),
        created_at: now,
    });
    Ok(())
}
