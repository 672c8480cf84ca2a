//! Mutable ledger state and its atomic helpers.
//!
//! The helpers here are the only mutation paths the settlement and
//! wallet layers use: conditional order transitions, increment-or-create
//! vote upserts, tally increments, and balance adjustments. Each is a
//! plain method on the locked state, so composing them inside one
//! `LedgerStore::write` closure yields one transactional unit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use pollstake_core::{
    new_id, now_ts, Order, PaymentStatus, Poll, Settings, Transaction, User, Vote, VoteResult,
    WithdrawalRequest,
};

use crate::StoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerState {
    pub users: HashMap<String, User>,
    pub polls: HashMap<String, Poll>,
    pub orders: HashMap<String, Order>,
    pub votes: HashMap<String, Vote>,
    pub transactions: Vec<Transaction>,
    pub withdrawals: HashMap<String, WithdrawalRequest>,
    settings: Option<Settings>,
}

impl LedgerState {
    // ----- point reads -------------------------------------------------

    pub fn user(&self, id: &str) -> Result<&User, StoreError> {
        self.users.get(id).ok_or_else(|| StoreError::not_found("user", id))
    }

    pub fn user_mut(&mut self, id: &str) -> Result<&mut User, StoreError> {
        self.users.get_mut(id).ok_or_else(|| StoreError::not_found("user", id))
    }

    pub fn poll(&self, id: &str) -> Result<&Poll, StoreError> {
        self.polls.get(id).ok_or_else(|| StoreError::not_found("poll", id))
    }

    pub fn poll_mut(&mut self, id: &str) -> Result<&mut Poll, StoreError> {
        self.polls.get_mut(id).ok_or_else(|| StoreError::not_found("poll", id))
    }

    pub fn order(&self, id: &str) -> Result<&Order, StoreError> {
        self.orders.get(id).ok_or_else(|| StoreError::not_found("order", id))
    }

    pub fn order_mut(&mut self, id: &str) -> Result<&mut Order, StoreError> {
        self.orders.get_mut(id).ok_or_else(|| StoreError::not_found("order", id))
    }

    pub fn withdrawal(&self, id: &str) -> Result<&WithdrawalRequest, StoreError> {
        self.withdrawals
            .get(id)
            .ok_or_else(|| StoreError::not_found("withdrawal", id))
    }

    pub fn withdrawal_mut(&mut self, id: &str) -> Result<&mut WithdrawalRequest, StoreError> {
        self.withdrawals
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("withdrawal", id))
    }

    /// Find an order by its provider-side correlation id.
    pub fn order_by_provider_ref(&self, provider_ref: &str) -> Option<&Order> {
        self.orders.values().find(|o| o.provider_ref == provider_ref)
    }

    /// The vote record for a (user, poll, option) triple, if any.
    pub fn vote_for(&self, user_id: &str, poll_id: &str, option_index: usize) -> Option<&Vote> {
        self.votes.values().find(|v| {
            v.user_id == user_id && v.poll_id == poll_id && v.option_index == option_index
        })
    }

    /// All votes on a poll, ordered by id for deterministic iteration.
    pub fn votes_on_poll(&self, poll_id: &str) -> Vec<Vote> {
        let mut votes: Vec<Vote> =
            self.votes.values().filter(|v| v.poll_id == poll_id).cloned().collect();
        votes.sort_by(|a, b| a.id.cmp(&b.id));
        votes
    }

    pub fn votes_by_user(&self, user_id: &str) -> Vec<Vote> {
        let mut votes: Vec<Vote> =
            self.votes.values().filter(|v| v.user_id == user_id).cloned().collect();
        votes.sort_by(|a, b| a.voted_at.cmp(&b.voted_at));
        votes
    }

    // ----- settings singleton ------------------------------------------

    /// Current settings, materializing defaults on first access. This is
    /// the one implicit write on otherwise read-only paths.
    pub fn settings_or_default(&mut self) -> Settings {
        *self.settings.get_or_insert_with(Settings::default)
    }

    pub fn update_settings(&mut self, settings: Settings) {
        self.settings = Some(settings);
    }

    // ----- atomic mutation helpers -------------------------------------

    /// Conditionally transition an order `from -> to`.
    ///
    /// Returns `Ok(true)` if this call performed the transition,
    /// `Ok(false)` if the order was already in `to` (a concurrent caller
    /// won the race). Any other current status is a conflict the caller
    /// must interpret.
    pub fn transition_order(
        &mut self,
        order_id: &str,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<bool, StoreError> {
        let order = self.order_mut(order_id)?;
        if order.payment_status == to {
            return Ok(false);
        }
        if order.payment_status != from {
            // Treat a diverged state (e.g. failed while we saw success)
            // as not-transitioned; callers re-read and decide.
            return Ok(false);
        }
        order.payment_status = to;
        Ok(true)
    }

    /// Increment the existing vote for the triple or create a fresh one.
    /// Returns the vote id.
    pub fn upsert_vote_increment(
        &mut self,
        user_id: &str,
        poll_id: &str,
        option_index: usize,
        num_votes: u64,
        amount_paid: i64,
    ) -> String {
        let now = now_ts();
        let existing = self
            .votes
            .values_mut()
            .find(|v| v.user_id == user_id && v.poll_id == poll_id && v.option_index == option_index);
        if let Some(vote) = existing {
            vote.num_votes += num_votes;
            vote.amount_paid += amount_paid;
            vote.updated_at = now;
            return vote.id.clone();
        }
        let vote = Vote {
            id: new_id(),
            user_id: user_id.to_string(),
            poll_id: poll_id.to_string(),
            option_index,
            num_votes,
            amount_paid,
            result: VoteResult::Pending,
            winning_amount: 0,
            voted_at: now,
            updated_at: now,
        };
        let id = vote.id.clone();
        self.votes.insert(id.clone(), vote);
        id
    }

    /// Add settled votes and stake to a poll option's tally.
    pub fn increment_option_tally(
        &mut self,
        poll_id: &str,
        option_index: usize,
        num_votes: u64,
        amount: i64,
    ) -> Result<(), StoreError> {
        let poll = self.poll_mut(poll_id)?;
        let option = poll.options.get_mut(option_index).ok_or(StoreError::OptionOutOfRange {
            poll_id: poll_id.to_string(),
            index: option_index,
        })?;
        option.votes_count += num_votes;
        option.total_amount += amount;
        Ok(())
    }

    /// Atomically credit a user's cash wallet. Returns the new balance.
    pub fn credit_wallet(&mut self, user_id: &str, amount: i64) -> Result<i64, StoreError> {
        let user = self.user_mut(user_id)?;
        user.cash_wallet += amount;
        Ok(user.cash_wallet)
    }

    /// Debit a user's cash wallet, failing without mutation if the
    /// balance is insufficient. Returns the new balance.
    pub fn debit_wallet_if_sufficient(
        &mut self,
        user_id: &str,
        amount: i64,
    ) -> Result<i64, StoreError> {
        let user = self.user_mut(user_id)?;
        if user.cash_wallet < amount {
            return Err(StoreError::InsufficientBalance {
                have: user.cash_wallet,
                need: amount,
            });
        }
        user.cash_wallet -= amount;
        Ok(user.cash_wallet)
    }

    /// Append an entry to the transaction ledger. Entries are never
    /// mutated afterwards.
    pub fn append_transaction(&mut self, txn: Transaction) {
        self.transactions.push(txn);
    }

    pub fn transactions_for(&self, user_id: &str) -> Vec<Transaction> {
        let mut txns: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        txns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        txns
    }
}
