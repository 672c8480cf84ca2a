//! Persisted entity types.
//!
//! Every record the ledger store holds is an explicit struct with
//! tagged enums for its status vocabulary; unknown states are rejected
//! at the boundary instead of being carried around as loose maps.

use serde::{Deserialize, Serialize};

use crate::money::{DEFAULT_GATEWAY_CHARGE_BPS, DEFAULT_WITHDRAWAL_CHARGE_BPS};

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

/// KYC review status for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    NotSubmitted,
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub role: Role,
    /// Cash balance in paise. Non-negative except transiently between a
    /// withdrawal debit and its rejection refund.
    pub cash_wallet: i64,
    pub kyc_status: KycStatus,
    pub upi_id: Option<String>,
    pub created_at: i64,
}

/// Poll lifecycle. `Active -> ResultDeclared` happens exactly once and
/// is irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Active,
    ResultDeclared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOption {
    pub name: String,
    /// Tally of settled votes. Mutated only by vote settlement.
    pub votes_count: u64,
    /// Staked base amount in paise. Mutated only by vote settlement.
    pub total_amount: i64,
}

impl PollOption {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            votes_count: 0,
            total_amount: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub options: Vec<PollOption>,
    /// Price per vote in paise.
    pub vote_price: i64,
    pub end_at: i64,
    pub status: PollStatus,
    pub winning_option: Option<usize>,
    pub created_by: String,
    pub created_at: i64,
    pub result_declared_at: Option<i64>,
}

impl Poll {
    /// Sum of `total_amount` across all options: the distributable pool.
    pub fn total_pool(&self) -> i64 {
        self.options.iter().map(|o| o.total_amount).sum()
    }

    /// Sum of `votes_count` across all options.
    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.votes_count).sum()
    }
}

/// Which payment gateway a deployment settles through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Cashfree,
    Coinbase,
    Nowpayments,
    Mock,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Cashfree => write!(f, "cashfree"),
            ProviderKind::Coinbase => write!(f, "coinbase"),
            ProviderKind::Nowpayments => write!(f, "nowpayments"),
            ProviderKind::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cashfree" => Ok(ProviderKind::Cashfree),
            "coinbase" => Ok(ProviderKind::Coinbase),
            "nowpayments" => Ok(ProviderKind::Nowpayments),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(format!("unknown payment provider: {other}")),
        }
    }
}

/// Normalized payment status every provider vocabulary maps into.
/// Unknown native states normalize to `Pending`, never to `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Success | PaymentStatus::Failed)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Success => write!(f, "success"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One payment attempt. Immutable once `payment_status == Success`
/// except for the verification timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub provider: ProviderKind,
    /// Provider-side correlation id (charge code, payment id, ...).
    pub provider_ref: String,
    pub checkout_url: String,
    pub user_id: String,
    pub poll_id: String,
    pub option_index: usize,
    pub num_votes: u64,
    /// `vote_price * num_votes` in paise.
    pub base_amount: i64,
    /// `base_amount * gateway_bps / 10_000` in paise.
    pub gateway_charge: i64,
    /// `base_amount + gateway_charge` in paise.
    pub total_amount: i64,
    pub payment_status: PaymentStatus,
    pub created_at: i64,
    pub verified_at: Option<i64>,
}

/// Outcome of a vote after result settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteResult {
    Pending,
    Win,
    Loss,
}

/// Aggregated stake per (user, poll, option). At most one record per
/// triple; repeated settled payments increment it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub id: String,
    pub user_id: String,
    pub poll_id: String,
    pub option_index: usize,
    pub num_votes: u64,
    pub amount_paid: i64,
    pub result: VoteResult,
    /// Set exactly once, at result settlement.
    pub winning_amount: i64,
    pub voted_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Vote,
    Winning,
}

/// Append-only ledger entry; the audit trail for all money movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub kind: TransactionKind,
    pub amount: i64,
    pub gateway_charge: Option<i64>,
    pub poll_id: Option<String>,
    pub order_id: Option<String>,
    pub status: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Completed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: String,
    pub user_id: String,
    /// Requested amount in paise; this is what a rejection refunds.
    pub amount: i64,
    pub withdrawal_charge: i64,
    pub net_amount: i64,
    /// UPI id snapshot taken at request time.
    pub upi_id: String,
    pub status: WithdrawalStatus,
    pub requested_at: i64,
    pub reviewed_at: Option<i64>,
}

/// Platform settings singleton. Materialized with defaults on first
/// read if absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub payment_gateway_charge_bps: u32,
    pub withdrawal_charge_bps: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            payment_gateway_charge_bps: DEFAULT_GATEWAY_CHARGE_BPS,
            withdrawal_charge_bps: DEFAULT_WITHDRAWAL_CHARGE_BPS,
        }
    }
}
