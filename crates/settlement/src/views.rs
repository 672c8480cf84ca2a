//! Read models over the ledger: poll overviews, a user's vote history,
//! and the admin result projection. Pure reads, no mutation.

use serde::Serialize;

use pollstake_core::{pool_share, Poll, PollStatus, VoteResult};
use pollstake_store::LedgerStore;

use crate::SettlementError;

#[derive(Debug, Clone, Serialize)]
pub struct UserVoteSummary {
    pub option_index: usize,
    pub option_name: String,
    pub num_votes: u64,
    pub amount_paid: i64,
    pub result: VoteResult,
    pub winning_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultDetails {
    pub winning_option: usize,
    pub winning_option_name: String,
    pub winning_votes: u64,
    pub total_pool: i64,
    /// Floor payout for a single winning vote.
    pub per_vote_payout: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollOverview {
    #[serde(flatten)]
    pub poll: Poll,
    pub total_votes: u64,
    pub total_amount_collected: i64,
    pub result: Option<ResultDetails>,
    /// The calling user's settled votes on this poll, one per option.
    pub user_votes: Vec<UserVoteSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MyPollEntry {
    pub poll_id: String,
    pub title: String,
    pub status: PollStatus,
    pub winning_option: Option<usize>,
    pub votes: Vec<UserVoteSummary>,
    pub total_invested: i64,
    pub total_won: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantStat {
    pub user_id: String,
    pub name: String,
    pub option_index: usize,
    pub num_votes: u64,
    pub amount_paid: i64,
    pub winning_amount: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultStats {
    pub poll_id: String,
    pub title: String,
    pub winning_option: usize,
    pub winning_option_name: String,
    pub total_pool: i64,
    pub total_votes: u64,
    pub per_vote_payout: i64,
    pub winners: Vec<ParticipantStat>,
    pub losers: Vec<ParticipantStat>,
    pub total_distributed: i64,
}

fn result_details(poll: &Poll) -> Option<ResultDetails> {
    let winning = poll.winning_option?;
    let option = poll.options.get(winning)?;
    let pool = poll.total_pool();
    Some(ResultDetails {
        winning_option: winning,
        winning_option_name: option.name.clone(),
        winning_votes: option.votes_count,
        total_pool: pool,
        per_vote_payout: pool_share(pool, 1, option.votes_count),
    })
}

/// A poll with its aggregate tallies and, post-declaration, payout
/// details, plus the calling user's own votes when known.
pub async fn poll_overview(
    store: &LedgerStore,
    poll_id: &str,
    user_id: Option<&str>,
) -> Result<PollOverview, SettlementError> {
    store
        .read(|s| {
            let poll = s.poll(poll_id)?.clone();
            let user_votes = match user_id {
                Some(uid) => s
                    .votes_by_user(uid)
                    .into_iter()
                    .filter(|v| v.poll_id == poll_id)
                    .map(|v| UserVoteSummary {
                        option_name: poll
                            .options
                            .get(v.option_index)
                            .map(|o| o.name.clone())
                            .unwrap_or_default(),
                        option_index: v.option_index,
                        num_votes: v.num_votes,
                        amount_paid: v.amount_paid,
                        result: v.result,
                        winning_amount: v.winning_amount,
                    })
                    .collect(),
                None => Vec::new(),
            };
            Ok(PollOverview {
                total_votes: poll.total_votes(),
                total_amount_collected: poll.total_pool(),
                result: result_details(&poll),
                user_votes,
                poll,
            })
        })
        .await
}

/// All active and declared polls, newest first.
pub async fn list_polls(store: &LedgerStore) -> Vec<Poll> {
    store
        .read(|s| {
            let mut polls: Vec<Poll> = s.polls.values().cloned().collect();
            polls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            polls
        })
        .await
}

/// A user's votes grouped per poll, with invested and won totals.
pub async fn my_polls(store: &LedgerStore, user_id: &str) -> Vec<MyPollEntry> {
    store
        .read(|s| {
            let mut entries: Vec<MyPollEntry> = Vec::new();
            for vote in s.votes_by_user(user_id) {
                let Ok(poll) = s.poll(&vote.poll_id) else {
                    continue;
                };
                let summary = UserVoteSummary {
                    option_name: poll
                        .options
                        .get(vote.option_index)
                        .map(|o| o.name.clone())
                        .unwrap_or_default(),
                    option_index: vote.option_index,
                    num_votes: vote.num_votes,
                    amount_paid: vote.amount_paid,
                    result: vote.result,
                    winning_amount: vote.winning_amount,
                };
                match entries.iter_mut().find(|e| e.poll_id == vote.poll_id) {
                    Some(entry) => {
                        entry.total_invested += summary.amount_paid;
                        entry.total_won += summary.winning_amount;
                        entry.votes.push(summary);
                    }
                    None => entries.push(MyPollEntry {
                        poll_id: poll.id.clone(),
                        title: poll.title.clone(),
                        status: poll.status,
                        winning_option: poll.winning_option,
                        total_invested: summary.amount_paid,
                        total_won: summary.winning_amount,
                        votes: vec![summary],
                    }),
                }
            }
            entries
        })
        .await
}

/// Admin projection of a declared result: who won, who lost, and how
/// the pool was split. Requires the result to be declared.
pub async fn result_stats(
    store: &LedgerStore,
    poll_id: &str,
) -> Result<ResultStats, SettlementError> {
    store
        .read(|s| {
            let poll = s.poll(poll_id)?;
            let Some(winning) = poll.winning_option else {
                return Err(SettlementError::InvalidState(format!(
                    "poll {poll_id} has no declared result"
                )));
            };
            let winning_option = poll.options.get(winning).ok_or_else(|| {
                SettlementError::InvalidState(format!(
                    "winning option {winning} out of range for poll {poll_id}"
                ))
            })?;
            let pool = poll.total_pool();

            let mut winners = Vec::new();
            let mut losers = Vec::new();
            let mut total_distributed = 0i64;
            for vote in s.votes_on_poll(poll_id) {
                let name = s
                    .users
                    .get(&vote.user_id)
                    .map(|u| u.name.clone())
                    .unwrap_or_default();
                let stat = ParticipantStat {
                    user_id: vote.user_id.clone(),
                    name,
                    option_index: vote.option_index,
                    num_votes: vote.num_votes,
                    amount_paid: vote.amount_paid,
                    winning_amount: vote.winning_amount,
                };
                if vote.result == VoteResult::Win {
                    total_distributed += vote.winning_amount;
                    winners.push(stat);
                } else {
                    losers.push(stat);
                }
            }

            Ok(ResultStats {
                poll_id: poll.id.clone(),
                title: poll.title.clone(),
                winning_option: winning,
                winning_option_name: winning_option.name.clone(),
                total_pool: pool,
                total_votes: poll.total_votes(),
                per_vote_payout: pool_share(pool, 1, winning_option.votes_count),
                winners,
                losers,
                total_distributed,
            })
        })
        .await
}
