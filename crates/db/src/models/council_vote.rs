use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor, Type};
use ts_rs::TS;
use uuid::Uuid;

use super::council_proposal::ProposalStatus;

pub const DEFAULT_VOTE_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS)]
#[sqlx(type_name = "vote_choice", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Approve,
    Reject,
    Abstain,
}

impl std::fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteChoice::Approve => write!(f, "approve"),
            VoteChoice::Reject => write!(f, "reject"),
            VoteChoice::Abstain => write!(f, "abstain"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CouncilVote {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub agent_id: String,
    pub vote: VoteChoice,
    pub reasoning: Option<String>,
    /// Recorded for reporting only; every vote counts once.
    pub weight: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CastVote {
    pub agent_id: String,
    pub vote: VoteChoice,
    pub reasoning: Option<String>,
    pub weight: Option<f64>,
}

impl CouncilVote {
    /// Inserts the voter's ballot or replaces their earlier one.
    pub async fn upsert<'e, E>(
        executor: E,
        proposal_id: Uuid,
        data: &CastVote,
    ) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, CouncilVote>(
            r#"
            INSERT INTO council_votes (id, proposal_id, agent_id, vote, reasoning, weight)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(proposal_id, agent_id) DO UPDATE SET
                vote = excluded.vote,
                reasoning = excluded.reasoning,
                weight = excluded.weight,
                updated_at = datetime('now', 'subsec')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(proposal_id)
        .bind(&data.agent_id)
        .bind(data.vote)
        .bind(data.reasoning.as_deref())
        .bind(data.weight.unwrap_or(DEFAULT_VOTE_WEIGHT))
        .fetch_one(executor)
        .await
    }

    /// Oldest first.
    pub async fn find_by_proposal<'e, E>(
        executor: E,
        proposal_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, CouncilVote>(
            r#"SELECT * FROM council_votes
               WHERE proposal_id = ?1
               ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(proposal_id)
        .fetch_all(executor)
        .await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub approve: usize,
    pub reject: usize,
    pub abstain: usize,
}

impl VoteTally {
    pub fn from_votes(votes: &[CouncilVote]) -> Self {
        votes.iter().fold(Self::default(), |mut tally, v| {
            match v.vote {
                VoteChoice::Approve => tally.approve += 1,
                VoteChoice::Reject => tally.reject += 1,
                VoteChoice::Abstain => tally.abstain += 1,
            }
            tally
        })
    }

    pub fn total(&self) -> usize {
        self.approve + self.reject + self.abstain
    }

    /// Approvals over all votes cast (abstentions included); 0 when empty.
    pub fn approval_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.approve as f64 / total as f64,
        }
    }

    /// The terminal status this tally decides, or `None` while below quorum.
    /// The threshold is inclusive.
    pub fn outcome(&self, required_votes: i32, threshold: f64) -> Option<ProposalStatus> {
        let required = usize::try_from(required_votes.max(1)).unwrap_or(1);
        if self.total() < required {
            return None;
        }
        if self.approval_rate() >= threshold {
            Some(ProposalStatus::Approved)
        } else {
            Some(ProposalStatus::Rejected)
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStats {
    pub total_votes: usize,
    pub approve_votes: usize,
    pub reject_votes: usize,
    pub abstain_votes: usize,
    pub approval_rate: f64,
    pub meets_threshold: bool,
    pub meets_quorum: bool,
}

impl ProposalStats {
    pub fn new(tally: VoteTally, required_votes: i32, threshold: f64) -> Self {
        let approval_rate = tally.approval_rate();
        Self {
            total_votes: tally.total(),
            approve_votes: tally.approve,
            reject_votes: tally.reject,
            abstain_votes: tally.abstain,
            approval_rate,
            meets_threshold: tally.total() > 0 && approval_rate >= threshold,
            meets_quorum: i64::try_from(tally.total()).unwrap_or(i64::MAX)
                >= i64::from(required_votes),
        }
    }
}
