use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{
    Deserialize, Serialize,
    de::{self, IntoDeserializer},
};
use sqlx::{FromRow, SqliteExecutor, SqlitePool, Type};
use ts_rs::TS;
use uuid::Uuid;

use super::{council_discussion::CouncilDiscussion, council_vote::CouncilVote, empty_as_none};

pub const DEFAULT_PROPOSAL_TYPE: &str = "decision";
pub const DEFAULT_REQUIRED_VOTES: i32 = 3;
pub const DEFAULT_VOTE_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS)]
#[sqlx(type_name = "proposal_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Open,
    Voting,
    Deliberating,
    Approved,
    Rejected,
    Withdrawn,
}

impl ProposalStatus {
    /// Approved, rejected and withdrawn proposals never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProposalStatus::Approved | ProposalStatus::Rejected | ProposalStatus::Withdrawn
        )
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProposalStatus::Open => write!(f, "open"),
            ProposalStatus::Voting => write!(f, "voting"),
            ProposalStatus::Deliberating => write!(f, "deliberating"),
            ProposalStatus::Approved => write!(f, "approved"),
            ProposalStatus::Rejected => write!(f, "rejected"),
            ProposalStatus::Withdrawn => write!(f, "withdrawn"),
        }
    }
}

impl FromStr for ProposalStatus {
    type Err = de::value::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::deserialize(s.into_deserializer())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CouncilProposal {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub proposed_by: String,
    pub project_id: Option<Uuid>,
    pub proposal_type: String,
    pub status: ProposalStatus,
    pub required_votes: i32,
    pub vote_threshold: f64,
    /// Informational; nothing closes voting automatically.
    pub voting_closes_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouncilProposal {
    pub title: String,
    pub description: String,
    pub proposed_by: String,
    pub project_id: Option<Uuid>,
    pub proposal_type: Option<String>,
    pub required_votes: Option<i32>,
    pub vote_threshold: Option<f64>,
    pub voting_closes_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProposalFilter {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<ProposalStatus>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub proposed_by: Option<String>,
}

/// List entry: the proposal with every vote and its latest discussions.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProposalWithActivity {
    #[serde(flatten)]
    #[ts(flatten)]
    pub proposal: CouncilProposal,
    pub votes: Vec<CouncilVote>,
    pub discussions: Vec<CouncilDiscussion>,
}

impl CouncilProposal {
    pub async fn create<'e, E>(
        executor: E,
        data: &CreateCouncilProposal,
    ) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, CouncilProposal>(
            r#"
            INSERT INTO council_proposals (
                id, title, description, proposed_by, project_id, proposal_type,
                status, required_votes, vote_threshold, voting_closes_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.proposed_by)
        .bind(data.project_id)
        .bind(
            data.proposal_type
                .as_deref()
                .unwrap_or(DEFAULT_PROPOSAL_TYPE),
        )
        .bind(ProposalStatus::Open)
        .bind(data.required_votes.unwrap_or(DEFAULT_REQUIRED_VOTES))
        .bind(data.vote_threshold.unwrap_or(DEFAULT_VOTE_THRESHOLD))
        .bind(data.voting_closes_at)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, CouncilProposal>(r#"SELECT * FROM council_proposals WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Newest first.
    pub async fn find_filtered(
        pool: &SqlitePool,
        filter: &ProposalFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CouncilProposal>(
            r#"SELECT * FROM council_proposals
               WHERE (?1 IS NULL OR status = ?1)
                 AND (?2 IS NULL OR proposed_by = ?2)
               ORDER BY created_at DESC, rowid DESC
               LIMIT ?3 OFFSET ?4"#,
        )
        .bind(filter.status)
        .bind(filter.proposed_by.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_filtered(
        pool: &SqlitePool,
        filter: &ProposalFilter,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM council_proposals
               WHERE (?1 IS NULL OR status = ?1)
                 AND (?2 IS NULL OR proposed_by = ?2)"#,
        )
        .bind(filter.status)
        .bind(filter.proposed_by.as_deref())
        .fetch_one(pool)
        .await
    }

    /// Moves an `open` proposal to `to`. Returns whether the row changed;
    /// proposals already past `open` are left alone.
    pub async fn leave_open<'e, E>(
        executor: E,
        id: Uuid,
        to: ProposalStatus,
    ) -> Result<bool, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query(
            r#"UPDATE council_proposals
               SET status = ?2, updated_at = datetime('now', 'subsec')
               WHERE id = ?1 AND status = 'open'"#,
        )
        .bind(id)
        .bind(to)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Moves the proposal into a terminal status and stamps `resolved_at`.
    /// Returns `None` when it was already terminal, so a proposal resolves
    /// exactly once however many callers race here.
    pub async fn resolve<'e, E>(
        executor: E,
        id: Uuid,
        to: ProposalStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, CouncilProposal>(
            r#"UPDATE council_proposals
               SET status = ?2,
                   resolved_at = datetime('now', 'subsec'),
                   updated_at = datetime('now', 'subsec')
               WHERE id = ?1
                 AND status NOT IN ('approved', 'rejected', 'withdrawn')
               RETURNING *"#,
        )
        .bind(id)
        .bind(to)
        .fetch_optional(executor)
        .await
    }

    pub async fn touch<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query(
            r#"UPDATE council_proposals SET updated_at = datetime('now', 'subsec') WHERE id = ?1"#,
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }
}
