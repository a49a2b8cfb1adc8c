use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteExecutor};
use ts_rs::TS;
use uuid::Uuid;

pub const DEFAULT_DISCUSSION_TYPE: &str = "comment";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CouncilDiscussion {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub agent_id: String,
    pub message: String,
    pub discussion_type: String,
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouncilDiscussion {
    pub agent_id: String,
    pub message: String,
    pub discussion_type: Option<String>,
    pub parent_id: Option<Uuid>,
}

impl CouncilDiscussion {
    pub async fn create<'e, E>(
        executor: E,
        proposal_id: Uuid,
        data: &CreateCouncilDiscussion,
    ) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, CouncilDiscussion>(
            r#"
            INSERT INTO council_discussions (id, proposal_id, agent_id, message, discussion_type, parent_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(proposal_id)
        .bind(&data.agent_id)
        .bind(&data.message)
        .bind(
            data.discussion_type
                .as_deref()
                .unwrap_or(DEFAULT_DISCUSSION_TYPE),
        )
        .bind(data.parent_id)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, CouncilDiscussion>(r#"SELECT * FROM council_discussions WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Whole thread, oldest first.
    pub async fn find_by_proposal<'e, E>(
        executor: E,
        proposal_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, CouncilDiscussion>(
            r#"SELECT * FROM council_discussions
               WHERE proposal_id = ?1
               ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(proposal_id)
        .fetch_all(executor)
        .await
    }

    /// The `limit` most recent entries, newest first.
    pub async fn find_latest<'e, E>(
        executor: E,
        proposal_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, CouncilDiscussion>(
            r#"SELECT * FROM council_discussions
               WHERE proposal_id = ?1
               ORDER BY created_at DESC, rowid DESC
               LIMIT ?2"#,
        )
        .bind(proposal_id)
        .bind(limit)
        .fetch_all(executor)
        .await
    }
}
