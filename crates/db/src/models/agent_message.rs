use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, SqlitePool, types::Json};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::empty_as_none;

#[derive(Debug, Error)]
pub enum AgentMessageError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Message not found")]
    NotFound,
}

pub type Reactions = BTreeMap<String, Vec<String>>;

/// A message between agents. `to_agent_id == None` is a broadcast.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    pub id: Uuid,
    pub from_agent_id: String,
    pub to_agent_id: Option<String>,
    pub message: String,
    pub message_type: String,
    pub priority: String,
    pub thread_id: Option<String>,
    #[ts(type = "string[]")]
    pub mentions: Json<Vec<String>>,
    #[ts(type = "unknown[]")]
    pub attachments: Json<Vec<Value>>,
    pub parent_message_id: Option<Uuid>,
    #[ts(type = "string[]")]
    pub read_by: Json<Vec<String>>,
    #[ts(type = "Record<string, string[]>")]
    pub reactions: Json<Reactions>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentMessage {
    pub from_agent_id: String,
    pub to_agent_id: Option<String>,
    pub message: String,
    pub message_type: Option<String>,
    pub priority: Option<String>,
    pub thread_id: Option<String>,
    pub mentions: Option<Vec<String>>,
    pub attachments: Option<Vec<Value>>,
    pub parent_message_id: Option<Uuid>,
}

#[derive(Debug, Default, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct MessageFilter {
    #[serde(rename = "type", default, deserialize_with = "empty_as_none")]
    pub message_type: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub priority: Option<String>,
}

/// A page of messages plus the number of rows matching the filter.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<AgentMessage>,
    pub total: i64,
}

const INBOX_CONDITION: &str = r#"
    (to_agent_id = ?1
     OR to_agent_id IS NULL
     OR EXISTS (SELECT 1 FROM json_each(agent_messages.mentions) WHERE value = ?1))
"#;

const UNREAD_CONDITION: &str =
    r#"NOT EXISTS (SELECT 1 FROM json_each(agent_messages.read_by) WHERE value = ?1)"#;

impl AgentMessage {
    pub fn is_read_by(&self, agent_id: &str) -> bool {
        self.read_by.0.iter().any(|a| a == agent_id)
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgentMessage>(r#"SELECT * FROM agent_messages WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateAgentMessage) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AgentMessage>(
            r#"
            INSERT INTO agent_messages (
                id, from_agent_id, to_agent_id, message, message_type, priority,
                thread_id, mentions, attachments, parent_message_id
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.from_agent_id)
        .bind(data.to_agent_id.as_deref())
        .bind(&data.message)
        .bind(data.message_type.as_deref().unwrap_or("message"))
        .bind(data.priority.as_deref().unwrap_or("normal"))
        .bind(data.thread_id.as_deref())
        .bind(Json(data.mentions.clone().unwrap_or_default()))
        .bind(Json(data.attachments.clone().unwrap_or_default()))
        .bind(data.parent_message_id)
        .fetch_one(pool)
        .await
    }

    /// Company feed, newest first.
    pub async fn find_all(
        pool: &SqlitePool,
        filter: &MessageFilter,
        limit: i64,
        offset: i64,
    ) -> Result<MessagePage, sqlx::Error> {
        let messages = sqlx::query_as::<_, AgentMessage>(
            r#"SELECT * FROM agent_messages
               WHERE (?1 IS NULL OR message_type = ?1)
                 AND (?2 IS NULL OR priority = ?2)
               ORDER BY created_at DESC, rowid DESC
               LIMIT ?3 OFFSET ?4"#,
        )
        .bind(filter.message_type.as_deref())
        .bind(filter.priority.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM agent_messages
               WHERE (?1 IS NULL OR message_type = ?1)
                 AND (?2 IS NULL OR priority = ?2)"#,
        )
        .bind(filter.message_type.as_deref())
        .bind(filter.priority.as_deref())
        .fetch_one(pool)
        .await?;
        Ok(MessagePage { messages, total })
    }

    /// Messages addressed to the agent, broadcast, or mentioning it.
    pub async fn inbox(
        pool: &SqlitePool,
        agent_id: &str,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<MessagePage, sqlx::Error> {
        let condition = if unread_only {
            format!("{INBOX_CONDITION} AND {UNREAD_CONDITION}")
        } else {
            INBOX_CONDITION.to_string()
        };

        let messages = sqlx::query_as::<_, AgentMessage>(&format!(
            "SELECT * FROM agent_messages WHERE {condition} \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
        ))
        .bind(agent_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM agent_messages WHERE {condition}"))
                .bind(agent_id)
                .fetch_one(pool)
                .await?;
        Ok(MessagePage { messages, total })
    }

    /// Unread inbox messages across all pages.
    pub async fn unread_count(pool: &SqlitePool, agent_id: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM agent_messages WHERE {INBOX_CONDITION} AND {UNREAD_CONDITION}"
        ))
        .bind(agent_id)
        .fetch_one(pool)
        .await
    }

    pub async fn outbox(
        pool: &SqlitePool,
        agent_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<MessagePage, sqlx::Error> {
        let messages = sqlx::query_as::<_, AgentMessage>(
            r#"SELECT * FROM agent_messages
               WHERE from_agent_id = ?1
               ORDER BY created_at DESC, rowid DESC
               LIMIT ?2 OFFSET ?3"#,
        )
        .bind(agent_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM agent_messages WHERE from_agent_id = ?1"#,
        )
        .bind(agent_id)
        .fetch_one(pool)
        .await?;
        Ok(MessagePage { messages, total })
    }

    /// Oldest first.
    pub async fn thread(pool: &SqlitePool, thread_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgentMessage>(
            r#"SELECT * FROM agent_messages
               WHERE thread_id = ?1
               ORDER BY created_at ASC, rowid ASC"#,
        )
        .bind(thread_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count_sent_since(
        pool: &SqlitePool,
        agent_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM agent_messages
               WHERE from_agent_id = ?1 AND created_at >= ?2"#,
        )
        .bind(agent_id)
        .bind(super::sqlite_timestamp(since))
        .fetch_one(pool)
        .await
    }

    /// Adds the agent to `read_by` once; repeated calls are no-ops.
    pub async fn mark_read(
        pool: &SqlitePool,
        id: Uuid,
        agent_id: &str,
    ) -> Result<(), AgentMessageError> {
        let result = sqlx::query(
            r#"UPDATE agent_messages
               SET read_by = json_insert(read_by, '$[#]', ?2)
               WHERE id = ?1
                 AND NOT EXISTS (SELECT 1 FROM json_each(agent_messages.read_by) WHERE value = ?2)"#,
        )
        .bind(id)
        .bind(agent_id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 && Self::find_by_id(pool, id).await?.is_none() {
            return Err(AgentMessageError::NotFound);
        }
        Ok(())
    }

    /// Records `agent_id` under `emoji` and returns the full reaction map.
    pub async fn react(
        pool: &SqlitePool,
        id: Uuid,
        agent_id: &str,
        emoji: &str,
    ) -> Result<Reactions, AgentMessageError> {
        let mut tx = pool.begin().await?;
        let Json(mut reactions): Json<Reactions> =
            sqlx::query_scalar(r#"SELECT reactions FROM agent_messages WHERE id = ?1"#)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(AgentMessageError::NotFound)?;

        let agents = reactions.entry(emoji.to_string()).or_default();
        if !agents.iter().any(|a| a == agent_id) {
            agents.push(agent_id.to_string());
            sqlx::query(r#"UPDATE agent_messages SET reactions = ?2 WHERE id = ?1"#)
                .bind(id)
                .bind(Json(&reactions))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(reactions)
    }
}
