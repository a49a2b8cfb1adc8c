use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{FromRow, SqliteExecutor, SqlitePool, types::Json};
use ts_rs::TS;
use uuid::Uuid;

use super::{empty_as_none, sqlite_timestamp};

/// One entry of the company-wide activity feed. Project and task ids are
/// plain references; the feed outlives the rows it mentions.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub agent_id: Option<String>,
    pub project_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    #[ts(type = "Record<string, unknown>")]
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityLog {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub agent_id: Option<String>,
    pub project_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub metadata: Option<Value>,
}

impl CreateActivityLog {
    pub fn new(activity_type: &str, title: impl Into<String>) -> Self {
        Self {
            activity_type: activity_type.to_string(),
            agent_id: None,
            project_id: None,
            task_id: None,
            title: title.into(),
            description: None,
            metadata: None,
        }
    }

    pub fn agent<S: AsRef<str>>(mut self, agent_id: Option<S>) -> Self {
        self.agent_id = agent_id.map(|a| a.as_ref().to_string());
        self
    }

    pub fn task(mut self, task_id: Uuid, project_id: Option<Uuid>) -> Self {
        self.task_id = Some(task_id);
        self.project_id = project_id;
        self
    }

    pub fn project(mut self, project_id: Option<Uuid>) -> Self {
        self.project_id = project_id;
        self
    }

    pub fn description<S: AsRef<str>>(mut self, description: Option<S>) -> Self {
        self.description = description.map(|d| d.as_ref().to_string());
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[derive(Debug, Default, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFilter {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub agent_id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "empty_as_none")]
    pub activity_type: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
}

impl ActivityLog {
    /// Takes any executor so callers can log inside their own transaction.
    pub async fn create<'e, E>(executor: E, data: &CreateActivityLog) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, ActivityLog>(
            r#"
            INSERT INTO activity_logs (
                id, activity_type, agent_id, project_id, task_id, title, description, metadata
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.activity_type)
        .bind(data.agent_id.as_deref())
        .bind(data.project_id)
        .bind(data.task_id)
        .bind(&data.title)
        .bind(data.description.as_deref())
        .bind(Json(data.metadata.clone().unwrap_or_else(|| json!({}))))
        .fetch_one(executor)
        .await
    }

    /// Newest first; `limit` is already clamped by the caller.
    pub async fn find(
        pool: &SqlitePool,
        filter: &ActivityFilter,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ActivityLog>(
            r#"SELECT * FROM activity_logs
               WHERE (?1 IS NULL OR agent_id = ?1)
                 AND (?2 IS NULL OR activity_type = ?2)
                 AND (?3 IS NULL OR created_at >= ?3)
               ORDER BY created_at DESC, rowid DESC
               LIMIT ?4"#,
        )
        .bind(filter.agent_id.as_deref())
        .bind(filter.activity_type.as_deref())
        .bind(filter.since.map(sqlite_timestamp))
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn count_since(
        pool: &SqlitePool,
        agent_id: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM activity_logs
               WHERE (?1 IS NULL OR agent_id = ?1) AND created_at >= ?2"#,
        )
        .bind(agent_id)
        .bind(sqlite_timestamp(since))
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM activity_logs WHERE id = ?1"#)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
