use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, SqliteExecutor, SqlitePool, types::Json};
use ts_rs::TS;
use uuid::Uuid;

/// Append-only snapshot written whenever an agent's status fields change.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistory {
    pub id: Uuid,
    pub agent_status_id: Uuid,
    pub agent_id: String,
    pub status: String,
    pub current_task: Option<String>,
    pub progress: Option<i32>,
    #[ts(type = "string[]")]
    pub blockers: Json<Vec<String>>,
    #[ts(type = "Record<string, unknown>")]
    pub metadata: Json<Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateStatusHistory {
    pub agent_status_id: Uuid,
    pub agent_id: String,
    pub status: String,
    pub current_task: Option<String>,
    pub progress: Option<i32>,
    pub blockers: Vec<String>,
    pub metadata: Value,
}

impl StatusHistory {
    pub async fn create<'e, E>(executor: E, data: &CreateStatusHistory) -> Result<Self, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as::<_, StatusHistory>(
            r#"
            INSERT INTO status_history (
                id, agent_status_id, agent_id, status, current_task, progress, blockers, metadata
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(data.agent_status_id)
        .bind(&data.agent_id)
        .bind(&data.status)
        .bind(data.current_task.as_deref())
        .bind(data.progress)
        .bind(Json(&data.blockers))
        .bind(Json(&data.metadata))
        .fetch_one(executor)
        .await
    }

    /// Newest first.
    pub async fn find_by_agent_id(
        pool: &SqlitePool,
        agent_id: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, StatusHistory>(
            r#"SELECT * FROM status_history
               WHERE agent_id = ?1
               ORDER BY timestamp DESC, rowid DESC
               LIMIT ?2"#,
        )
        .bind(agent_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Newest first.
    pub async fn find_by_agent_status(
        pool: &SqlitePool,
        agent_status_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, StatusHistory>(
            r#"SELECT * FROM status_history
               WHERE agent_status_id = ?1
               ORDER BY timestamp DESC, rowid DESC
               LIMIT ?2"#,
        )
        .bind(agent_status_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        agent_status::AgentStatus,
        test_utils::{report_for, setup_test_pool},
    };

    #[tokio::test]
    async fn history_is_limited_and_newest_first() {
        let pool = setup_test_pool().await;
        for status in ["idle", "working", "blocked", "done"] {
            AgentStatus::report(&pool, &report_for("main", status))
                .await
                .unwrap();
        }

        let history = StatusHistory::find_by_agent_id(&pool, "main", 3).await.unwrap();
        let statuses: Vec<_> = history.iter().map(|h| h.status.as_str()).collect();
        assert_eq!(statuses, vec!["done", "blocked", "working"]);
    }

    #[tokio::test]
    async fn history_is_removed_with_agent() {
        let pool = setup_test_pool().await;
        let agent = AgentStatus::report(&pool, &report_for("main", "idle"))
            .await
            .unwrap();
        assert_eq!(AgentStatus::delete(&pool, agent.id).await.unwrap(), 1);

        let history = StatusHistory::find_by_agent_id(&pool, "main", 10).await.unwrap();
        assert!(history.is_empty());
    }
}
