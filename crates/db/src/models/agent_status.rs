use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, SqlitePool, types::Json};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    empty_as_none, nullable,
    status_history::{CreateStatusHistory, StatusHistory},
};

#[derive(Debug, Error)]
pub enum AgentStatusError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Agent not found")]
    NotFound,
    #[error("Agent '{0}' already exists")]
    AlreadyExists(String),
}

pub const DEFAULT_EMOJI: &str = "🤖";
pub const DEFAULT_STATUS: &str = "idle";
pub const UNASSIGNED_DEPARTMENT: &str = "Unassigned";

/// Live status card of one agent. `agent_id` is the stable handle agents
/// report under (`"main"`, `"lumi"`); `id` is the row identity.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub id: Uuid,
    pub agent_id: String,
    pub name: String,
    pub role: String,
    pub emoji: String,
    pub department: Option<String>,
    pub location: String,
    pub status: String,
    pub current_task: Option<String>,
    pub progress: Option<i32>,
    #[ts(type = "string[]")]
    pub blockers: Json<Vec<String>>,
    #[ts(type = "Record<string, unknown>")]
    pub metadata: Json<Value>,
    pub last_update: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusWithHistory {
    #[serde(flatten)]
    #[ts(flatten)]
    pub agent: AgentStatus,
    pub status_history: Vec<StatusHistory>,
}

/// Body of `POST /api/status`: an agent reporting in. Creates the card on
/// first report; later reports only move the status fields.
#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ReportAgentStatus {
    pub agent_id: String,
    pub name: String,
    pub role: String,
    pub emoji: String,
    pub department: Option<String>,
    pub location: String,
    pub status: String,
    pub current_task: Option<String>,
    pub progress: Option<i32>,
    pub blockers: Option<Vec<String>>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentStatus {
    pub agent_id: String,
    pub name: String,
    pub role: String,
    pub emoji: Option<String>,
    pub department: Option<String>,
    pub location: String,
    pub status: Option<String>,
    pub current_task: Option<String>,
    pub progress: Option<i32>,
    pub blockers: Option<Vec<String>>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAgentStatus {
    pub name: Option<String>,
    pub role: Option<String>,
    pub emoji: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "string | null")]
    pub department: Option<Option<String>>,
    pub location: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "string | null")]
    pub current_task: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "number | null")]
    pub progress: Option<Option<i32>>,
    pub blockers: Option<Vec<String>>,
    pub metadata: Option<Value>,
}

impl UpdateAgentStatus {
    /// Whether the update touches fields tracked in the status history.
    pub fn touches_status(&self) -> bool {
        self.status.is_some()
            || self.current_task.is_some()
            || self.progress.is_some()
            || self.blockers.is_some()
    }
}

#[derive(Debug, Default, Clone, Deserialize, TS)]
pub struct AgentStatusFilter {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub department: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum AgentOrder {
    /// Most recently updated first (status board).
    LastUpdate,
    /// Alphabetical (agent directory).
    Name,
}

impl AgentStatus {
    pub async fn find_all(
        pool: &SqlitePool,
        filter: &AgentStatusFilter,
        order: AgentOrder,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let order_by = match order {
            AgentOrder::LastUpdate => "last_update DESC, rowid DESC",
            AgentOrder::Name => "name ASC",
        };
        let sql = format!(
            r#"SELECT * FROM agent_statuses
               WHERE (?1 IS NULL OR department = ?1)
                 AND (?2 IS NULL OR status = ?2)
                 AND (?3 IS NULL OR location = ?3)
               ORDER BY {order_by}"#
        );
        sqlx::query_as::<_, AgentStatus>(&sql)
            .bind(filter.department.as_deref())
            .bind(filter.status.as_deref())
            .bind(filter.location.as_deref())
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgentStatus>(r#"SELECT * FROM agent_statuses WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_agent_id(
        pool: &SqlitePool,
        agent_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgentStatus>(r#"SELECT * FROM agent_statuses WHERE agent_id = ?1"#)
            .bind(agent_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_department(
        pool: &SqlitePool,
        department: &str,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgentStatus>(
            r#"SELECT * FROM agent_statuses WHERE department = ?1 ORDER BY name ASC"#,
        )
        .bind(department)
        .fetch_all(pool)
        .await
    }

    /// Agent counts keyed by department name (agents without one are skipped).
    pub async fn count_by_department(
        pool: &SqlitePool,
    ) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (String, i64)>(
            r#"SELECT department, COUNT(*) FROM agent_statuses
               WHERE department IS NOT NULL
               GROUP BY department"#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn count_with_status_in(
        pool: &SqlitePool,
        statuses: &[&str],
    ) -> Result<i64, sqlx::Error> {
        let statuses = serde_json::to_string(statuses).unwrap_or_else(|_| "[]".to_string());
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM agent_statuses
               WHERE status IN (SELECT value FROM json_each(?1))"#,
        )
        .bind(statuses)
        .fetch_one(pool)
        .await
    }

    pub async fn with_history(
        self,
        pool: &SqlitePool,
        limit: i64,
    ) -> Result<AgentStatusWithHistory, sqlx::Error> {
        let status_history = StatusHistory::find_by_agent_status(pool, self.id, limit).await?;
        Ok(AgentStatusWithHistory {
            agent: self,
            status_history,
        })
    }

    /// Upserts the card for `data.agent_id` and appends a history row in one
    /// transaction.
    pub async fn report(pool: &SqlitePool, data: &ReportAgentStatus) -> Result<Self, sqlx::Error> {
        let blockers = data.blockers.clone().unwrap_or_default();
        let metadata = data.metadata.clone().unwrap_or_else(|| Value::Object(Default::default()));

        let mut tx = pool.begin().await?;
        let agent = sqlx::query_as::<_, AgentStatus>(
            r#"
            INSERT INTO agent_statuses (
                id, agent_id, name, role, emoji, department, location,
                status, current_task, progress, blockers, metadata
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(agent_id) DO UPDATE SET
                status = excluded.status,
                current_task = excluded.current_task,
                progress = excluded.progress,
                blockers = excluded.blockers,
                metadata = excluded.metadata,
                last_update = datetime('now', 'subsec')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.agent_id)
        .bind(&data.name)
        .bind(&data.role)
        .bind(&data.emoji)
        .bind(data.department.as_deref())
        .bind(&data.location)
        .bind(&data.status)
        .bind(data.current_task.as_deref())
        .bind(data.progress)
        .bind(Json(&blockers))
        .bind(Json(&metadata))
        .fetch_one(&mut *tx)
        .await?;

        StatusHistory::create(
            &mut *tx,
            &CreateStatusHistory {
                agent_status_id: agent.id,
                agent_id: agent.agent_id.clone(),
                status: data.status.clone(),
                current_task: data.current_task.clone(),
                progress: data.progress,
                blockers,
                metadata,
            },
        )
        .await?;
        tx.commit().await?;

        Ok(agent)
    }

    pub async fn create(
        pool: &SqlitePool,
        data: &CreateAgentStatus,
    ) -> Result<Self, AgentStatusError> {
        if Self::find_by_agent_id(pool, &data.agent_id).await?.is_some() {
            return Err(AgentStatusError::AlreadyExists(data.agent_id.clone()));
        }

        let agent = sqlx::query_as::<_, AgentStatus>(
            r#"
            INSERT INTO agent_statuses (
                id, agent_id, name, role, emoji, department, location,
                status, current_task, progress, blockers, metadata
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.agent_id)
        .bind(&data.name)
        .bind(&data.role)
        .bind(data.emoji.as_deref().unwrap_or(DEFAULT_EMOJI))
        .bind(data.department.as_deref())
        .bind(&data.location)
        .bind(data.status.as_deref().unwrap_or(DEFAULT_STATUS))
        .bind(data.current_task.as_deref())
        .bind(data.progress.unwrap_or(0))
        .bind(Json(data.blockers.clone().unwrap_or_default()))
        .bind(Json(
            data.metadata
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default())),
        ))
        .fetch_one(pool)
        .await?;

        Ok(agent)
    }

    /// Applies a partial update. A history row is appended when the update
    /// touches status, current task, progress or blockers.
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateAgentStatus,
    ) -> Result<Self, AgentStatusError> {
        let current = Self::find_by_id(pool, id)
            .await?
            .ok_or(AgentStatusError::NotFound)?;

        let name = data.name.clone().unwrap_or(current.name);
        let role = data.role.clone().unwrap_or(current.role);
        let emoji = data.emoji.clone().unwrap_or(current.emoji);
        let department = data.department.clone().unwrap_or(current.department);
        let location = data.location.clone().unwrap_or(current.location);
        let status = data.status.clone().unwrap_or(current.status);
        let current_task = data.current_task.clone().unwrap_or(current.current_task);
        let progress = data.progress.unwrap_or(current.progress);
        let blockers = data.blockers.clone().unwrap_or(current.blockers.0);
        let metadata = data.metadata.clone().unwrap_or(current.metadata.0);

        let mut tx = pool.begin().await?;
        let agent = sqlx::query_as::<_, AgentStatus>(
            r#"
            UPDATE agent_statuses
            SET name = ?2, role = ?3, emoji = ?4, department = ?5, location = ?6,
                status = ?7, current_task = ?8, progress = ?9, blockers = ?10,
                metadata = ?11, last_update = datetime('now', 'subsec')
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&name)
        .bind(&role)
        .bind(&emoji)
        .bind(department.as_deref())
        .bind(&location)
        .bind(&status)
        .bind(current_task.as_deref())
        .bind(progress)
        .bind(Json(&blockers))
        .bind(Json(&metadata))
        .fetch_one(&mut *tx)
        .await?;

        if data.touches_status() {
            StatusHistory::create(
                &mut *tx,
                &CreateStatusHistory {
                    agent_status_id: agent.id,
                    agent_id: agent.agent_id.clone(),
                    status,
                    current_task,
                    progress,
                    blockers,
                    metadata: data
                        .metadata
                        .clone()
                        .unwrap_or_else(|| Value::Object(Default::default())),
                },
            )
            .await?;
        }
        tx.commit().await?;

        Ok(agent)
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM agent_statuses WHERE id = ?1"#)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Seed helper: inserts the card if missing, otherwise only resets the
    /// status.
    pub async fn ensure(pool: &SqlitePool, data: &CreateAgentStatus) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO agent_statuses (id, agent_id, name, role, emoji, department, location, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(agent_id) DO UPDATE SET
                status = excluded.status,
                last_update = datetime('now', 'subsec')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.agent_id)
        .bind(&data.name)
        .bind(&data.role)
        .bind(data.emoji.as_deref().unwrap_or(DEFAULT_EMOJI))
        .bind(data.department.as_deref())
        .bind(&data.location)
        .bind(data.status.as_deref().unwrap_or(DEFAULT_STATUS))
        .execute(pool)
        .await?;
        Ok(())
    }
}
