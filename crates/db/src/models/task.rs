use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{
    Deserialize, Serialize,
    de::{self, IntoDeserializer},
};
use serde_json::Value;
use sqlx::{FromRow, SqlitePool, Type, types::Json};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::{empty_as_none, nullable, project::Project};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Task not found")]
    NotFound,
    #[error("Project not found")]
    ProjectNotFound,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Backlog,
    Progress,
    Blocked,
    Done,
    Recurring,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Backlog,
        TaskStatus::Progress,
        TaskStatus::Blocked,
        TaskStatus::Done,
        TaskStatus::Recurring,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Progress => "progress",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
            TaskStatus::Recurring => "recurring",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = de::value::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::deserialize(s.into_deserializer())
    }
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl FromStr for TaskPriority {
    type Err = de::value::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::deserialize(s.into_deserializer())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub agent_id: Option<String>,
    pub project_id: Option<Uuid>,
    pub cron_job_id: Option<String>,
    pub created_by: Option<String>,
    pub progress: i32,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(type = "string[]")]
    pub tags: Json<Vec<String>>,
    #[ts(type = "Record<string, unknown>")]
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TaskWithProject {
    #[serde(flatten)]
    #[ts(flatten)]
    pub task: Task,
    pub project: Option<Project>,
}

impl std::ops::Deref for TaskWithProject {
    type Target = Task;
    fn deref(&self) -> &Self::Target {
        &self.task
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub agent_id: Option<String>,
    pub project_id: Option<Uuid>,
    pub cron_job_id: Option<String>,
    pub created_by: Option<String>,
    pub progress: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "string | null")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "string | null")]
    pub agent_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "string | null")]
    pub project_id: Option<Option<Uuid>>,
    pub progress: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "string | null")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "string | null")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Default, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilter {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub agent_id: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub project_id: Option<Uuid>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub priority: Option<TaskPriority>,
}

impl Task {
    /// Grouped by status, newest first inside each group.
    pub async fn find_all(pool: &SqlitePool, filter: &TaskFilter) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT * FROM tasks
               WHERE (?1 IS NULL OR status = ?1)
                 AND (?2 IS NULL OR agent_id = ?2)
                 AND (?3 IS NULL OR project_id = ?3)
                 AND (?4 IS NULL OR priority = ?4)
               ORDER BY status ASC, created_at DESC, rowid DESC"#,
        )
        .bind(filter.status)
        .bind(filter.agent_id.as_deref())
        .bind(filter.project_id)
        .bind(filter.priority)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(r#"SELECT * FROM tasks WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn with_project(self, pool: &SqlitePool) -> Result<TaskWithProject, sqlx::Error> {
        let project = match self.project_id {
            Some(project_id) => Project::find_by_id(pool, project_id).await?,
            None => None,
        };
        Ok(TaskWithProject {
            task: self,
            project,
        })
    }

    pub async fn count_by_status(
        pool: &SqlitePool,
        agent_id: Option<&str>,
        project_id: Option<Uuid>,
    ) -> Result<Vec<(TaskStatus, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (TaskStatus, i64)>(
            r#"SELECT status, COUNT(*) FROM tasks
               WHERE (?1 IS NULL OR agent_id = ?1)
                 AND (?2 IS NULL OR project_id = ?2)
               GROUP BY status"#,
        )
        .bind(agent_id)
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateTask) -> Result<Self, TaskError> {
        if let Some(project_id) = data.project_id
            && !Project::exists(pool, project_id).await?
        {
            return Err(TaskError::ProjectNotFound);
        }

        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (
                id, title, description, status, priority, agent_id, project_id,
                cron_job_id, created_by, progress, due_date, tags, metadata
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.title)
        .bind(data.description.as_deref())
        .bind(data.status.unwrap_or(TaskStatus::Backlog))
        .bind(data.priority.unwrap_or(TaskPriority::Medium))
        .bind(data.agent_id.as_deref())
        .bind(data.project_id)
        .bind(data.cron_job_id.as_deref())
        .bind(data.created_by.as_deref())
        .bind(data.progress.unwrap_or(0))
        .bind(data.due_date)
        .bind(Json(data.tags.clone().unwrap_or_default()))
        .bind(Json(
            data.metadata
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default())),
        ))
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Merges `data` over the stored row. Returns the previous and the new
    /// state so callers can react to status transitions.
    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateTask,
    ) -> Result<(Self, Self), TaskError> {
        let current = Self::find_by_id(pool, id).await?.ok_or(TaskError::NotFound)?;

        if let Some(Some(project_id)) = data.project_id
            && !Project::exists(pool, project_id).await?
        {
            return Err(TaskError::ProjectNotFound);
        }

        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET title = ?2, description = ?3, status = ?4, priority = ?5, agent_id = ?6,
                project_id = ?7, progress = ?8, due_date = ?9, completed_at = ?10,
                tags = ?11, metadata = ?12, updated_at = datetime('now', 'subsec')
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.title.as_deref().unwrap_or(&current.title))
        .bind(data.description.clone().unwrap_or(current.description.clone()))
        .bind(data.status.unwrap_or(current.status))
        .bind(data.priority.unwrap_or(current.priority))
        .bind(data.agent_id.clone().unwrap_or(current.agent_id.clone()))
        .bind(data.project_id.unwrap_or(current.project_id))
        .bind(data.progress.unwrap_or(current.progress))
        .bind(data.due_date.unwrap_or(current.due_date))
        .bind(data.completed_at.unwrap_or(current.completed_at))
        .bind(Json(data.tags.clone().unwrap_or(current.tags.0.clone())))
        .bind(Json(
            data.metadata.clone().unwrap_or(current.metadata.0.clone()),
        ))
        .fetch_one(pool)
        .await?;

        Ok((current, task))
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM tasks WHERE id = ?1"#)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
