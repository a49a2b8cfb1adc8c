use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, SqlitePool, types::Json};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::nullable;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Project not found")]
    NotFound,
}

pub const DEFAULT_PROJECT_STATUS: &str = "planned";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    /// Agent handle of the owner.
    pub owner: String,
    pub status: String,
    pub progress: i32,
    pub next_milestone: Option<String>,
    #[ts(type = "string[]")]
    pub blockers: Json<Vec<String>>,
    pub start_date: Option<DateTime<Utc>>,
    pub target_date: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    #[ts(type = "Record<string, unknown>")]
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    pub name: String,
    pub owner: String,
    pub status: Option<String>,
    pub progress: Option<i32>,
    pub next_milestone: Option<String>,
    pub blockers: Option<Vec<String>>,
    pub start_date: Option<DateTime<Utc>>,
    pub target_date: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProject {
    pub status: Option<String>,
    pub progress: Option<i32>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "string | null")]
    pub next_milestone: Option<Option<String>>,
    pub blockers: Option<Vec<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "string | null")]
    pub target_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "string | null")]
    pub completed_date: Option<Option<DateTime<Utc>>>,
}

impl Project {
    /// Most recently updated first.
    pub async fn find_all(
        pool: &SqlitePool,
        status: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"SELECT * FROM projects
               WHERE (?1 IS NULL OR status = ?1)
               ORDER BY updated_at DESC, rowid DESC"#,
        )
        .bind(status)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(r#"SELECT * FROM projects WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
        let found: Option<i64> = sqlx::query_scalar(r#"SELECT 1 FROM projects WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn count(pool: &SqlitePool, status: Option<&str>) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM projects WHERE (?1 IS NULL OR status = ?1)"#,
        )
        .bind(status)
        .fetch_one(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateProject) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (
                id, name, owner, status, progress, next_milestone, blockers,
                start_date, target_date, metadata
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(&data.owner)
        .bind(data.status.as_deref().unwrap_or(DEFAULT_PROJECT_STATUS))
        .bind(data.progress.unwrap_or(0))
        .bind(data.next_milestone.as_deref())
        .bind(Json(data.blockers.clone().unwrap_or_default()))
        .bind(data.start_date)
        .bind(data.target_date)
        .bind(Json(
            data.metadata
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default())),
        ))
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateProject,
    ) -> Result<Self, ProjectError> {
        let current = Self::find_by_id(pool, id)
            .await?
            .ok_or(ProjectError::NotFound)?;

        let project = sqlx::query_as::<_, Project>(
            r#"
            UPDATE projects
            SET status = ?2, progress = ?3, next_milestone = ?4, blockers = ?5,
                target_date = ?6, completed_date = ?7,
                updated_at = datetime('now', 'subsec')
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.status.as_deref().unwrap_or(&current.status))
        .bind(data.progress.unwrap_or(current.progress))
        .bind(data.next_milestone.clone().unwrap_or(current.next_milestone))
        .bind(Json(data.blockers.clone().unwrap_or(current.blockers.0)))
        .bind(data.target_date.unwrap_or(current.target_date))
        .bind(data.completed_date.unwrap_or(current.completed_date))
        .fetch_one(pool)
        .await?;

        Ok(project)
    }

    /// Seed helper keyed on the unique name; an existing project only has
    /// its progress fields refreshed.
    pub async fn upsert(pool: &SqlitePool, data: &CreateProject) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (
                id, name, owner, status, progress, next_milestone, blockers,
                start_date, target_date, metadata
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(name) DO UPDATE SET
                status = excluded.status,
                progress = excluded.progress,
                next_milestone = excluded.next_milestone,
                blockers = excluded.blockers,
                updated_at = datetime('now', 'subsec')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(&data.owner)
        .bind(data.status.as_deref().unwrap_or(DEFAULT_PROJECT_STATUS))
        .bind(data.progress.unwrap_or(0))
        .bind(data.next_milestone.as_deref())
        .bind(Json(data.blockers.clone().unwrap_or_default()))
        .bind(data.start_date)
        .bind(data.target_date)
        .bind(Json(
            data.metadata
                .clone()
                .unwrap_or_else(|| Value::Object(Default::default())),
        ))
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_utils::setup_test_pool;

    fn command_center() -> CreateProject {
        CreateProject {
            name: "Command Center".into(),
            owner: "main".into(),
            status: None,
            progress: None,
            next_milestone: Some("MVP Dashboard".into()),
            blockers: None,
            start_date: None,
            target_date: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let pool = setup_test_pool().await;
        let project = Project::create(&pool, &command_center()).await.unwrap();
        assert_eq!(project.status, DEFAULT_PROJECT_STATUS);
        assert_eq!(project.progress, 0);
        assert!(project.blockers.0.is_empty());
        assert!(Project::exists(&pool, project.id).await.unwrap());
    }

    #[tokio::test]
    async fn update_moves_to_top_of_list() {
        let pool = setup_test_pool().await;
        let first = Project::create(&pool, &command_center()).await.unwrap();
        let mut other = command_center();
        other.name = "AgentShield".into();
        Project::create(&pool, &other).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let updated = Project::update(
            &pool,
            first.id,
            &UpdateProject {
                status: Some("in_progress".into()),
                progress: Some(35),
                next_milestone: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.progress, 35);
        assert_eq!(updated.next_milestone, None);

        let all = Project::find_all(&pool, None).await.unwrap();
        assert_eq!(all[0].id, first.id);
        let in_progress = Project::find_all(&pool, Some("in_progress")).await.unwrap();
        assert_eq!(in_progress.len(), 1);
        assert_eq!(Project::count(&pool, Some("planned")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_missing_project() {
        let pool = setup_test_pool().await;
        let result = Project::update(&pool, Uuid::new_v4(), &UpdateProject::default()).await;
        assert!(matches!(result, Err(ProjectError::NotFound)));
    }
}
