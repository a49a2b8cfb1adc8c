use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::nullable;

#[derive(Debug, Error)]
pub enum DepartmentError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Department not found")]
    NotFound,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub location: String,
    pub head_agent_id: Option<String>,
    pub agent_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepartment {
    pub name: String,
    pub description: Option<String>,
    pub location: String,
    pub head_agent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDepartment {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "string | null")]
    pub description: Option<Option<String>>,
    pub location: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    #[ts(optional, type = "string | null")]
    pub head_agent_id: Option<Option<String>>,
    pub agent_count: Option<i32>,
}

impl Department {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Department>(r#"SELECT * FROM departments ORDER BY name ASC"#)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Department>(r#"SELECT * FROM departments WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Department>(r#"SELECT * FROM departments WHERE name = ?1"#)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateDepartment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Department>(
            r#"
            INSERT INTO departments (id, name, description, location, head_agent_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(data.description.as_deref())
        .bind(&data.location)
        .bind(data.head_agent_id.as_deref())
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        id: Uuid,
        data: &UpdateDepartment,
    ) -> Result<Self, DepartmentError> {
        let current = Self::find_by_id(pool, id)
            .await?
            .ok_or(DepartmentError::NotFound)?;

        let department = sqlx::query_as::<_, Department>(
            r#"
            UPDATE departments
            SET name = ?2, description = ?3, location = ?4, head_agent_id = ?5,
                agent_count = ?6, updated_at = datetime('now', 'subsec')
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.name.as_deref().unwrap_or(&current.name))
        .bind(data.description.clone().unwrap_or(current.description))
        .bind(data.location.as_deref().unwrap_or(&current.location))
        .bind(data.head_agent_id.clone().unwrap_or(current.head_agent_id))
        .bind(data.agent_count.unwrap_or(current.agent_count))
        .fetch_one(pool)
        .await?;

        Ok(department)
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(r#"DELETE FROM departments WHERE id = ?1"#)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Seed helper keyed on the unique name.
    pub async fn upsert(pool: &SqlitePool, data: &CreateDepartment) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Department>(
            r#"
            INSERT INTO departments (id, name, description, location, head_agent_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(name) DO UPDATE SET
                description = excluded.description,
                location = excluded.location,
                head_agent_id = excluded.head_agent_id,
                updated_at = datetime('now', 'subsec')
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&data.name)
        .bind(data.description.as_deref())
        .bind(&data.location)
        .bind(data.head_agent_id.as_deref())
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_utils::setup_test_pool;

    fn engineering() -> CreateDepartment {
        CreateDepartment {
            name: "Engineering".into(),
            description: Some("Software Engineering".into()),
            location: "Luna Labs VPS".into(),
            head_agent_id: Some("ethan-engineering".into()),
        }
    }

    #[tokio::test]
    async fn upsert_keeps_identity() {
        let pool = setup_test_pool().await;
        let first = Department::upsert(&pool, &engineering()).await.unwrap();

        let mut changed = engineering();
        changed.location = "Mac Studio HQ".into();
        let second = Department::upsert(&pool, &changed).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.location, "Mac Studio HQ");
        assert_eq!(Department::find_all(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_name_is_unique_violation() {
        let pool = setup_test_pool().await;
        Department::create(&pool, &engineering()).await.unwrap();
        let err = Department::create(&pool, &engineering()).await.unwrap_err();
        let is_unique = err
            .as_database_error()
            .is_some_and(|e| e.is_unique_violation());
        assert!(is_unique);
    }

    #[tokio::test]
    async fn update_clears_nullable_fields() {
        let pool = setup_test_pool().await;
        let dept = Department::create(&pool, &engineering()).await.unwrap();

        let updated = Department::update(
            &pool,
            dept.id,
            &UpdateDepartment {
                head_agent_id: Some(None),
                agent_count: Some(4),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.head_agent_id, None);
        assert_eq!(updated.agent_count, 4);
        assert_eq!(updated.description.as_deref(), Some("Software Engineering"));
    }
}
