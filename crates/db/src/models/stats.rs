use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use ts_rs::TS;
use uuid::Uuid;

use super::{
    agent_status::AgentStatus,
    sqlite_timestamp,
    task::{Task, TaskStatus},
};

const ACTIVE_AGENT_STATUSES: [&str; 2] = ["active", "working"];

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct CompanyStats {
    pub tasks_this_week: i64,
    pub in_progress: i64,
    pub total: i64,
    pub completed: i64,
    /// Whole percent of tasks done.
    pub completion: i64,
    pub active_agents: i64,
    pub active_projects: i64,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub tasks_completed: i64,
    pub tasks_active: i64,
    pub last_activity: Option<DateTime<Utc>>,
    pub projects_owned: i64,
}

#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub active_tasks: i64,
    pub completion: i64,
}

pub fn completion_percent(completed: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    (completed as f64 / total as f64 * 100.0).round() as i64
}

/// Per-status counts with missing statuses read as zero.
struct StatusCounts(Vec<(TaskStatus, i64)>);

impl StatusCounts {
    fn get(&self, status: TaskStatus) -> i64 {
        self.0
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    fn total(&self) -> i64 {
        self.0.iter().map(|(_, n)| n).sum()
    }

    /// Work that is queued or underway.
    fn active(&self) -> i64 {
        self.get(TaskStatus::Backlog) + self.get(TaskStatus::Progress)
    }
}

impl CompanyStats {
    pub async fn compute(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Self, sqlx::Error> {
        let counts = StatusCounts(Task::count_by_status(pool, None, None).await?);

        let tasks_this_week = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM tasks WHERE created_at >= ?1"#,
        )
        .bind(sqlite_timestamp(now - Duration::days(7)))
        .fetch_one(pool)
        .await?;

        let active_agents = AgentStatus::count_with_status_in(pool, &ACTIVE_AGENT_STATUSES).await?;

        let active_projects = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM projects WHERE status IN ('active', 'in_progress')"#,
        )
        .fetch_one(pool)
        .await?;

        let total = counts.total();
        let completed = counts.get(TaskStatus::Done);
        Ok(Self {
            tasks_this_week,
            in_progress: counts.get(TaskStatus::Progress),
            total,
            completed,
            completion: completion_percent(completed, total),
            active_agents,
            active_projects,
        })
    }
}

impl AgentStats {
    pub async fn compute(pool: &SqlitePool, agent_id: &str) -> Result<Self, sqlx::Error> {
        let counts = StatusCounts(Task::count_by_status(pool, Some(agent_id), None).await?);

        let last_activity = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"SELECT created_at FROM activity_logs
               WHERE agent_id = ?1
               ORDER BY created_at DESC
               LIMIT 1"#,
        )
        .bind(agent_id)
        .fetch_optional(pool)
        .await?;

        let projects_owned =
            sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM projects WHERE owner = ?1"#)
                .bind(agent_id)
                .fetch_one(pool)
                .await?;

        Ok(Self {
            tasks_completed: counts.get(TaskStatus::Done),
            tasks_active: counts.active(),
            last_activity,
            projects_owned,
        })
    }
}

impl ProjectStats {
    pub async fn compute(pool: &SqlitePool, project_id: Uuid) -> Result<Self, sqlx::Error> {
        let counts = StatusCounts(Task::count_by_status(pool, None, Some(project_id)).await?);
        let total_tasks = counts.total();
        let completed_tasks = counts.get(TaskStatus::Done);
        Ok(Self {
            total_tasks,
            completed_tasks,
            active_tasks: counts.active(),
            completion: completion_percent(completed_tasks, total_tasks),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        activity::{ActivityLog, CreateActivityLog},
        project::{CreateProject, Project},
        task::{CreateTask, Task, TaskStatus},
        test_utils::{report_for, setup_test_pool},
    };

    fn task(title: &str, status: TaskStatus, agent: &str, project_id: Option<Uuid>) -> CreateTask {
        CreateTask {
            title: title.to_string(),
            description: None,
            status: Some(status),
            priority: None,
            agent_id: Some(agent.to_string()),
            project_id,
            cron_job_id: None,
            created_by: None,
            progress: None,
            due_date: None,
            tags: None,
            metadata: None,
        }
    }

    #[test]
    fn completion_rounds_to_whole_percent() {
        assert_eq!(completion_percent(0, 0), 0);
        assert_eq!(completion_percent(1, 3), 33);
        assert_eq!(completion_percent(2, 3), 67);
        assert_eq!(completion_percent(4, 4), 100);
    }

    #[tokio::test]
    async fn company_agent_and_project_stats() {
        let pool = setup_test_pool().await;
        let project = Project::create(
            &pool,
            &CreateProject {
                name: "AgentShield".into(),
                owner: "main".into(),
                status: Some("in_progress".into()),
                progress: None,
                next_milestone: None,
                blockers: None,
                start_date: None,
                target_date: None,
                metadata: None,
            },
        )
        .await
        .unwrap();

        for (title, status) in [
            ("a", TaskStatus::Done),
            ("b", TaskStatus::Progress),
            ("c", TaskStatus::Backlog),
            ("d", TaskStatus::Blocked),
        ] {
            Task::create(&pool, &task(title, status, "main", Some(project.id)))
                .await
                .unwrap();
        }
        AgentStatus::report(&pool, &report_for("main", "working"))
            .await
            .unwrap();
        ActivityLog::create(&pool, &CreateActivityLog::new("system", "hi").agent(Some("main")))
            .await
            .unwrap();

        let company = CompanyStats::compute(&pool, Utc::now()).await.unwrap();
        assert_eq!(company.total, 4);
        assert_eq!(company.tasks_this_week, 4);
        assert_eq!(company.in_progress, 1);
        assert_eq!(company.completion, 25);
        assert_eq!(company.active_agents, 1);
        assert_eq!(company.active_projects, 1);

        let agent = AgentStats::compute(&pool, "main").await.unwrap();
        assert_eq!(agent.tasks_completed, 1);
        assert_eq!(agent.tasks_active, 2);
        assert_eq!(agent.projects_owned, 1);
        assert!(agent.last_activity.is_some());

        let project_stats = ProjectStats::compute(&pool, project.id).await.unwrap();
        assert_eq!(project_stats.total_tasks, 4);
        assert_eq!(project_stats.active_tasks, 2);
        assert_eq!(project_stats.completion, 25);
    }
}
