use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use chrono::Utc;
use db::models::stats::{AgentStats, CompanyStats, ProjectStats};
use deployment::Deployment;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::Data;
use crate::{DeploymentImpl, error::ApiError, extract::PathParam};

pub async fn company_stats(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Data<CompanyStats>>>, ApiError> {
    let stats = CompanyStats::compute(&deployment.db().pool, Utc::now()).await?;
    Ok(ResponseJson(ApiResponse::success(Data::new(stats))))
}

pub async fn agent_stats(
    State(deployment): State<DeploymentImpl>,
    PathParam(agent_id): PathParam<String>,
) -> Result<ResponseJson<ApiResponse<Data<AgentStats>>>, ApiError> {
    let stats = AgentStats::compute(&deployment.db().pool, &agent_id).await?;
    Ok(ResponseJson(ApiResponse::success(Data::new(stats))))
}

pub async fn project_stats(
    State(deployment): State<DeploymentImpl>,
    PathParam(project_id): PathParam<Uuid>,
) -> Result<ResponseJson<ApiResponse<Data<ProjectStats>>>, ApiError> {
    let stats = ProjectStats::compute(&deployment.db().pool, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(Data::new(stats))))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/company", get(company_stats))
        .route("/agent/{id}", get(agent_stats))
        .route("/project/{id}", get(project_stats))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::{get, patch, post, test_app};

    #[tokio::test]
    async fn company_and_project_stats_follow_tasks() {
        let (app, _) = test_app().await;
        let (_, body) = post(&app, "/api/projects", json!({ "name": "Launch", "owner": "lumi" })).await;
        let project_id = body["project"]["id"].as_str().unwrap().to_string();

        let mut ids = Vec::new();
        for title in ["a", "b", "c", "d"] {
            let (_, body) = post(
                &app,
                "/api/tasks",
                json!({ "title": title, "projectId": project_id, "agentId": "lumi" }),
            )
            .await;
            ids.push(body["data"]["id"].as_str().unwrap().to_string());
        }
        patch(&app, &format!("/api/tasks/{}", ids[0]), json!({ "status": "done" })).await;
        patch(&app, &format!("/api/tasks/{}", ids[1]), json!({ "status": "progress" })).await;
        patch(&app, &format!("/api/tasks/{}", ids[2]), json!({ "status": "blocked" })).await;

        let (status, body) = get(&app, "/api/stats/company").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 4);
        assert_eq!(body["data"]["completed"], 1);
        assert_eq!(body["data"]["inProgress"], 1);
        assert_eq!(body["data"]["completion"], 25);
        assert_eq!(body["data"]["tasksThisWeek"], 4);

        let (_, body) = get(&app, &format!("/api/stats/project/{project_id}")).await;
        assert_eq!(body["data"]["totalTasks"], 4);
        assert_eq!(body["data"]["completedTasks"], 1);
        // backlog + progress
        assert_eq!(body["data"]["activeTasks"], 2);

        let (_, body) = get(&app, "/api/stats/agent/lumi").await;
        assert_eq!(body["data"]["tasksCompleted"], 1);
        assert_eq!(body["data"]["projectsOwned"], 1);
        assert!(body["data"]["lastActivity"].is_string());
    }

    #[tokio::test]
    async fn unknown_agent_has_empty_stats() {
        let (app, _) = test_app().await;
        let (status, body) = get(&app, "/api/stats/agent/ghost").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["tasksCompleted"], 0);
        assert!(body["data"]["lastActivity"].is_null());
    }
}
