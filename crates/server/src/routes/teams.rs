use std::collections::HashMap;

use axum::{Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::{agent_status::AgentStatus, department::Department};
use deployment::Deployment;
use serde::Serialize;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, extract::PathParam};

#[derive(Debug, Serialize)]
pub struct TeamList {
    pub departments: Vec<Department>,
}

#[derive(Debug, Serialize)]
pub struct Team {
    pub department: Department,
    pub agents: Vec<AgentStatus>,
}

/// Departments with `agentCount` replaced by the number of agents currently
/// assigned to them.
pub async fn get_teams(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<TeamList>>, ApiError> {
    let pool = &deployment.db().pool;
    let counts: HashMap<String, i64> = AgentStatus::count_by_department(pool)
        .await?
        .into_iter()
        .collect();

    let departments = Department::find_all(pool)
        .await?
        .into_iter()
        .map(|mut department| {
            let live = counts.get(&department.name).copied().unwrap_or(0);
            department.agent_count = i32::try_from(live).unwrap_or(i32::MAX);
            department
        })
        .collect();

    Ok(ResponseJson(ApiResponse::success(TeamList { departments })))
}

pub async fn get_team(
    State(deployment): State<DeploymentImpl>,
    PathParam(name): PathParam<String>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let pool = &deployment.db().pool;
    let department = Department::find_by_name(pool, &name)
        .await?
        .ok_or_else(|| ApiError::NotFound("Department not found".into()))?;
    let agents = AgentStatus::find_by_department(pool, &name).await?;

    Ok(ResponseJson(ApiResponse::success(Team { department, agents })))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/", get(get_teams))
        .route("/{name}", get(get_team))
}
