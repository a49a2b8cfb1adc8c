use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    agent_status::AgentStatus,
    empty_as_none,
    project::{CreateProject, Project, UpdateProject},
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{JsonBody, PathParam, QueryParams, require},
};

#[derive(Debug, Deserialize)]
pub struct ProjectQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectList {
    pub projects: Vec<Project>,
}

#[derive(Debug, Serialize)]
pub struct ProjectEnvelope {
    pub project: Project,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    pub project: Project,
    /// Status card of the owning agent, when the owner reports one.
    pub owner: Option<AgentStatus>,
}

pub async fn get_projects(
    State(deployment): State<DeploymentImpl>,
    QueryParams(query): QueryParams<ProjectQuery>,
) -> Result<ResponseJson<ApiResponse<ProjectList>>, ApiError> {
    let projects = Project::find_all(&deployment.db().pool, query.status.as_deref()).await?;
    Ok(ResponseJson(ApiResponse::success(ProjectList { projects })))
}

pub async fn get_project(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
) -> Result<ResponseJson<ApiResponse<ProjectDetail>>, ApiError> {
    let pool = &deployment.db().pool;
    let project = Project::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".into()))?;
    let owner = AgentStatus::find_by_agent_id(pool, &project.owner).await?;

    Ok(ResponseJson(ApiResponse::success(ProjectDetail {
        project,
        owner,
    })))
}

pub async fn create_project(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreateProject>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<ProjectEnvelope>>), ApiError> {
    require("name", &payload.name)?;
    require("owner", &payload.owner)?;

    let project = Project::create(&deployment.db().pool, &payload).await?;
    tracing::info!("Project '{}' created for {}", project.name, project.owner);

    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(ProjectEnvelope { project })),
    ))
}

pub async fn update_project(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<ProjectEnvelope>>, ApiError> {
    let project = Project::update(&deployment.db().pool, id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(ProjectEnvelope { project })))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/", get(get_projects).post(create_project))
        .route("/{id}", get(get_project).patch(update_project))
}
