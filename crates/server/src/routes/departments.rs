use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    agent_status::AgentStatus,
    department::{CreateDepartment, Department, UpdateDepartment},
};
use deployment::Deployment;
use serde::Serialize;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::{Data, Listing, Message};
use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{JsonBody, PathParam, require},
};

#[derive(Debug, Serialize)]
pub struct DepartmentWithAgents {
    #[serde(flatten)]
    pub department: Department,
    pub agents: Vec<AgentStatus>,
}

pub async fn get_departments(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<Listing<Department>>>, ApiError> {
    let departments = Department::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(departments.into())))
}

pub async fn get_department(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
) -> Result<ResponseJson<ApiResponse<Data<DepartmentWithAgents>>>, ApiError> {
    let pool = &deployment.db().pool;
    let department = Department::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Department not found".into()))?;
    let agents = AgentStatus::find_by_department(pool, &department.name).await?;

    Ok(ResponseJson(ApiResponse::success(Data::new(
        DepartmentWithAgents { department, agents },
    ))))
}

pub async fn create_department(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreateDepartment>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Data<Department>>>), ApiError> {
    require("name", &payload.name)?;
    require("location", &payload.location)?;

    let department = Department::create(&deployment.db().pool, &payload).await?;
    tracing::info!("Department '{}' created", department.name);

    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(Data::new(department))),
    ))
}

pub async fn update_department(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateDepartment>,
) -> Result<ResponseJson<ApiResponse<Data<Department>>>, ApiError> {
    if let Some(name) = &payload.name {
        require("name", name)?;
    }
    let department = Department::update(&deployment.db().pool, id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(Data::new(department))))
}

pub async fn delete_department(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
) -> Result<ResponseJson<ApiResponse<Message>>, ApiError> {
    if Department::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("Department not found".into()));
    }
    Ok(ResponseJson(ApiResponse::success(Message {
        message: "Department deleted successfully",
    })))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/", get(get_departments).post(create_department))
        .route(
            "/{id}",
            get(get_department)
                .patch(update_department)
                .delete(delete_department),
        )
}
