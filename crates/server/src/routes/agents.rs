use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    agent_status::{
        AgentOrder, AgentStatus, AgentStatusFilter, AgentStatusWithHistory, CreateAgentStatus,
        UpdateAgentStatus,
    },
    empty_as_none, page_limit,
    status_history::StatusHistory,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::events::Event;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::{Data, Listing, Message};
use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{JsonBody, PathParam, QueryParams, require},
};

/// History rows embedded in a single-agent response.
const AGENT_HISTORY_PREVIEW: i64 = 10;
const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
}

pub async fn get_agents(
    State(deployment): State<DeploymentImpl>,
    QueryParams(filter): QueryParams<AgentStatusFilter>,
) -> Result<ResponseJson<ApiResponse<Listing<AgentStatus>>>, ApiError> {
    let agents = AgentStatus::find_all(&deployment.db().pool, &filter, AgentOrder::Name).await?;
    Ok(ResponseJson(ApiResponse::success(agents.into())))
}

pub async fn get_agent(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
) -> Result<ResponseJson<ApiResponse<Data<AgentStatusWithHistory>>>, ApiError> {
    let pool = &deployment.db().pool;
    let agent = AgentStatus::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".into()))?;
    let agent = agent.with_history(pool, AGENT_HISTORY_PREVIEW).await?;
    Ok(ResponseJson(ApiResponse::success(Data::new(agent))))
}

pub async fn get_agent_by_handle(
    State(deployment): State<DeploymentImpl>,
    PathParam(agent_id): PathParam<String>,
) -> Result<ResponseJson<ApiResponse<Data<AgentStatusWithHistory>>>, ApiError> {
    let pool = &deployment.db().pool;
    let agent = AgentStatus::find_by_agent_id(pool, &agent_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".into()))?;
    let agent = agent.with_history(pool, AGENT_HISTORY_PREVIEW).await?;
    Ok(ResponseJson(ApiResponse::success(Data::new(agent))))
}

pub async fn create_agent(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreateAgentStatus>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Data<AgentStatus>>>), ApiError> {
    require("agentId", &payload.agent_id)?;
    require("name", &payload.name)?;
    require("role", &payload.role)?;
    require("location", &payload.location)?;

    let agent = AgentStatus::create(&deployment.db().pool, &payload).await?;
    tracing::info!(agent_id = %agent.agent_id, "Agent created");

    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(Data::new(agent))),
    ))
}

pub async fn update_agent(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateAgentStatus>,
) -> Result<ResponseJson<ApiResponse<Data<AgentStatus>>>, ApiError> {
    let agent = AgentStatus::update(&deployment.db().pool, id, &payload).await?;
    deployment.publish(Event::status_update(&agent));
    Ok(ResponseJson(ApiResponse::success(Data::new(agent))))
}

pub async fn delete_agent(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
) -> Result<ResponseJson<ApiResponse<Message>>, ApiError> {
    if AgentStatus::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("Agent not found".into()));
    }
    Ok(ResponseJson(ApiResponse::success(Message {
        message: "Agent deleted successfully",
    })))
}

pub async fn get_agent_history(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
    QueryParams(query): QueryParams<HistoryQuery>,
) -> Result<ResponseJson<ApiResponse<Listing<StatusHistory>>>, ApiError> {
    let history = StatusHistory::find_by_agent_status(
        &deployment.db().pool,
        id,
        page_limit(query.limit, DEFAULT_HISTORY_LIMIT),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(history.into())))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/", get(get_agents).post(create_agent))
        .route("/by-agent-id/{agent_id}", get(get_agent_by_handle))
        .route(
            "/{id}",
            get(get_agent).patch(update_agent).delete(delete_agent),
        )
        .route("/{id}/history", get(get_agent_history))
}
