use std::collections::BTreeMap;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Json as ResponseJson},
    routing::get,
};
use db::models::{
    agent_status::{
        AgentOrder, AgentStatus, AgentStatusFilter, AgentStatusWithHistory, ReportAgentStatus,
        UNASSIGNED_DEPARTMENT,
    },
    empty_as_none, page_limit,
    status_history::StatusHistory,
};
use deployment::Deployment;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use services::services::events::{Event, Subscription};
use utils::response::ApiResponse;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{JsonBody, PathParam, QueryParams, require},
};

const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
pub struct StatusReceipt<T> {
    pub status: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBoard {
    pub total: usize,
    pub statuses: Vec<AgentStatus>,
    pub by_department: BTreeMap<String, Vec<AgentStatus>>,
}

impl StatusBoard {
    fn new(statuses: Vec<AgentStatus>) -> Self {
        let mut by_department: BTreeMap<String, Vec<AgentStatus>> = BTreeMap::new();
        for status in &statuses {
            let department = status
                .department
                .clone()
                .unwrap_or_else(|| UNASSIGNED_DEPARTMENT.to_string());
            by_department.entry(department).or_default().push(status.clone());
        }
        Self {
            total: statuses.len(),
            statuses,
            by_department,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryPage {
    pub agent_id: String,
    pub history: Vec<StatusHistory>,
}

#[derive(Debug, Serialize)]
pub struct StreamInfo {
    pub path: &'static str,
    pub subscribers: usize,
    pub closed: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
}

pub async fn report_status(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<ReportAgentStatus>,
) -> Result<ResponseJson<ApiResponse<StatusReceipt<AgentStatus>>>, ApiError> {
    require("agentId", &payload.agent_id)?;
    require("name", &payload.name)?;
    require("role", &payload.role)?;
    require("emoji", &payload.emoji)?;
    require("location", &payload.location)?;
    require("status", &payload.status)?;

    let status = AgentStatus::report(&deployment.db().pool, &payload).await?;
    tracing::debug!(agent_id = %status.agent_id, status = %status.status, "Status reported");

    deployment.publish(Event::status_update(&status));
    Ok(ResponseJson(ApiResponse::success(StatusReceipt { status })))
}

pub async fn get_statuses(
    State(deployment): State<DeploymentImpl>,
    QueryParams(filter): QueryParams<AgentStatusFilter>,
) -> Result<ResponseJson<ApiResponse<StatusBoard>>, ApiError> {
    let statuses =
        AgentStatus::find_all(&deployment.db().pool, &filter, AgentOrder::LastUpdate).await?;
    Ok(ResponseJson(ApiResponse::success(StatusBoard::new(statuses))))
}

pub async fn get_status(
    State(deployment): State<DeploymentImpl>,
    PathParam(agent_id): PathParam<String>,
) -> Result<ResponseJson<ApiResponse<StatusReceipt<AgentStatusWithHistory>>>, ApiError> {
    let pool = &deployment.db().pool;
    let agent = AgentStatus::find_by_agent_id(pool, &agent_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Agent not found".into()))?;
    let limit = deployment.config().read().await.status_history_limit;

    let status = agent.with_history(pool, limit).await?;
    Ok(ResponseJson(ApiResponse::success(StatusReceipt { status })))
}

pub async fn get_status_history(
    State(deployment): State<DeploymentImpl>,
    PathParam(agent_id): PathParam<String>,
    QueryParams(query): QueryParams<HistoryQuery>,
) -> Result<ResponseJson<ApiResponse<StatusHistoryPage>>, ApiError> {
    let history = StatusHistory::find_by_agent_id(
        &deployment.db().pool,
        &agent_id,
        page_limit(query.limit, DEFAULT_HISTORY_LIMIT),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(StatusHistoryPage {
        agent_id,
        history,
    })))
}

pub async fn stream_status_ws(
    ws: WebSocketUpgrade,
    State(deployment): State<DeploymentImpl>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = handle_status_ws(socket, deployment).await {
            tracing::warn!("status WS closed: {}", e);
        }
    })
}

async fn handle_status_ws(socket: WebSocket, deployment: DeploymentImpl) -> anyhow::Result<()> {
    let Subscription { id, mut rx } = deployment.events().subscribe();
    let (mut sender, mut receiver) = socket.split();

    let result = loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sender.send(Message::Text(frame.to_string().into())).await {
                        break Err(e.into());
                    }
                }
                // broker dropped us: shut down or too slow
                None => {
                    let _ = sender.send(Message::Close(None)).await;
                    break Ok(());
                }
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                // pings are answered by the protocol layer on the next flush
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(e.into()),
            },
        }
    };

    deployment.events().unsubscribe(id);
    result
}

pub async fn stream_info(
    State(deployment): State<DeploymentImpl>,
) -> ResponseJson<ApiResponse<StreamInfo>> {
    let events = deployment.events();
    ResponseJson(ApiResponse::success(StreamInfo {
        path: "/api/status/stream",
        subscribers: events.subscriber_count(),
        closed: events.is_closed(),
    }))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/", get(get_statuses).post(report_status))
        .route("/stream", get(stream_status_ws))
        .route("/stream/info", get(stream_info))
        .route("/{agent_id}", get(get_status))
        .route("/{agent_id}/history", get(get_status_history))
}
