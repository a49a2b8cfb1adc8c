use axum::{
    Router,
    extract::State,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    activity::{ActivityLog, CreateActivityLog},
    agent_message::{AgentMessage, CreateAgentMessage, MessageFilter, MessagePage, Reactions},
    empty_as_none, page_limit,
};
use deployment::Deployment;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{JsonBody, PathParam, QueryParams, require},
};

const FEED_PAGE_LIMIT: i64 = 100;
const TITLE_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
    #[serde(rename = "type", default, deserialize_with = "empty_as_none")]
    pub message_type: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub unread_only: Option<bool>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRead {
    pub agent_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct React {
    pub agent_id: String,
    pub emoji: String,
}

#[derive(Debug, Serialize)]
pub struct SentMessage {
    pub message: AgentMessage,
}

#[derive(Debug, Serialize)]
pub struct Inbox {
    #[serde(flatten)]
    pub page: MessagePage,
    /// Unread messages across the whole inbox, not just this page.
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct Thread {
    pub messages: Vec<AgentMessage>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ReactionSummary {
    pub reactions: Reactions,
}

fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(TITLE_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

pub async fn send_message(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreateAgentMessage>,
) -> Result<ResponseJson<ApiResponse<SentMessage>>, ApiError> {
    require("fromAgentId", &payload.from_agent_id)?;
    require("message", &payload.message)?;
    let pool = &deployment.db().pool;

    let message = AgentMessage::create(pool, &payload).await?;
    let recipient = message.to_agent_id.as_deref().unwrap_or("broadcast");

    ActivityLog::create(
        pool,
        &CreateActivityLog::new(
            "message",
            format!(
                "{} → {}: {}",
                message.from_agent_id,
                recipient,
                preview(&message.message)
            ),
        )
        .agent(Some(&message.from_agent_id))
        .description(Some(&message.message))
        .metadata(json!({
            "messageId": message.id,
            "messageType": message.message_type,
            "priority": message.priority,
            "toAgentId": message.to_agent_id,
        })),
    )
    .await?;

    tracing::debug!(
        from = %message.from_agent_id,
        to = recipient,
        "Message sent"
    );
    Ok(ResponseJson(ApiResponse::success(SentMessage { message })))
}

pub async fn get_messages(
    State(deployment): State<DeploymentImpl>,
    QueryParams(query): QueryParams<FeedQuery>,
) -> Result<ResponseJson<ApiResponse<MessagePage>>, ApiError> {
    let filter = MessageFilter {
        message_type: query.message_type,
        priority: query.priority,
    };
    let page = AgentMessage::find_all(
        &deployment.db().pool,
        &filter,
        page_limit(query.limit, FEED_PAGE_LIMIT),
        query.offset.unwrap_or(0).max(0),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_inbox(
    State(deployment): State<DeploymentImpl>,
    PathParam(agent_id): PathParam<String>,
    QueryParams(query): QueryParams<InboxQuery>,
) -> Result<ResponseJson<ApiResponse<Inbox>>, ApiError> {
    let pool = &deployment.db().pool;
    let limit = page_limit(
        query.limit,
        deployment.config().read().await.default_page_limit,
    );
    let page = AgentMessage::inbox(
        pool,
        &agent_id,
        query.unread_only.unwrap_or(false),
        limit,
        query.offset.unwrap_or(0).max(0),
    )
    .await?;
    let unread = AgentMessage::unread_count(pool, &agent_id).await?;

    Ok(ResponseJson(ApiResponse::success(Inbox { page, unread })))
}

pub async fn get_outbox(
    State(deployment): State<DeploymentImpl>,
    PathParam(agent_id): PathParam<String>,
    QueryParams(query): QueryParams<PageQuery>,
) -> Result<ResponseJson<ApiResponse<MessagePage>>, ApiError> {
    let limit = page_limit(
        query.limit,
        deployment.config().read().await.default_page_limit,
    );
    let page = AgentMessage::outbox(
        &deployment.db().pool,
        &agent_id,
        limit,
        query.offset.unwrap_or(0).max(0),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(page)))
}

pub async fn get_thread(
    State(deployment): State<DeploymentImpl>,
    PathParam(thread_id): PathParam<String>,
) -> Result<ResponseJson<ApiResponse<Thread>>, ApiError> {
    let messages = AgentMessage::thread(&deployment.db().pool, &thread_id).await?;
    Ok(ResponseJson(ApiResponse::success(Thread {
        count: messages.len(),
        messages,
    })))
}

pub async fn mark_read(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<MarkRead>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    require("agentId", &payload.agent_id)?;
    AgentMessage::mark_read(&deployment.db().pool, id, &payload.agent_id).await?;
    Ok(ResponseJson(ApiResponse::ok()))
}

pub async fn react(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<React>,
) -> Result<ResponseJson<ApiResponse<ReactionSummary>>, ApiError> {
    require("agentId", &payload.agent_id)?;
    require("emoji", &payload.emoji)?;
    let reactions =
        AgentMessage::react(&deployment.db().pool, id, &payload.agent_id, &payload.emoji).await?;
    Ok(ResponseJson(ApiResponse::success(ReactionSummary {
        reactions,
    })))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/", get(get_messages).post(send_message))
        .route("/inbox/{agent_id}", get(get_inbox))
        .route("/outbox/{agent_id}", get(get_outbox))
        .route("/thread/{thread_id}", get(get_thread))
        .route("/{id}/read", post(mark_read))
        .route("/{id}/react", post(react))
}
