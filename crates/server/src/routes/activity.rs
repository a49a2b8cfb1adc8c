use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::{
    activity::{ActivityFilter, ActivityLog, CreateActivityLog},
    page_limit,
};
use deployment::Deployment;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::{Data, Listing, Message};
use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{JsonBody, PathParam, QueryParams, require},
};

pub async fn get_activity(
    State(deployment): State<DeploymentImpl>,
    QueryParams(filter): QueryParams<ActivityFilter>,
) -> Result<ResponseJson<ApiResponse<Listing<ActivityLog>>>, ApiError> {
    let limit = page_limit(
        filter.limit,
        deployment.config().read().await.default_page_limit,
    );
    let activity = ActivityLog::find(&deployment.db().pool, &filter, limit).await?;
    Ok(ResponseJson(ApiResponse::success(activity.into())))
}

pub async fn create_activity(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreateActivityLog>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Data<ActivityLog>>>), ApiError> {
    require("type", &payload.activity_type)?;
    require("title", &payload.title)?;

    let activity = ActivityLog::create(&deployment.db().pool, &payload).await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(Data::new(activity))),
    ))
}

pub async fn delete_activity(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
) -> Result<ResponseJson<ApiResponse<Message>>, ApiError> {
    if ActivityLog::delete(&deployment.db().pool, id).await? == 0 {
        return Err(ApiError::NotFound("Activity not found".into()));
    }
    Ok(ResponseJson(ApiResponse::success(Message {
        message: "Activity deleted successfully",
    })))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/", get(get_activity).post(create_activity))
        .route("/{id}", delete(delete_activity))
}
