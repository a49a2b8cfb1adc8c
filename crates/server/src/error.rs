use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::{
    agent_message::AgentMessageError, agent_status::AgentStatusError,
    department::DepartmentError, project::ProjectError, task::TaskError,
};
use deployment::DeploymentError;
use services::services::council::CouncilError;
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal Server Error: {0}")]
    InternalError(String),
}

impl From<CouncilError> for ApiError {
    fn from(err: CouncilError) -> Self {
        match err {
            CouncilError::Database(e) => ApiError::Database(e),
            CouncilError::Validation(msg) => ApiError::BadRequest(msg),
            CouncilError::NotFound => ApiError::NotFound("Proposal not found".into()),
            e @ CouncilError::Forbidden => ApiError::Forbidden(e.to_string()),
            e @ CouncilError::InvalidState(_) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<AgentStatusError> for ApiError {
    fn from(err: AgentStatusError) -> Self {
        match err {
            AgentStatusError::Database(e) => ApiError::Database(e),
            AgentStatusError::NotFound => ApiError::NotFound("Agent not found".into()),
            e @ AgentStatusError::AlreadyExists(_) => ApiError::Conflict(e.to_string()),
        }
    }
}

impl From<DepartmentError> for ApiError {
    fn from(err: DepartmentError) -> Self {
        match err {
            DepartmentError::Database(e) => ApiError::Database(e),
            DepartmentError::NotFound => ApiError::NotFound("Department not found".into()),
        }
    }
}

impl From<ProjectError> for ApiError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::Database(e) => ApiError::Database(e),
            ProjectError::NotFound => ApiError::NotFound("Project not found".into()),
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Database(e) => ApiError::Database(e),
            TaskError::NotFound => ApiError::NotFound("Task not found".into()),
            TaskError::ProjectNotFound => ApiError::BadRequest("Project not found".into()),
        }
    }
}

impl From<AgentMessageError> for ApiError {
    fn from(err: AgentMessageError) -> Self {
        match err {
            AgentMessageError::Database(e) => ApiError::Database(e),
            AgentMessageError::NotFound => ApiError::NotFound("Message not found".into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match &self {
            ApiError::Database(e) if is_unique_violation(e) => (
                StatusCode::CONFLICT,
                "A record with the same unique key already exists".to_string(),
            ),
            ApiError::Database(sqlx::Error::RowNotFound) => {
                (StatusCode::NOT_FOUND, "Record not found".to_string())
            }
            ApiError::Database(_) | ApiError::Deployment(_) | ApiError::InternalError(_) => {
                // details stay in the logs
                tracing::error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use db::models::council_proposal::ProposalStatus;
    use http_body_util::BodyExt;
    use serde_json::Value;

    use super::*;

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn council_errors_map_to_statuses() {
        let cases = [
            (
                CouncilError::Validation("title is required".into()),
                StatusCode::BAD_REQUEST,
            ),
            (CouncilError::NotFound, StatusCode::NOT_FOUND),
            (CouncilError::Forbidden, StatusCode::FORBIDDEN),
            (
                CouncilError::InvalidState(ProposalStatus::Approved),
                StatusCode::BAD_REQUEST,
            ),
            (
                CouncilError::Database(sqlx::Error::PoolClosed),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, body) = render(err.into()).await;
            assert_eq!(status, expected);
            assert_eq!(body["success"], false);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = render(ApiError::Database(sqlx::Error::PoolTimedOut)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn duplicate_agent_is_conflict() {
        let (status, body) =
            render(AgentStatusError::AlreadyExists("main".into()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Agent 'main' already exists");
    }

    #[tokio::test]
    async fn invalid_state_names_the_status() {
        let (_, body) = render(CouncilError::InvalidState(ProposalStatus::Withdrawn).into()).await;
        assert_eq!(body["error"], "Proposal is already withdrawn");
    }
}
