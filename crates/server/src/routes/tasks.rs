use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    activity::{ActivityLog, CreateActivityLog},
    task::{CreateTask, Task, TaskFilter, TaskWithProject, UpdateTask},
};
use deployment::Deployment;
use serde_json::json;
use services::services::events::Event;
use utils::response::ApiResponse;
use uuid::Uuid;

use super::{Data, Listing, Message};
use crate::{
    DeploymentImpl,
    error::ApiError,
    extract::{JsonBody, PathParam, QueryParams, require},
};

pub async fn get_tasks(
    State(deployment): State<DeploymentImpl>,
    QueryParams(filter): QueryParams<TaskFilter>,
) -> Result<ResponseJson<ApiResponse<Listing<TaskWithProject>>>, ApiError> {
    let pool = &deployment.db().pool;
    let tasks = Task::find_all(pool, &filter).await?;

    let mut with_projects = Vec::with_capacity(tasks.len());
    for task in tasks {
        with_projects.push(task.with_project(pool).await?);
    }
    Ok(ResponseJson(ApiResponse::success(with_projects.into())))
}

pub async fn get_task(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
) -> Result<ResponseJson<ApiResponse<Data<TaskWithProject>>>, ApiError> {
    let pool = &deployment.db().pool;
    let task = Task::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;
    Ok(ResponseJson(ApiResponse::success(Data::new(
        task.with_project(pool).await?,
    ))))
}

pub async fn create_task(
    State(deployment): State<DeploymentImpl>,
    JsonBody(payload): JsonBody<CreateTask>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Data<TaskWithProject>>>), ApiError> {
    require("title", &payload.title)?;
    let pool = &deployment.db().pool;

    tracing::debug!("Creating task '{}'", payload.title);
    let task = Task::create(pool, &payload).await?.with_project(pool).await?;

    ActivityLog::create(
        pool,
        &CreateActivityLog::new("task", format!("Created task: {}", task.title))
            .agent(payload.created_by.as_ref().or(payload.agent_id.as_ref()))
            .task(task.id, task.project_id)
            .description(task.description.as_ref())
            .metadata(json!({ "action": "created" })),
    )
    .await?;

    deployment.publish(Event::task_update(&task, "created", None));
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(Data::new(task))),
    ))
}

pub async fn update_task(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
    JsonBody(payload): JsonBody<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Data<TaskWithProject>>>, ApiError> {
    if let Some(title) = &payload.title {
        require("title", title)?;
    }
    let pool = &deployment.db().pool;

    let (previous, task) = Task::update(pool, id, &payload).await?;
    let task = task.with_project(pool).await?;

    if previous.status != task.status {
        ActivityLog::create(
            pool,
            &CreateActivityLog::new("task", format!("Task moved to {}", task.status))
                .agent(task.agent_id.as_ref())
                .task(task.id, task.project_id)
                .description(Some(&task.title))
                .metadata(json!({
                    "action": "status_changed",
                    "from": previous.status,
                    "to": task.status,
                })),
        )
        .await?;
    }

    let changes = json!({
        "status": payload.status,
        "progress": payload.progress,
        "agentId": payload.agent_id,
    });
    deployment.publish(Event::task_update(&task, "updated", Some(changes)));
    Ok(ResponseJson(ApiResponse::success(Data::new(task))))
}

pub async fn delete_task(
    State(deployment): State<DeploymentImpl>,
    PathParam(id): PathParam<Uuid>,
) -> Result<ResponseJson<ApiResponse<Message>>, ApiError> {
    let pool = &deployment.db().pool;
    let task = Task::find_by_id(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".into()))?;

    if Task::delete(pool, id).await? == 0 {
        return Err(ApiError::NotFound("Task not found".into()));
    }

    ActivityLog::create(
        pool,
        &CreateActivityLog::new("task", format!("Deleted task: {}", task.title))
            .agent(task.agent_id.as_ref())
            .metadata(json!({ "action": "deleted" })),
    )
    .await?;

    deployment.publish(Event::task_deleted(&task));
    Ok(ResponseJson(ApiResponse::success(Message {
        message: "Task deleted successfully",
    })))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/", get(get_tasks).post(create_task))
        .route(
            "/{id}",
            get(get_task).patch(update_task).delete(delete_task),
        )
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::test_support::{delete, get, patch, post, test_app};

    async fn activity_titles(app: &axum::Router) -> Vec<String> {
        let (_, body) = get(app, "/api/activity?type=task").await;
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["title"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn create_logs_and_publishes() {
        let (app, deployment) = test_app().await;
        let mut sub = deployment.events().subscribe();

        let (status, body) = post(
            &app,
            "/api/tasks",
            json!({ "title": "Draft brief", "agentId": "lumi", "tags": ["copy"] }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "backlog");
        assert_eq!(body["data"]["priority"], "medium");
        assert!(body["data"]["project"].is_null());

        let frame: Value = serde_json::from_str(&sub.rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["type"], "task_update");
        assert_eq!(frame["data"]["action"], "created");
        assert_eq!(frame["data"]["taskId"], body["data"]["id"]);

        assert_eq!(activity_titles(&app).await, vec!["Created task: Draft brief"]);
    }

    #[tokio::test]
    async fn status_change_is_logged_once() {
        let (app, _) = test_app().await;
        let (_, body) = post(&app, "/api/tasks", json!({ "title": "Ship" })).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) =
            patch(&app, &format!("/api/tasks/{id}"), json!({ "status": "progress" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "progress");

        // same status again, only progress moves
        patch(
            &app,
            &format!("/api/tasks/{id}"),
            json!({ "status": "progress", "progress": 50 }),
        )
        .await;

        let titles = activity_titles(&app).await;
        assert_eq!(titles, vec!["Task moved to progress", "Created task: Ship"]);
    }

    #[tokio::test]
    async fn filters_and_project_embedding() {
        let (app, _) = test_app().await;
        let (_, body) = post(&app, "/api/projects", json!({ "name": "Launch", "owner": "lumi" })).await;
        let project_id = body["project"]["id"].as_str().unwrap().to_string();

        post(
            &app,
            "/api/tasks",
            json!({ "title": "In project", "projectId": project_id, "priority": "high" }),
        )
        .await;
        post(&app, "/api/tasks", json!({ "title": "Loose" })).await;

        let (_, body) = get(&app, &format!("/api/tasks?projectId={project_id}")).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["project"]["name"], "Launch");

        let (_, body) = get(&app, "/api/tasks?priority=high").await;
        assert_eq!(body["count"], 1);

        let (status, _) = get(&app, "/api/tasks?status=someday").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(&app, "/api/tasks?status=&agentId=&projectId=&priority=").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn invalid_payloads_are_rejected() {
        let (app, _) = test_app().await;
        let (status, _) = post(&app, "/api/tasks", json!({ "title": "x", "status": "nope" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post(
            &app,
            "/api/tasks",
            json!({ "title": "x", "projectId": Uuid::new_v4() }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Project not found");

        let (status, _) = post(&app, "/api/tasks", json!({ "description": "no title" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_logs_and_publishes() {
        let (app, deployment) = test_app().await;
        let (_, body) = post(&app, "/api/tasks", json!({ "title": "Old" })).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let mut sub = deployment.events().subscribe();

        let (status, _) = delete(&app, &format!("/api/tasks/{id}")).await;
        assert_eq!(status, StatusCode::OK);
        let frame: Value = serde_json::from_str(&sub.rx.recv().await.unwrap()).unwrap();
        assert_eq!(frame["data"]["action"], "deleted");

        let (status, _) = delete(&app, &format!("/api/tasks/{id}")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(activity_titles(&app).await[0], "Deleted task: Old");
    }
}
