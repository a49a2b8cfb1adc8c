use axum::{Router, extract::State, response::Json as ResponseJson, routing::post};
use deployment::Deployment;
use serde::Serialize;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Serialize)]
pub struct MigrationReport {
    pub message: &'static str,
    pub applied: usize,
}

#[derive(Debug, Serialize)]
pub struct SeedReport {
    pub message: &'static str,
    pub departments: usize,
    pub agents: usize,
    pub projects: usize,
}

pub async fn run_migrations(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<MigrationReport>>, ApiError> {
    let applied = deployment.migrate().await?;
    tracing::info!("Admin migration run, {} migrations known", applied);
    Ok(ResponseJson(ApiResponse::success(MigrationReport {
        message: "Migrations completed",
        applied,
    })))
}

pub async fn run_seed(
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<SeedReport>>, ApiError> {
    let summary = deployment.seed().await?;
    Ok(ResponseJson(ApiResponse::success(SeedReport {
        message: "Database seeded",
        departments: summary.departments,
        agents: summary.agents,
        projects: summary.projects,
    })))
}

pub fn router() -> Router<DeploymentImpl> {
    Router::new()
        .route("/migrate", post(run_migrations))
        .route("/seed", post(run_seed))
}
