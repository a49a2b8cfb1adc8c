use axum::response::Json as ResponseJson;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utils::{
    response::ApiResponse,
    version::{APP_VERSION, SERVICE_NAME},
};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ServiceIndex {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub health: &'static str,
    pub stream: &'static str,
}

pub async fn health_check() -> ResponseJson<ApiResponse<HealthStatus>> {
    ResponseJson(ApiResponse::success(HealthStatus {
        status: "healthy",
        service: SERVICE_NAME,
        version: APP_VERSION,
        timestamp: Utc::now(),
    }))
}

pub async fn index() -> ResponseJson<ApiResponse<ServiceIndex>> {
    ResponseJson(ApiResponse::success(ServiceIndex {
        name: "Command Center API",
        version: APP_VERSION,
        description: "Internal operations dashboard backend",
        health: "/health",
        stream: "/api/status/stream",
    }))
}
