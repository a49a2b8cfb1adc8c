use axum::{
    Router,
    http::Request,
    middleware,
    routing::{IntoMakeService, get},
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{DeploymentImpl, middleware::request_id_middleware};

pub mod activity;
pub mod admin;
pub mod agents;
pub mod council;
pub mod departments;
pub mod health;
pub mod messages;
pub mod projects;
pub mod stats;
pub mod status;
pub mod tasks;
pub mod teams;

/// `{"data": ...}` payload used by the CRUD endpoints.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

impl<T> Data<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// `{"data": [...], "count": n}`.
#[derive(Debug, Serialize)]
pub struct Listing<T> {
    pub data: Vec<T>,
    pub count: usize,
}

impl<T> From<Vec<T>> for Listing<T> {
    fn from(data: Vec<T>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

pub fn api_router(deployment: DeploymentImpl) -> Router {
    let api_routes = Router::new()
        .nest("/status", status::router())
        .nest("/agents", agents::router())
        .nest("/departments", departments::router())
        .nest("/teams", teams::router())
        .nest("/projects", projects::router())
        .nest("/tasks", tasks::router())
        .nest("/activity", activity::router())
        .nest("/messages", messages::router())
        .nest("/stats", stats::router())
        .nest("/council", council::router())
        .nest("/admin", admin::router())
        .with_state(deployment);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
        )
    });

    Router::new()
        .route("/", get(health::index))
        .route("/health", get(health::health_check))
        .nest("/api", api_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace)
        .layer(CorsLayer::permissive())
}

pub fn router(deployment: DeploymentImpl) -> IntoMakeService<Router> {
    api_router(deployment).into_make_service()
}
