use std::sync::Arc;

use anyhow::Error as AnyhowError;
use async_trait::async_trait;
use db::DBService;
use services::services::{
    config::Config,
    council::CouncilService,
    events::{Event, EventBroker},
    seed::{SeedSummary, seed},
};
use sqlx::{Error as SqlxError, migrate::MigrateError};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
    #[error(transparent)]
    Migrate(#[from] MigrateError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

/// Everything a request handler may reach: the store, the council state
/// machine, the live-update broker and the loaded configuration.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<RwLock<Config>>;

    fn db(&self) -> &DBService;

    fn council(&self) -> &CouncilService;

    fn events(&self) -> &EventBroker;

    /// Fan an event out to live subscribers; never blocks.
    fn publish(&self, event: Event) {
        let delivered = self.events().publish(&event);
        tracing::trace!("{:?} delivered to {} subscribers", event.kind, delivered);
    }

    async fn seed(&self) -> Result<SeedSummary, DeploymentError> {
        Ok(seed(&self.db().pool).await?)
    }

    async fn migrate(&self) -> Result<usize, DeploymentError> {
        Ok(self.db().migrate().await?)
    }

    /// Runs the startup seed when the config asks for it.
    async fn seed_if_enabled(&self) -> Result<(), DeploymentError> {
        if self.config().read().await.seed_on_startup {
            self.seed().await?;
        }
        Ok(())
    }

    /// Releases live subscribers ahead of process exit.
    fn shutdown(&self) {
        self.events().shutdown();
    }
}
