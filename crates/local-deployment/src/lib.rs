use std::sync::Arc;

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    config::{Config, load_config_from_file, save_config_to_file},
    council::CouncilService,
    events::EventBroker,
};
use tokio::sync::RwLock;
use utils::assets::config_path;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<RwLock<Config>>,
    db: DBService,
    council: CouncilService,
    events: EventBroker,
}

impl LocalDeployment {
    /// Assembles a deployment around an already opened database; used by
    /// `new` and by tests running on an in-memory store.
    pub fn with_db(db: DBService, config: Config) -> Self {
        let events = EventBroker::new(config.subscriber_buffer);
        let council = CouncilService::new(db.pool.clone());
        Self {
            config: Arc::new(RwLock::new(config)),
            db,
            council,
            events,
        }
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let raw_config = load_config_from_file(&config_path()).await;
        // Always save config so a fresh install gets a file with defaults
        save_config_to_file(&raw_config, &config_path()).await?;

        let db = DBService::new().await?;
        tracing::info!(
            "Database ready, subscriber buffer {}",
            raw_config.subscriber_buffer
        );

        Ok(Self::with_db(db, raw_config))
    }

    fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn council(&self) -> &CouncilService {
        &self.council
    }

    fn events(&self) -> &EventBroker {
        &self.events
    }
}
