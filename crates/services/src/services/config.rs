use std::path::Path;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

const CONFIG_VERSION: &str = "v1";

/// Settings persisted as `config.json` in the asset directory. Missing
/// fields fall back to their defaults so older files keep loading.
#[derive(Clone, Debug, Serialize, Deserialize, TS, PartialEq)]
pub struct Config {
    pub config_version: String,
    /// Run the idempotent seed (departments, agents, projects) at startup.
    #[serde(default = "default_true")]
    pub seed_on_startup: bool,
    /// Queue depth per live-update subscriber before it is dropped.
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
    #[serde(default = "default_page_limit")]
    pub default_page_limit: i64,
    /// History rows embedded in single-agent status responses.
    #[serde(default = "default_status_history_limit")]
    pub status_history_limit: i64,
}

fn default_true() -> bool {
    true
}

fn default_subscriber_buffer() -> usize {
    64
}

fn default_page_limit() -> i64 {
    50
}

fn default_status_history_limit() -> i64 {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION.to_string(),
            seed_on_startup: default_true(),
            subscriber_buffer: default_subscriber_buffer(),
            default_page_limit: default_page_limit(),
            status_history_limit: default_status_history_limit(),
        }
    }
}

impl From<String> for Config {
    fn from(raw_config: String) -> Self {
        match serde_json::from_str::<Config>(&raw_config) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Config parse failed: {}, using default", e);
                Self::default()
            }
        }
    }
}

/// Reads the config file, falling back to defaults when it is missing or
/// unreadable.
pub async fn load_config_from_file(config_path: &Path) -> Config {
    match tokio::fs::read_to_string(config_path).await {
        Ok(raw_config) => Config::from(raw_config),
        Err(_) => {
            tracing::info!("No config file found, creating one");
            Config::default()
        }
    }
}

pub async fn save_config_to_file(config: &Config, config_path: &Path) -> anyhow::Result<()> {
    let raw_config = serde_json::to_string_pretty(config)?;
    tokio::fs::write(config_path, raw_config).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let config = Config::from(r#"{"config_version":"v1","subscriber_buffer":8}"#.to_string());
        assert_eq!(config.subscriber_buffer, 8);
        assert!(config.seed_on_startup);
        assert_eq!(config.default_page_limit, 50);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        assert_eq!(Config::from("not json".to_string()), Config::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let path = std::env::temp_dir().join(format!("command-center-config-{}.json", std::process::id()));
        let config = Config {
            seed_on_startup: false,
            ..Config::default()
        };
        save_config_to_file(&config, &path).await.unwrap();
        assert_eq!(load_config_from_file(&path).await, config);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn missing_file_loads_defaults() {
        let path = std::env::temp_dir().join("command-center-config-does-not-exist.json");
        assert_eq!(load_config_from_file(&path).await, Config::default());
    }
}
