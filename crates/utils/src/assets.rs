use std::{env, path::PathBuf};

use directories::ProjectDirs;

const PROJECT_ROOT: &str = env!("CARGO_MANIFEST_DIR");
const ASSET_DIR_ENV: &str = "COMMAND_CENTER_ASSET_DIR";

/// Directory holding the SQLite database, config file and port file.
///
/// Resolution order: `COMMAND_CENTER_ASSET_DIR`, then `dev_assets/` at the
/// workspace root for debug builds, then the platform data directory.
pub fn asset_dir() -> PathBuf {
    let path = if let Ok(custom_dir) = env::var(ASSET_DIR_ENV) {
        PathBuf::from(custom_dir)
    } else if cfg!(debug_assertions) {
        PathBuf::from(PROJECT_ROOT).join("../../dev_assets")
    } else {
        match ProjectDirs::from("ai", "lumen", "command-center") {
            Some(dirs) => dirs.data_dir().to_path_buf(),
            None => {
                tracing::warn!("No home directory found, using ./data for assets");
                PathBuf::from("data")
            }
        }
    };

    if !path.exists()
        && let Err(e) = std::fs::create_dir_all(&path)
    {
        tracing::error!("Failed to create asset directory {}: {}", path.display(), e);
    }

    path
}

pub fn database_path() -> PathBuf {
    asset_dir().join("db.sqlite")
}

pub fn config_path() -> PathBuf {
    asset_dir().join("config.json")
}
