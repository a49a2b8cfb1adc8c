use std::path::PathBuf;

use crate::assets::asset_dir;

pub fn port_file_path() -> PathBuf {
    asset_dir().join("server.port")
}

/// Records the bound port so local tooling (and the dashboard dev server)
/// can find the API without a fixed port.
pub async fn write_port_file(port: u16) -> std::io::Result<PathBuf> {
    let path = port_file_path();
    tracing::debug!("Writing port {} to {:?}", port, path);
    tokio::fs::write(&path, port.to_string()).await?;
    Ok(path)
}
