use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use vigil_model::SoftwareId;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("failed to read inventory {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse inventory {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads a JSON array of `{name, version}`. No path, or a path that does
/// not exist, yields an empty inventory.
pub async fn load_inventory(
    path: Option<&Path>,
) -> Result<Vec<SoftwareId>, InventoryError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "software inventory not found");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(InventoryError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let software: Vec<SoftwareId> =
        serde_json::from_str(&raw).map_err(|source| InventoryError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(software
        .into_iter()
        .filter(|sw| !sw.name.trim().is_empty())
        .collect())
}
