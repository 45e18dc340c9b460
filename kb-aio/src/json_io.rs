// kb-aio/src/json_io.rs
use std::path::Path;

use kb_common::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Asynchronously writes serializable data to a JSON file (pretty-printed).
pub async fn write_json_async<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    debug!("Async Writing JSON to: {}", path.display());
    let json_bytes = serde_json::to_vec_pretty(data)?;
    crate::fs::atomic_write_file_async(path, &json_bytes).await
}

/// Asynchronously reads and deserializes data from a JSON file.
pub async fn read_json_async<T: DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Async Reading JSON from: {}", path.display());
    let json_bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&json_bytes)?)
}
