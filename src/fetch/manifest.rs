use crate::error::Result;
use crate::models::WorkItem;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::path::Path;
use tracing::info;

/// Writes `items` as a pretty-printed JSON array, replacing any previous manifest
pub async fn save_manifest(path: &Path, items: &[WorkItem]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    items.serialize(&mut serializer)?;
    buffer.push(b'\n');

    tokio::fs::write(path, buffer).await?;
    info!("Saved manifest of {} gems to {}", items.len(), path.display());
    Ok(())
}

/// Reads a manifest written by [`save_manifest`]
pub async fn load_manifest(path: &Path) -> Result<Vec<WorkItem>> {
    let content = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&content)?)
}
