//! On-disk snapshot of cache entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Serialized form of one entry. TTLs are persisted as absolute expiry
/// times so a restart does not extend an entry's life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub value: Value,
    pub expires_at_ms: u64,
}

pub async fn save(path: &Path, entries: &HashMap<String, PersistedEntry>) -> std::io::Result<()> {
    let bytes = serde_json::to_vec(entries)?;
    tokio::fs::write(path, bytes).await
}

pub async fn load(path: &Path) -> std::io::Result<HashMap<String, PersistedEntry>> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
