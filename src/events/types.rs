//! Change event payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// What kind of change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
    Reload,
}

/// A committed configuration change, published after the new value is
/// current. Transient: the core never persists events.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,

    /// Single path for targeted changes (e.g. `update_path`).
    pub path: Option<String>,

    /// Every dotted leaf path touched by the change.
    pub affected_paths: Vec<String>,

    /// Value before the change, if the emitter had it at hand.
    pub old_value: Option<Arc<Value>>,

    /// Value after the change.
    pub new_value: Option<Arc<Value>>,

    pub timestamp_ms: u64,

    /// Who initiated the change (e.g. `"api"`, `"hot-reload:primary"`).
    pub source: String,

    pub metadata: Map<String, Value>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            path: None,
            affected_paths: Vec::new(),
            old_value: None,
            new_value: None,
            timestamp_ms: now_millis(),
            source: source.into(),
            metadata: Map::new(),
        }
    }

    /// Paths to consider for cache invalidation: the single `path` when set,
    /// plus every affected path.
    pub fn invalidation_paths(&self) -> impl Iterator<Item = &str> {
        self.path
            .as_deref()
            .into_iter()
            .chain(self.affected_paths.iter().map(String::as_str))
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
