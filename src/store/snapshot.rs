//! Immutable configuration snapshots and their bounded history.

use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

use crate::events::types::now_millis;

/// An immutable, timestamped copy of the full configuration value, retained
/// for rollback.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    pub id: String,
    pub timestamp_ms: u64,
    pub config: Arc<Value>,
    pub source: String,
    pub metadata: Map<String, Value>,
}

impl ConfigSnapshot {
    pub fn new(config: Arc<Value>, source: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp_ms: now_millis(),
            config,
            source: source.into(),
            metadata,
        }
    }
}

/// Bounded FIFO history of snapshots. Oldest evicted on overflow.
pub struct SnapshotHistory {
    entries: VecDeque<ConfigSnapshot>,
    capacity: usize,
}

impl SnapshotHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a snapshot, evicting the oldest if the bound is exceeded.
    /// Returns the id of the evicted snapshot, if any.
    pub fn push(&mut self, snapshot: ConfigSnapshot) -> Option<String> {
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front().map(|s| s.id)
        } else {
            None
        };
        self.entries.push_back(snapshot);
        evicted
    }

    pub fn get(&self, id: &str) -> Option<&ConfigSnapshot> {
        self.entries.iter().find(|s| s.id == id)
    }

    /// Most recently recorded snapshot.
    pub fn latest(&self) -> Option<&ConfigSnapshot> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(tag: u64) -> ConfigSnapshot {
        ConfigSnapshot::new(Arc::new(json!({ "tag": tag })), "test", Map::new())
    }

    #[test]
    fn evicts_oldest_on_overflow() {
        let mut history = SnapshotHistory::new(3);
        let first = snapshot(0);
        let first_id = first.id.clone();

        assert!(history.push(first).is_none());
        assert!(history.push(snapshot(1)).is_none());
        assert!(history.push(snapshot(2)).is_none());

        let evicted = history.push(snapshot(3));
        assert_eq!(evicted, Some(first_id.clone()));
        assert_eq!(history.len(), 3);
        assert!(history.get(&first_id).is_none());
    }

    #[test]
    fn latest_tracks_insertion_order() {
        let mut history = SnapshotHistory::new(2);
        history.push(snapshot(1));
        let second = snapshot(2);
        let second_id = second.id.clone();
        history.push(second);

        assert_eq!(history.latest().unwrap().id, second_id);
    }

    #[test]
    fn lookup_by_id() {
        let mut history = SnapshotHistory::new(2);
        let snap = snapshot(7);
        let id = snap.id.clone();
        history.push(snap);

        assert_eq!(*history.get(&id).unwrap().config, json!({"tag": 7}));
        assert!(history.get("nope").is_none());
    }
}
