//! The configuration store: atomic validated updates, snapshots, rollback.

use arc_swap::ArcSwap;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ConfigError;
use crate::events::types::now_millis;
use crate::events::{ChangeEvent, ChangeKind, ChangeNotifier};
use crate::observability::metrics;
use crate::settings::StoreSettings;
use crate::store::merge;
use crate::store::snapshot::{ConfigSnapshot, SnapshotHistory};
use crate::sync::FairLock;
use crate::validate::{ValidationReport, Validator};

/// Options controlling a single update.
#[derive(Clone)]
pub struct UpdateOptions {
    /// Run the external validator on the merged candidate.
    pub validate: bool,
    /// Capture a pre-update snapshot and restore it on commit failure.
    pub rollback_on_failure: bool,
    /// Publish a change event on success.
    pub notify: bool,
    /// Event kind to publish: `Update` for partial updates, `Reload` for
    /// full-source reloads.
    pub kind: ChangeKind,
    /// Who initiated the change.
    pub source: String,
    pub metadata: Map<String, Value>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            validate: true,
            rollback_on_failure: true,
            notify: true,
            kind: ChangeKind::Update,
            source: "api".to_string(),
            metadata: Map::new(),
        }
    }
}

impl UpdateOptions {
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

/// Structured outcome of an update attempt. Mutation failures are reported
/// here, never thrown.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    pub success: bool,
    /// Id of the pre-update snapshot, when one was captured.
    pub snapshot_id: Option<String>,
    /// Validator report, present when validation rejected the candidate.
    pub validation: Option<ValidationReport>,
    pub error: Option<String>,
    pub rollback_performed: bool,
    pub affected_paths: Vec<String>,
    pub timestamp_ms: u64,
}

impl UpdateResult {
    fn failure(timestamp_ms: u64, affected_paths: Vec<String>) -> Self {
        Self {
            success: false,
            snapshot_id: None,
            validation: None,
            error: None,
            rollback_performed: false,
            affected_paths,
            timestamp_ms,
        }
    }
}

/// Point-in-time store counters.
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    pub total_updates: u64,
    pub snapshot_count: usize,
    pub subscriber_count: usize,
    pub is_locked: bool,
    pub last_update_time_ms: Option<u64>,
}

/// Holds the current configuration value and a bounded history of immutable
/// snapshots. Reads are lock-free; commits are serialized through a fair
/// async lock.
pub struct ConfigStore {
    current: ArcSwap<Value>,
    lock: FairLock,
    history: Mutex<SnapshotHistory>,
    notifier: Arc<ChangeNotifier>,
    validator: Option<Arc<dyn Validator>>,
    total_updates: AtomicU64,
    /// 0 means "never updated".
    last_update_ms: AtomicU64,
}

impl ConfigStore {
    pub fn new(
        initial: Value,
        settings: &StoreSettings,
        notifier: Arc<ChangeNotifier>,
        validator: Option<Arc<dyn Validator>>,
    ) -> Self {
        let initial = Arc::new(initial);
        let mut history = SnapshotHistory::new(settings.history_capacity);
        history.push(ConfigSnapshot::new(initial.clone(), "system", Map::new()));

        Self {
            current: ArcSwap::new(initial),
            lock: FairLock::new(),
            history: Mutex::new(history),
            notifier,
            validator,
            total_updates: AtomicU64::new(0),
            last_update_ms: AtomicU64::new(0),
        }
    }

    /// The last committed configuration value. Never blocks on in-flight
    /// writes.
    pub fn current(&self) -> Arc<Value> {
        self.current.load_full()
    }

    /// Dotted-path lookup on the current value.
    pub fn get(&self, path: &str) -> Option<Value> {
        merge::get_path(&self.current.load(), path).cloned()
    }

    /// Deep-merge a partial update onto the current value and commit it.
    ///
    /// Validation failure is recoverable: the result carries the report and
    /// the store is unchanged. A commit failure restores the latest snapshot
    /// when `rollback_on_failure` is set.
    pub async fn update(&self, partial: Value, options: UpdateOptions) -> UpdateResult {
        let _guard = self.lock.acquire().await;

        let timestamp_ms = now_millis();
        let old = self.current.load_full();
        let affected_paths = merge::affected_paths(&partial);

        let snapshot_id = if options.rollback_on_failure {
            Some(self.record_snapshot(old.clone(), &options.source, options.metadata.clone()))
        } else {
            None
        };

        let mut candidate = (*old).clone();
        merge::deep_merge(&mut candidate, &partial);

        if options.validate {
            if let Some(validator) = &self.validator {
                let report = validator.validate(&candidate).await;
                if !report.is_valid {
                    tracing::warn!(
                        source = %options.source,
                        errors = ?report.errors,
                        "Update rejected by validator; store unchanged"
                    );
                    metrics::record_update(false);
                    return UpdateResult {
                        snapshot_id,
                        validation: Some(report),
                        ..UpdateResult::failure(timestamp_ms, affected_paths)
                    };
                }
            }
        }

        let new_value = Arc::new(candidate);
        if let Err(e) = self.commit(new_value.clone()) {
            let rollback_performed = options.rollback_on_failure && self.restore_latest_snapshot();
            tracing::error!(
                source = %options.source,
                error = %e,
                rollback_performed,
                "Commit failed"
            );
            metrics::record_update(false);
            return UpdateResult {
                snapshot_id,
                error: Some(e.to_string()),
                rollback_performed,
                ..UpdateResult::failure(timestamp_ms, affected_paths)
            };
        }

        self.total_updates.fetch_add(1, Ordering::Relaxed);
        self.last_update_ms.store(timestamp_ms, Ordering::Relaxed);
        metrics::record_update(true);

        if options.notify {
            let mut event = ChangeEvent::new(options.kind, options.source.clone());
            event.path = match affected_paths.as_slice() {
                [single] => Some(single.clone()),
                _ => None,
            };
            event.affected_paths = affected_paths.clone();
            event.old_value = Some(old);
            event.new_value = Some(new_value);
            event.timestamp_ms = timestamp_ms;
            event.metadata = options.metadata;
            self.notifier.notify(&event);
        }

        UpdateResult {
            success: true,
            snapshot_id,
            validation: None,
            error: None,
            rollback_performed: false,
            affected_paths,
            timestamp_ms,
        }
    }

    /// Sugar: build the nested single-key update for `path` and apply it.
    pub async fn update_path(
        &self,
        path: &str,
        value: Value,
        options: UpdateOptions,
    ) -> UpdateResult {
        self.update(merge::nest_path(path, value), options).await
    }

    /// Manual checkpoint of the current value. Returns the snapshot id.
    pub fn create_snapshot(&self, source: &str, metadata: Map<String, Value>) -> String {
        let id = self.record_snapshot(self.current.load_full(), source, metadata);
        metrics::record_snapshot();
        id
    }

    /// Atomically replace the current value with a stored snapshot's value.
    pub async fn rollback_to_snapshot(&self, id: &str) -> UpdateResult {
        let _guard = self.lock.acquire().await;
        let timestamp_ms = now_millis();

        let snapshot = self
            .history
            .lock()
            .expect("snapshot history mutex poisoned")
            .get(id)
            .cloned();
        let Some(snapshot) = snapshot else {
            return UpdateResult {
                error: Some(ConfigError::SnapshotNotFound(id.to_string()).to_string()),
                ..UpdateResult::failure(timestamp_ms, Vec::new())
            };
        };

        let old = self.current.load_full();
        self.current.store(snapshot.config.clone());
        self.total_updates.fetch_add(1, Ordering::Relaxed);
        self.last_update_ms.store(timestamp_ms, Ordering::Relaxed);
        metrics::record_rollback();

        tracing::info!(snapshot_id = %id, source = %snapshot.source, "Rolled back to snapshot");

        let affected_paths = merge::affected_paths(&snapshot.config);
        let mut event = ChangeEvent::new(ChangeKind::Update, "rollback");
        event.affected_paths = affected_paths.clone();
        event.old_value = Some(old);
        event.new_value = Some(snapshot.config);
        event.timestamp_ms = timestamp_ms;
        event.metadata.insert("rollback".into(), Value::Bool(true));
        event
            .metadata
            .insert("snapshot_id".into(), Value::String(id.to_string()));
        self.notifier.notify(&event);

        UpdateResult {
            success: true,
            snapshot_id: Some(id.to_string()),
            validation: None,
            error: None,
            rollback_performed: false,
            affected_paths,
            timestamp_ms,
        }
    }

    pub fn statistics(&self) -> StoreStatistics {
        let last = self.last_update_ms.load(Ordering::Relaxed);
        StoreStatistics {
            total_updates: self.total_updates.load(Ordering::Relaxed),
            snapshot_count: self
                .history
                .lock()
                .expect("snapshot history mutex poisoned")
                .len(),
            subscriber_count: self.notifier.subscriber_count(),
            is_locked: self.lock.is_locked(),
            last_update_time_ms: (last != 0).then_some(last),
        }
    }

    fn record_snapshot(
        &self,
        config: Arc<Value>,
        source: &str,
        metadata: Map<String, Value>,
    ) -> String {
        let snapshot = ConfigSnapshot::new(config, source, metadata);
        let id = snapshot.id.clone();
        let evicted = self
            .history
            .lock()
            .expect("snapshot history mutex poisoned")
            .push(snapshot);
        if let Some(evicted) = evicted {
            tracing::debug!(snapshot_id = %evicted, "Evicted oldest snapshot from history");
        }
        id
    }

    fn commit(&self, value: Arc<Value>) -> Result<(), ConfigError> {
        // The swap itself cannot fail; the signature leaves room for
        // fallible commit hooks and keeps the rollback path reachable.
        self.current.store(value);
        Ok(())
    }

    /// Restore the most recent snapshot. Returns false when the history is
    /// empty (the store then stays in its current state).
    fn restore_latest_snapshot(&self) -> bool {
        let latest = self
            .history
            .lock()
            .expect("snapshot history mutex poisoned")
            .latest()
            .map(|s| s.config.clone());
        match latest {
            Some(config) => {
                self.current.store(config);
                true
            }
            None => false,
        }
    }
}
