//! Per-source reload state machine and debouncing.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::error::ConfigError;
use crate::events::ChangeKind;
use crate::observability::metrics;
use crate::reload::source::{FileSource, ReloadSource, RemoteSource, SourceLoader};
use crate::reload::watcher::FileWatcher;
use crate::settings::ReloadSettings;
use crate::store::{ConfigStore, UpdateOptions};
use crate::validate::ValidationReport;

/// Outcome of a reload cycle, broadcast to interested listeners.
#[derive(Debug, Clone)]
pub enum HotReloadEvent {
    Reload {
        source: String,
        config: Arc<Value>,
    },
    ValidationFailed {
        source: String,
        validation: ValidationReport,
    },
    Error {
        source: String,
        message: String,
    },
}

/// Watches file and remote sources and drives store updates through the
/// same validated, rollback-protected path as any other writer.
///
/// Each source runs the state machine
/// `Idle → PendingDebounce → Applying → Idle` independently.
pub struct HotReloadOrchestrator {
    store: Arc<ConfigStore>,
    settings: ReloadSettings,
    sources: Vec<ReloadSource>,
    loaders: HashMap<String, Arc<dyn SourceLoader>>,
    events_tx: broadcast::Sender<HotReloadEvent>,
    running: AtomicBool,
    /// Debounce generation per source; a newer generation supersedes any
    /// pending timer.
    generations: DashMap<String, u64>,
    /// Last payload seen per remote source, for structural comparison.
    last_seen: DashMap<String, Value>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    watcher: Mutex<Option<FileWatcher>>,
}

impl HotReloadOrchestrator {
    pub fn new(store: Arc<ConfigStore>, settings: ReloadSettings, sources: Vec<ReloadSource>) -> Self {
        let fetch_timeout = Duration::from_millis(settings.fetch_timeout_ms);
        let loaders: HashMap<String, Arc<dyn SourceLoader>> = sources
            .iter()
            .map(|source| {
                let loader: Arc<dyn SourceLoader> = match source {
                    ReloadSource::File { path, .. } => Arc::new(FileSource::new(path.clone())),
                    ReloadSource::Remote { url, .. } => {
                        Arc::new(RemoteSource::new(url.clone(), fetch_timeout))
                    }
                };
                (source.id().to_string(), loader)
            })
            .collect();

        let (events_tx, _) = broadcast::channel(64);
        Self {
            store,
            settings,
            sources,
            loaders,
            events_tx,
            running: AtomicBool::new(false),
            generations: DashMap::new(),
            last_seen: DashMap::new(),
            tasks: Mutex::new(Vec::new()),
            watcher: Mutex::new(None),
        }
    }

    /// Replace the loader for a source, e.g. to read from an object store
    /// instead of the local filesystem.
    pub fn with_loader(mut self, id: impl Into<String>, loader: Arc<dyn SourceLoader>) -> Self {
        self.loaders.insert(id.into(), loader);
        self
    }

    /// Listen for reload outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<HotReloadEvent> {
        self.events_tx.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Begin watching all configured sources. No-op if already running.
    pub fn start(self: &Arc<Self>) -> Result<(), ConfigError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let file_paths: Vec<(String, std::path::PathBuf)> = self
            .sources
            .iter()
            .filter_map(|source| match source {
                ReloadSource::File { id, path } => Some((id.clone(), path.clone())),
                ReloadSource::Remote { .. } => None,
            })
            .collect();

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        if !file_paths.is_empty() {
            let watcher = FileWatcher::spawn(file_paths, tx).map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                ConfigError::Watch(e.to_string())
            })?;
            *self.watcher.lock().expect("watcher mutex poisoned") = Some(watcher);
        }

        let mut tasks = self.tasks.lock().expect("task list mutex poisoned");

        // Dispatcher: raw file notifications restart the source's debounce.
        let this = self.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(source_id) = rx.recv().await {
                this.schedule_debounced(source_id);
            }
        }));

        // One poller per remote source; a wedged fetch only stalls its own
        // source.
        for source in &self.sources {
            let ReloadSource::Remote { id, poll_interval, .. } = source else {
                continue;
            };
            let id = id.clone();
            let poll_interval = *poll_interval;
            let this = self.clone();
            tasks.push(tokio::spawn(async move {
                // Spread pollers out so many sources do not fetch in step.
                let jitter = fastrand::u64(0..poll_interval.as_millis().max(1) as u64 / 10 + 1);
                tokio::time::sleep(Duration::from_millis(jitter)).await;

                let mut ticker = tokio::time::interval(poll_interval);
                loop {
                    ticker.tick().await;
                    if !this.is_running() {
                        break;
                    }
                    this.poll_remote(&id).await;
                }
            }));
        }

        tracing::info!(sources = self.sources.len(), "Hot reload orchestrator started");
        Ok(())
    }

    /// Cancel all watchers, pollers, and pending debounce timers.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        for task in self.tasks.lock().expect("task list mutex poisoned").drain(..) {
            task.abort();
        }
        *self.watcher.lock().expect("watcher mutex poisoned") = None;
        tracing::info!("Hot reload orchestrator stopped");
    }

    /// Operator-initiated reload of one source, bypassing debounce.
    pub async fn trigger_reload(&self, source_id: &str) -> Result<(), ConfigError> {
        if !self.loaders.contains_key(source_id) {
            return Err(ConfigError::UnknownSource(source_id.to_string()));
        }
        self.apply(source_id).await;
        Ok(())
    }

    /// Restart the source's debounce window; only the generation that is
    /// still current when the window elapses applies the reload.
    fn schedule_debounced(self: &Arc<Self>, source_id: String) {
        let generation = {
            let mut entry = self.generations.entry(source_id.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let debounce = Duration::from_millis(self.settings.debounce_ms);
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let current = this.generations.get(&source_id).map(|g| *g);
            if current != Some(generation) || !this.is_running() {
                return;
            }
            this.apply(&source_id).await;
        });
    }

    async fn poll_remote(&self, source_id: &str) {
        let Some(loader) = self.loaders.get(source_id) else {
            return;
        };
        match loader.load().await {
            Ok(value) => {
                let unchanged = self
                    .last_seen
                    .get(source_id)
                    .is_some_and(|seen| *seen == value);
                if unchanged {
                    return;
                }
                self.last_seen.insert(source_id.to_string(), value);
                tracing::debug!(source = %source_id, "Remote payload changed");
                self.apply(source_id).await;
            }
            Err(e) => {
                tracing::warn!(source = %source_id, error = %e, "Remote poll failed; will retry");
                metrics::record_reload(source_id, "error");
                let _ = self.events_tx.send(HotReloadEvent::Error {
                    source: source_id.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    /// The `Applying` state: load the source and push it through the store.
    async fn apply(&self, source_id: &str) {
        let Some(loader) = self.loaders.get(source_id) else {
            return;
        };

        let value = match loader.load().await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(source = %source_id, error = %e, "Reload source failed to load");
                metrics::record_reload(source_id, "error");
                let _ = self.events_tx.send(HotReloadEvent::Error {
                    source: source_id.to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };

        let options = UpdateOptions {
            kind: ChangeKind::Reload,
            source: format!("hot-reload:{source_id}"),
            ..UpdateOptions::default()
        };
        let result = self.store.update(value, options).await;

        if result.success {
            tracing::info!(source = %source_id, paths = result.affected_paths.len(), "Configuration reloaded");
            metrics::record_reload(source_id, "reload");
            let _ = self.events_tx.send(HotReloadEvent::Reload {
                source: source_id.to_string(),
                config: self.store.current(),
            });
        } else if let Some(validation) = result.validation {
            tracing::warn!(
                source = %source_id,
                errors = ?validation.errors,
                "Reload rejected by validator; keeping current configuration"
            );
            metrics::record_reload(source_id, "validation-failed");
            let _ = self.events_tx.send(HotReloadEvent::ValidationFailed {
                source: source_id.to_string(),
                validation,
            });
        } else {
            let message = result.error.unwrap_or_else(|| "commit failed".to_string());
            tracing::error!(source = %source_id, error = %message, "Reload failed");
            metrics::record_reload(source_id, "error");
            let _ = self.events_tx.send(HotReloadEvent::Error {
                source: source_id.to_string(),
                message,
            });
        }
    }
}
