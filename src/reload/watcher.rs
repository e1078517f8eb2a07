//! File watcher bridging `notify` events into the orchestrator.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Watches configuration files and forwards the owning source id on every
/// relevant filesystem event. Raw events are deliberately un-debounced
/// here; the orchestrator owns debouncing.
pub struct FileWatcher {
    // Held so the underlying watcher stays alive.
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Start watching `paths`, sending each changed source's id on `tx`.
    pub fn spawn(
        paths: Vec<(String, PathBuf)>,
        tx: mpsc::UnboundedSender<String>,
    ) -> Result<Self, notify::Error> {
        // Canonicalize up front: notify reports absolute paths.
        let index: HashMap<PathBuf, String> = paths
            .iter()
            .map(|(id, path)| {
                let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
                (canonical, id.clone())
            })
            .collect();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    if !event.kind.is_modify() && !event.kind.is_create() {
                        return;
                    }
                    for event_path in &event.paths {
                        if let Some(id) = lookup(&index, event_path) {
                            tracing::debug!(source = %id, path = ?event_path, "Config file change detected");
                            let _ = tx.send(id.to_string());
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for (id, path) in &paths {
            watcher.watch(path, RecursiveMode::NonRecursive)?;
            tracing::info!(source = %id, path = ?path, "Watching config file");
        }

        Ok(Self { _watcher: watcher })
    }
}

fn lookup<'a>(index: &'a HashMap<PathBuf, String>, event_path: &Path) -> Option<&'a str> {
    if let Some(id) = index.get(event_path) {
        return Some(id);
    }
    // Editors often replace the file; match the canonical form too.
    let canonical = event_path.canonicalize().ok()?;
    index.get(&canonical).map(String::as_str)
}
