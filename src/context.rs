//! Explicit composition root.
//!
//! Every component is constructed once here and handed its collaborators
//! directly. Nothing is discovered through globals or by reaching into
//! another component's internals.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::ConfigCache;
use crate::error::ConfigError;
use crate::events::ChangeNotifier;
use crate::flags::FeatureFlagEngine;
use crate::lifecycle::Shutdown;
use crate::reload::{HotReloadOrchestrator, ReloadSource, SourceLoader};
use crate::settings::EngineSettings;
use crate::store::ConfigStore;
use crate::validate::Validator;

/// The wired-up engine: store, flags, cache, notifier, and hot reload.
pub struct EngineContext {
    pub settings: EngineSettings,
    pub notifier: Arc<ChangeNotifier>,
    pub store: Arc<ConfigStore>,
    pub flags: Arc<FeatureFlagEngine>,
    pub cache: Arc<ConfigCache>,
    pub reload: Arc<HotReloadOrchestrator>,
    pub shutdown: Shutdown,
}

impl EngineContext {
    pub fn builder(settings: EngineSettings) -> EngineContextBuilder {
        EngineContextBuilder {
            settings,
            initial: json!({}),
            validator: None,
            sources: Vec::new(),
            loaders: Vec::new(),
        }
    }

    /// Warm the cache, start background persistence, and begin watching
    /// reload sources.
    pub async fn start(&self) -> Result<(), ConfigError> {
        self.cache.warm_from_disk().await;
        tokio::spawn(
            self.cache
                .clone()
                .run_persistence(self.shutdown.subscribe()),
        );
        self.reload.start()?;
        Ok(())
    }

    /// Stop watching and signal background tasks to wind down.
    pub fn stop(&self) {
        self.shutdown.trigger();
        self.reload.stop();
    }
}

/// Builder for [`EngineContext`].
pub struct EngineContextBuilder {
    settings: EngineSettings,
    initial: Value,
    validator: Option<Arc<dyn Validator>>,
    sources: Vec<ReloadSource>,
    loaders: Vec<(String, Arc<dyn SourceLoader>)>,
}

impl EngineContextBuilder {
    /// Configuration value the store starts from.
    pub fn initial_config(mut self, initial: Value) -> Self {
        self.initial = initial;
        self
    }

    /// External validator applied to every merged candidate.
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Watch a configuration file in addition to those named in settings.
    pub fn watch_file(mut self, id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.sources.push(ReloadSource::File {
            id: id.into(),
            path: path.into(),
        });
        self
    }

    /// Add a reload source with an explicit descriptor.
    pub fn source(mut self, source: ReloadSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Override the loader for a source id.
    pub fn loader(mut self, id: impl Into<String>, loader: Arc<dyn SourceLoader>) -> Self {
        self.loaders.push((id.into(), loader));
        self
    }

    pub fn build(self) -> EngineContext {
        let notifier = Arc::new(ChangeNotifier::new());
        let store = Arc::new(ConfigStore::new(
            self.initial,
            &self.settings.store,
            notifier.clone(),
            self.validator,
        ));

        let flags = Arc::new(FeatureFlagEngine::new());
        flags.seed_from_config(&store.current());

        let cache = Arc::new(ConfigCache::new(&self.settings.cache));
        let cache_for_events = cache.clone();
        notifier.subscribe(move |event| {
            cache_for_events.handle_change_event(event);
            Ok(())
        });

        let mut sources = self.sources;
        sources.extend(sources_from_settings(&self.settings));

        let mut reload =
            HotReloadOrchestrator::new(store.clone(), self.settings.reload.clone(), sources);
        for (id, loader) in self.loaders {
            reload = reload.with_loader(id, loader);
        }

        EngineContext {
            settings: self.settings,
            notifier,
            store,
            flags,
            cache,
            reload: Arc::new(reload),
            shutdown: Shutdown::new(),
        }
    }
}

fn sources_from_settings(settings: &EngineSettings) -> Vec<ReloadSource> {
    let mut sources = Vec::new();
    let mut used_ids: Vec<String> = Vec::new();

    for (index, raw_path) in settings.reload.watch_paths.iter().enumerate() {
        let path = PathBuf::from(raw_path);
        let stem = Path::new(raw_path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("file-{index}"));
        let id = if used_ids.contains(&stem) {
            format!("{stem}-{index}")
        } else {
            stem
        };
        used_ids.push(id.clone());
        sources.push(ReloadSource::File { id, path });
    }

    for remote in &settings.reload.remote_sources {
        let url = match url::Url::parse(&remote.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(source = %remote.id, url = %remote.url, error = %e, "Skipping remote source with invalid url");
                continue;
            }
        };
        let poll_interval = Duration::from_millis(
            remote
                .poll_interval_ms
                .unwrap_or(settings.reload.remote_poll_interval_ms),
        );
        sources.push(ReloadSource::Remote {
            id: remote.id.clone(),
            url,
            poll_interval,
        });
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RemoteSourceSettings;

    #[tokio::test]
    async fn builds_wired_context() {
        let ctx = EngineContext::builder(EngineSettings::default())
            .initial_config(json!({"features": {"beta": true}}))
            .build();

        assert!(ctx.flags.evaluate(
            "beta",
            &crate::flags::EvaluationContext::new("staging", "blue")
        ));
        // The cache invalidation subscriber is registered at build time.
        assert_eq!(ctx.store.statistics().subscriber_count, 1);
    }

    #[test]
    fn settings_sources_get_unique_ids() {
        let mut settings = EngineSettings::default();
        settings.reload.watch_paths =
            vec!["/etc/app/config.json".into(), "/srv/other/config.json".into()];
        settings.reload.remote_sources = vec![RemoteSourceSettings {
            id: "control-plane".into(),
            url: "https://config.internal/engine.json".into(),
            poll_interval_ms: None,
        }];

        let sources = sources_from_settings(&settings);
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].id(), "config");
        assert_eq!(sources[1].id(), "config-1");
        assert_eq!(sources[2].id(), "control-plane");
    }
}
