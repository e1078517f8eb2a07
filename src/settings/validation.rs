//! Semantic validation of engine settings.
//!
//! Serde covers the syntactic layer; this pass checks value ranges and
//! referential sanity, and reports every problem rather than the first.

use std::collections::HashSet;

use crate::settings::schema::EngineSettings;

/// One semantic problem in a settings document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for SettingsValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate settings, returning all errors found.
pub fn validate_settings(settings: &EngineSettings) -> Result<(), Vec<SettingsValidationError>> {
    let mut errors = Vec::new();
    let mut push = |field: &str, message: String| {
        errors.push(SettingsValidationError {
            field: field.to_string(),
            message,
        });
    };

    if settings.store.history_capacity == 0 {
        push("store.history_capacity", "must be at least 1".into());
    }
    if settings.cache.capacity == 0 {
        push("cache.capacity", "must be at least 1".into());
    }
    if settings.cache.default_ttl_ms == 0 {
        push("cache.default_ttl_ms", "must be greater than 0".into());
    }
    if settings.reload.fetch_timeout_ms == 0 {
        push("reload.fetch_timeout_ms", "must be greater than 0".into());
    }
    if settings.reload.remote_poll_interval_ms == 0 {
        push("reload.remote_poll_interval_ms", "must be greater than 0".into());
    }

    let mut seen_ids = HashSet::new();
    for source in &settings.reload.remote_sources {
        if source.id.is_empty() {
            push("reload.remote_sources", "source id must not be empty".into());
        }
        if !seen_ids.insert(source.id.as_str()) {
            push(
                "reload.remote_sources",
                format!("duplicate source id '{}'", source.id),
            );
        }
        if url::Url::parse(&source.url).is_err() {
            push(
                "reload.remote_sources",
                format!("source '{}' has an invalid url '{}'", source.id, source.url),
            );
        }
    }

    if !LOG_LEVELS.contains(&settings.observability.log_level.as_str()) {
        push(
            "observability.log_level",
            format!("'{}' is not a log level", settings.observability.log_level),
        );
    }
    if settings.observability.metrics_enabled
        && settings
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        push(
            "observability.metrics_address",
            format!("'{}' is not a socket address", settings.observability.metrics_address),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
