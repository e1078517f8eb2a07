//! Reload source descriptors and loading capabilities.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a source failed to produce a configuration value.
#[derive(Debug, Error)]
pub enum SourceLoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Abstract loading capability: the orchestrator does not care whether a
/// source is a local file, an object-store blob, or an HTTP endpoint.
#[async_trait]
pub trait SourceLoader: Send + Sync {
    async fn load(&self) -> Result<Value, SourceLoadError>;
}

/// A watched source of configuration.
#[derive(Debug, Clone)]
pub enum ReloadSource {
    /// Local file, watched for change notifications.
    File { id: String, path: PathBuf },
    /// Remote endpoint, polled on a fixed interval.
    Remote {
        id: String,
        url: Url,
        poll_interval: Duration,
    },
}

impl ReloadSource {
    pub fn id(&self) -> &str {
        match self {
            ReloadSource::File { id, .. } | ReloadSource::Remote { id, .. } => id,
        }
    }
}

/// Loads and parses a configuration file. JSON by default; TOML when the
/// extension says so.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SourceLoader for FileSource {
    async fn load(&self) -> Result<Value, SourceLoadError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let is_toml = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            let parsed: toml::Value =
                toml::from_str(&content).map_err(|e| SourceLoadError::Parse(e.to_string()))?;
            serde_json::to_value(parsed).map_err(|e| SourceLoadError::Parse(e.to_string()))
        } else {
            serde_json::from_str(&content).map_err(|e| SourceLoadError::Parse(e.to_string()))
        }
    }
}

/// Fetches a JSON configuration from an HTTP endpoint with an explicit
/// timeout, so a stalled call cannot wedge the source's reload cycle.
pub struct RemoteSource {
    url: Url,
    client: reqwest::Client,
    timeout: Duration,
}

impl RemoteSource {
    pub fn new(url: Url, timeout: Duration) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl SourceLoader for RemoteSource {
    async fn load(&self) -> Result<Value, SourceLoadError> {
        let response = self
            .client
            .get(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceLoadError::Timeout(self.timeout)
                } else {
                    SourceLoadError::Http(e.to_string())
                }
            })?;

        let response = response
            .error_for_status()
            .map_err(|e| SourceLoadError::Http(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| SourceLoadError::Parse(e.to_string()))
    }
}
