//! Error types for the configuration engine.
//!
//! Store mutations report failures through structured results
//! ([`UpdateResult`](crate::store::UpdateResult)) rather than errors, so this
//! taxonomy covers the places where a `Result` is the natural shape: lookups,
//! source loading, and commit failures.

use thiserror::Error;

/// Top-level error for engine operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The merged candidate configuration was rejected by the validator.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced snapshot id does not exist in the history.
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// A referenced flag name is not registered.
    #[error("flag not found: {0}")]
    FlagNotFound(String),

    /// A flag definition violates an invariant (e.g. variant weights).
    #[error("invalid flag '{name}': {reason}")]
    InvalidFlag { name: String, reason: String },

    /// A referenced reload source id is not configured.
    #[error("unknown reload source: {0}")]
    UnknownSource(String),

    /// A hot-reload source failed to load or parse.
    #[error("source load failed: {0}")]
    SourceLoad(String),

    /// The filesystem watcher could not be started.
    #[error("watch error: {0}")]
    Watch(String),

    /// An unexpected failure while committing an update.
    #[error("commit failed: {0}")]
    Commit(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
