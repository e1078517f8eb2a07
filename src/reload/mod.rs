//! Hot reload of configuration from watched sources.
//!
//! # Data Flow
//! ```text
//! file change (notify) ──┐
//! remote poll (changed) ─┴→ per-source debounce (restarted on each burst)
//!     → debounce elapses → SourceLoader.load (file read / remote fetch)
//!     → ConfigStore.update(validate, rollback-on-failure)
//!     → HotReloadEvent broadcast (reload | validation-failed | error)
//!
//! A failed cycle returns the source to Idle; it keeps being watched.
//! ```
//!
//! # Design Decisions
//! - Only the last change in a burst triggers a reload
//! - Remote payloads are compared structurally against last-seen before
//!   being treated as a change
//! - Sources fail independently; one wedged source never blocks another

pub mod orchestrator;
pub mod source;
pub mod watcher;

pub use orchestrator::{HotReloadEvent, HotReloadOrchestrator};
pub use source::{FileSource, ReloadSource, RemoteSource, SourceLoadError, SourceLoader};
