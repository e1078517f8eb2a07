//! Process lifecycle coordination.
//!
//! # Data Flow
//! ```text
//! Signal received (ctrl-c) → Shutdown.trigger
//!     → orchestrator stops watching
//!     → cache flushes its final persisted snapshot
//!     → daemon exits
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
