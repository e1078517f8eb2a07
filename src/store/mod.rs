//! Runtime configuration store.
//!
//! # Data Flow
//! ```text
//! partial update (serde_json::Value)
//!     → FairLock (FIFO, serializes commits)
//!     → pre-update snapshot (rollback point)
//!     → merge.rs (deep-merge onto current value)
//!     → Validator (external capability, async)
//!     → atomic swap of Arc<Value> (readers never block)
//!     → ChangeEvent through ChangeNotifier
//!
//! Readers call current() at any time and observe either the pre- or the
//! post-update value, never a partial merge.
//! ```
//!
//! # Design Decisions
//! - The current value is replaced, never mutated in place
//! - Callers receive `Arc<Value>`: an immutable shared view that cannot
//!   corrupt store state
//! - Mutation failures are returned as structured results, never panics

pub mod manager;
pub mod merge;
pub mod snapshot;

pub use manager::{ConfigStore, StoreStatistics, UpdateOptions, UpdateResult};
pub use snapshot::ConfigSnapshot;
