//! Derived-configuration cache.
//!
//! # Data Flow
//! ```text
//! set(key, value, ttl) → LRU eviction on overflow → entry stored
//! get(key) → expired? lazy removal, miss : hit, recency bumped
//! ChangeEvent → handle_change_event → overlapping keys removed
//!     (event-driven coherence; no polling loop)
//! ```
//!
//! # Design Decisions
//! - TTL is checked lazily at read time, LRU only at write-time overflow
//! - Entry size is a serialized-length estimate, for reporting only
//! - Persistence is asynchronous and never sits on the get/set path

pub mod layer;
pub mod persistence;

pub use layer::{CacheStatistics, ConfigCache, InvalidationStrategy};
