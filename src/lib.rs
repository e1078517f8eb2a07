//! Live Runtime Configuration Engine
//!
//! A mutable configuration store with atomic validated updates,
//! snapshot/rollback, rule-based feature flags with percentage rollout and
//! A/B variants, a TTL/LRU cache kept coherent through change events, and a
//! hot-reload orchestrator watching file and remote sources.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │             RUNTIME CONFIGURATION ENGINE          │
//!                    │                                                   │
//!   update / reload  │  ┌──────────┐   ┌───────────┐   ┌─────────────┐  │
//!   ─────────────────┼─▶│ FairLock │──▶│ deep-merge│──▶│  Validator  │  │
//!                    │  └──────────┘   └───────────┘   └──────┬──────┘  │
//!                    │                                        │ commit   │
//!                    │                                        ▼          │
//!   current() ◀──────┼──────────────────────────────── ArcSwap<Value>   │
//!                    │                                        │          │
//!                    │                                        ▼          │
//!                    │  ┌───────────────┐            ┌───────────────┐  │
//!                    │  │  ConfigCache  │◀───events──│ ChangeNotifier│  │
//!                    │  └───────────────┘            └───────────────┘  │
//!                    │                                                   │
//!                    │  ┌──────────────────┐   ┌────────────────────┐   │
//!                    │  │ FeatureFlagEngine│   │HotReloadOrchestrator│  │
//!                    │  │ rules + variants │   │ watch/poll/debounce │  │
//!                    │  └──────────────────┘   └────────────────────┘   │
//!                    └──────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod cache;
pub mod events;
pub mod flags;
pub mod reload;
pub mod store;

// Capabilities and wiring
pub mod context;
pub mod error;
pub mod settings;
pub mod validate;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod sync;

pub use context::{EngineContext, EngineContextBuilder};
pub use error::ConfigError;
pub use events::{ChangeEvent, ChangeKind, ChangeNotifier};
pub use flags::{EvaluationContext, FeatureFlag, FeatureFlagEngine};
pub use reload::{HotReloadEvent, HotReloadOrchestrator};
pub use settings::EngineSettings;
pub use store::{ConfigStore, UpdateOptions, UpdateResult};
pub use validate::{ValidationReport, Validator};
