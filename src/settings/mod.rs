//! Engine settings: the engine's own tunables, distinct from the runtime
//! configuration value it manages.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors reported)
//!     → EngineSettings (validated, immutable)
//!     → handed to each component at construction
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so a missing or minimal file still works
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_settings, SettingsError};
pub use schema::{
    CacheSettings, EngineSettings, ObservabilitySettings, ReloadSettings, RemoteSourceSettings,
    StoreSettings,
};
pub use validation::{validate_settings, SettingsValidationError};
