//! Feature flag registry and evaluation.
//!
//! # Data Flow
//! ```text
//! FeatureFlag registered (rules parsed to Condition ASTs once)
//!     → evaluate(name, ctx): disabled check → first matching rule wins
//!         → default enabled when no rule matches
//!     → get_variant(name, ctx): rule-pinned variant, else deterministic
//!         weighted bucketing by stable hash of the context
//! ```
//!
//! # Design Decisions
//! - Conditions are a small tagged AST, not regex over strings
//! - Unparseable conditions fail closed: never satisfied, never a panic
//! - Bucketing is deterministic per context so a user keeps their variant

pub mod builders;
pub mod condition;
pub mod engine;
pub mod types;

pub use condition::{stable_hash, Condition};
pub use engine::{Evaluation, FeatureFlagEngine};
pub use types::{
    EvaluationContext, FeatureFlag, FlagMetadata, FlagUpdate, Rule, RuleAction, UsageStats,
    Variant,
};
