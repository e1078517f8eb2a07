//! Flag, rule, and variant definitions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::events::types::now_millis;

/// Weight sums may drift by at most this much from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 0.001;

/// A named, independently toggleable unit of behavior with optional
/// targeting rules and experiment variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub metadata: FlagMetadata,
}

impl FeatureFlag {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            rules: Vec::new(),
            variants: Vec::new(),
            metadata: FlagMetadata::default(),
        }
    }

    /// Check the variant-weight invariant: a non-empty variant set must sum
    /// to 1.0 within tolerance, each weight within [0, 1].
    pub fn validate_variants(&self) -> Result<(), String> {
        if self.variants.is_empty() {
            return Ok(());
        }
        for variant in &self.variants {
            if !(0.0..=1.0).contains(&variant.weight) {
                return Err(format!(
                    "variant '{}' weight {} outside [0, 1]",
                    variant.name, variant.weight
                ));
            }
        }
        let sum: f64 = self.variants.iter().map(|v| v.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(format!("variant weights sum to {sum}, expected 1.0"));
        }
        Ok(())
    }
}

/// A targeting rule. Rules are scanned in registration order; the first one
/// whose condition is satisfied decides the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Condition text, e.g. `environment == "production"`.
    pub condition: String,
    pub action: RuleAction,
    /// Variant name for `action = "variant"`.
    #[serde(default)]
    pub value: Option<String>,
}

impl Rule {
    pub fn new(condition: impl Into<String>, action: RuleAction) -> Self {
        Self {
            condition: condition.into(),
            action,
            value: None,
        }
    }

    pub fn variant(condition: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            action: RuleAction::Variant,
            value: Some(variant.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Enable,
    Disable,
    Variant,
}

/// One weighted branch of an A/B-style flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    /// Fraction of traffic in [0, 1].
    pub weight: f64,
    /// Opaque payload handed to callers via `get_feature_config`.
    #[serde(default)]
    pub config: Value,
}

impl Variant {
    pub fn new(name: impl Into<String>, weight: f64, config: Value) -> Self {
        Self {
            name: name.into(),
            weight,
            config,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagMetadata {
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for FlagMetadata {
    fn default() -> Self {
        let now = now_millis();
        Self {
            created_at_ms: now,
            updated_at_ms: now,
            created_by: None,
            tags: Vec::new(),
        }
    }
}

/// Partial in-place update of a registered flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlagUpdate {
    pub enabled: Option<bool>,
    pub rules: Option<Vec<Rule>>,
    pub variants: Option<Vec<Variant>>,
    pub tags: Option<Vec<String>>,
}

/// Ephemeral per-evaluation context. Never stored by the engine.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    pub environment: String,
    pub deployment: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub timestamp_ms: u64,
    pub metadata: Option<Map<String, Value>>,
}

impl EvaluationContext {
    pub fn new(environment: impl Into<String>, deployment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            deployment: deployment.into(),
            user_id: None,
            session_id: None,
            timestamp_ms: now_millis(),
            metadata: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Snapshot of a flag's usage counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageStats {
    pub enabled_count: u64,
    pub disabled_count: u64,
    pub variant_counts: HashMap<String, u64>,
}
