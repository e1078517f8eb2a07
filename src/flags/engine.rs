//! Flag registry and evaluator.

use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ConfigError;
use crate::events::types::now_millis;
use crate::flags::condition::{stable_hash, Condition};
use crate::flags::types::{
    EvaluationContext, FeatureFlag, FlagUpdate, RuleAction, UsageStats,
};
use crate::observability::metrics;

/// Outcome of a detailed evaluation.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub enabled: bool,
    pub variant: Option<String>,
    pub reason: String,
}

#[derive(Default)]
struct FlagUsage {
    enabled: AtomicU64,
    disabled: AtomicU64,
    variants: DashMap<String, AtomicU64>,
}

impl FlagUsage {
    fn snapshot(&self) -> UsageStats {
        UsageStats {
            enabled_count: self.enabled.load(Ordering::Relaxed),
            disabled_count: self.disabled.load(Ordering::Relaxed),
            variant_counts: self
                .variants
                .iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect(),
        }
    }

    fn reset(&self) {
        self.enabled.store(0, Ordering::Relaxed);
        self.disabled.store(0, Ordering::Relaxed);
        self.variants.clear();
    }

    fn bump_variant(&self, name: &str) {
        self.variants
            .entry(name.to_string())
            .or_default()
            .fetch_add(1, Ordering::Relaxed);
    }
}

struct FlagEntry {
    flag: FeatureFlag,
    /// Parsed conditions, parallel to `flag.rules`. `None` marks an
    /// unparseable condition, which is never satisfied.
    conditions: Vec<Option<Condition>>,
    usage: FlagUsage,
}

impl FlagEntry {
    fn new(flag: FeatureFlag) -> Self {
        let conditions = parse_conditions(&flag);
        Self {
            flag,
            conditions,
            usage: FlagUsage::default(),
        }
    }
}

fn parse_conditions(flag: &FeatureFlag) -> Vec<Option<Condition>> {
    flag.rules
        .iter()
        .map(|rule| match Condition::parse(&rule.condition) {
            Ok(condition) => Some(condition),
            Err(e) => {
                tracing::warn!(
                    flag = %flag.name,
                    condition = %rule.condition,
                    error = %e,
                    "Unparseable rule condition; rule will never match"
                );
                None
            }
        })
        .collect()
}

/// Registry of feature flags plus the rule evaluator and variant selector.
///
/// Independent of the configuration store at runtime; typically seeded from
/// it once at startup via [`seed_from_config`](Self::seed_from_config).
pub struct FeatureFlagEngine {
    flags: DashMap<String, FlagEntry>,
}

impl FeatureFlagEngine {
    pub fn new() -> Self {
        Self {
            flags: DashMap::new(),
        }
    }

    /// Register (or replace) a flag. Rejects invalid variant weights.
    pub fn register_flag(&self, flag: FeatureFlag) -> Result<(), ConfigError> {
        flag.validate_variants()
            .map_err(|reason| ConfigError::InvalidFlag {
                name: flag.name.clone(),
                reason,
            })?;
        tracing::debug!(flag = %flag.name, enabled = flag.enabled, "Registered flag");
        self.flags.insert(flag.name.clone(), FlagEntry::new(flag));
        Ok(())
    }

    /// Register a batch of flags; stops at the first invalid definition.
    pub fn register_flags(&self, flags: Vec<FeatureFlag>) -> Result<(), ConfigError> {
        for flag in flags {
            self.register_flag(flag)?;
        }
        Ok(())
    }

    /// Update a flag in place: preserves `created_at`, bumps `updated_at`.
    /// Returns false (and leaves the flag untouched) when the flag is
    /// missing or the new variant set is weight-invalid.
    pub fn update_flag(&self, name: &str, update: FlagUpdate) -> bool {
        let Some(mut entry) = self.flags.get_mut(name) else {
            return false;
        };

        if let Some(variants) = &update.variants {
            let mut candidate = entry.flag.clone();
            candidate.variants = variants.clone();
            if let Err(reason) = candidate.validate_variants() {
                tracing::warn!(flag = %name, %reason, "Rejected flag update");
                return false;
            }
        }

        if let Some(enabled) = update.enabled {
            entry.flag.enabled = enabled;
        }
        if let Some(rules) = update.rules {
            entry.flag.rules = rules;
            entry.conditions = parse_conditions(&entry.flag);
        }
        if let Some(variants) = update.variants {
            entry.flag.variants = variants;
        }
        if let Some(tags) = update.tags {
            entry.flag.metadata.tags = tags;
        }
        entry.flag.metadata.updated_at_ms = now_millis();
        true
    }

    pub fn remove_flag(&self, name: &str) -> bool {
        self.flags.remove(name).is_some()
    }

    pub fn get_flag(&self, name: &str) -> Option<FeatureFlag> {
        self.flags.get(name).map(|e| e.flag.clone())
    }

    pub fn flag_names(&self) -> Vec<String> {
        self.flags.iter().map(|e| e.key().clone()).collect()
    }

    pub fn flag_count(&self) -> usize {
        self.flags.len()
    }

    /// Boolean evaluation; see [`evaluate_detailed`](Self::evaluate_detailed).
    pub fn evaluate(&self, name: &str, ctx: &EvaluationContext) -> bool {
        self.evaluate_detailed(name, ctx).enabled
    }

    /// Full evaluation: disabled flags short-circuit, then the first
    /// matching rule in registration order decides, and a flag with no
    /// matching rule defaults to enabled.
    pub fn evaluate_detailed(&self, name: &str, ctx: &EvaluationContext) -> Evaluation {
        let Some(entry) = self.flags.get(name) else {
            return Evaluation {
                enabled: false,
                variant: None,
                reason: "not found".to_string(),
            };
        };

        let evaluation = Self::evaluate_entry(&entry, ctx);
        if evaluation.enabled {
            entry.usage.enabled.fetch_add(1, Ordering::Relaxed);
        } else {
            entry.usage.disabled.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(variant) = &evaluation.variant {
            entry.usage.bump_variant(variant);
        }
        metrics::record_flag_evaluation(name, evaluation.enabled);
        evaluation
    }

    fn evaluate_entry(entry: &FlagEntry, ctx: &EvaluationContext) -> Evaluation {
        if !entry.flag.enabled {
            return Evaluation {
                enabled: false,
                variant: None,
                reason: "globally disabled".to_string(),
            };
        }

        for (rule, condition) in entry.flag.rules.iter().zip(&entry.conditions) {
            let Some(condition) = condition else {
                continue;
            };
            if !condition.evaluate(ctx) {
                continue;
            }
            // First satisfied rule wins; no further rules are considered.
            return match rule.action {
                RuleAction::Enable => Evaluation {
                    enabled: true,
                    variant: None,
                    reason: format!("rule matched: {}", rule.condition),
                },
                RuleAction::Disable => Evaluation {
                    enabled: false,
                    variant: None,
                    reason: format!("rule matched: {}", rule.condition),
                },
                RuleAction::Variant => Evaluation {
                    enabled: true,
                    variant: rule.value.clone(),
                    reason: format!("rule matched: {}", rule.condition),
                },
            };
        }

        Evaluation {
            enabled: true,
            variant: None,
            reason: "no rules matched; default enabled".to_string(),
        }
    }

    /// Variant for a context: a matching `variant` rule wins, otherwise
    /// deterministic weighted selection over the flag's variants.
    pub fn get_variant(&self, name: &str, ctx: &EvaluationContext) -> Option<String> {
        let entry = self.flags.get(name)?;
        if !entry.flag.enabled {
            return None;
        }

        for (rule, condition) in entry.flag.rules.iter().zip(&entry.conditions) {
            if rule.action != RuleAction::Variant {
                continue;
            }
            let Some(condition) = condition else {
                continue;
            };
            if condition.evaluate(ctx) {
                if let Some(variant) = &rule.value {
                    entry.usage.bump_variant(variant);
                    return Some(variant.clone());
                }
            }
        }

        if entry.flag.variants.is_empty() {
            return None;
        }

        let fallback_key;
        let key = match (ctx.user_id.as_deref(), ctx.session_id.as_deref()) {
            (Some(user_id), _) => user_id,
            (None, Some(session_id)) => session_id,
            (None, None) => {
                fallback_key = format!("{}-{}", ctx.environment, ctx.deployment);
                &fallback_key
            }
        };
        let unit = f64::from(stable_hash(key)) / (f64::from(u32::MAX) + 1.0);

        let mut cumulative = 0.0;
        for variant in &entry.flag.variants {
            cumulative += variant.weight;
            if unit < cumulative {
                entry.usage.bump_variant(&variant.name);
                return Some(variant.name.clone());
            }
        }
        // Weight sum may fall a hair short of 1.0; the last variant absorbs
        // the remainder.
        let last = entry.flag.variants.last()?;
        entry.usage.bump_variant(&last.name);
        Some(last.name.clone())
    }

    /// The selected variant's payload, `true` for a variant-less enabled
    /// flag, `None` when disabled.
    pub fn get_feature_config(&self, name: &str, ctx: &EvaluationContext) -> Option<Value> {
        if !self.evaluate(name, ctx) {
            return None;
        }
        match self.get_variant(name, ctx) {
            Some(variant_name) => {
                let config = self.flags.get(name).and_then(|entry| {
                    entry
                        .flag
                        .variants
                        .iter()
                        .find(|v| v.name == variant_name)
                        .map(|v| v.config.clone())
                });
                Some(config.unwrap_or(Value::Bool(true)))
            }
            None => Some(Value::Bool(true)),
        }
    }

    pub fn usage_stats(&self, name: &str) -> Option<UsageStats> {
        self.flags.get(name).map(|e| e.usage.snapshot())
    }

    pub fn all_usage_stats(&self) -> HashMap<String, UsageStats> {
        self.flags
            .iter()
            .map(|e| (e.key().clone(), e.usage.snapshot()))
            .collect()
    }

    /// Reset counters for one flag, or for all flags when `name` is `None`.
    pub fn reset_usage_stats(&self, name: Option<&str>) {
        match name {
            Some(name) => {
                if let Some(entry) = self.flags.get(name) {
                    entry.usage.reset();
                }
            }
            None => {
                for entry in self.flags.iter() {
                    entry.usage.reset();
                }
            }
        }
    }

    /// Seed the registry from a configuration value's `features` section.
    /// Booleans become simple flags; objects are full flag definitions.
    /// Returns the number of flags registered.
    pub fn seed_from_config(&self, config: &Value) -> usize {
        let Some(features) = config.get("features").and_then(Value::as_object) else {
            return 0;
        };

        let mut seeded = 0;
        for (name, definition) in features {
            let flag = match definition {
                Value::Bool(enabled) => FeatureFlag::new(name, *enabled),
                Value::Object(map) => {
                    let mut map = map.clone();
                    map.entry("name".to_string())
                        .or_insert_with(|| Value::String(name.clone()));
                    match serde_json::from_value::<FeatureFlag>(Value::Object(map)) {
                        Ok(flag) => flag,
                        Err(e) => {
                            tracing::warn!(flag = %name, error = %e, "Skipping malformed flag definition");
                            continue;
                        }
                    }
                }
                _ => {
                    tracing::warn!(flag = %name, "Skipping flag definition: expected bool or object");
                    continue;
                }
            };
            match self.register_flag(flag) {
                Ok(()) => seeded += 1,
                Err(e) => tracing::warn!(flag = %name, error = %e, "Skipping invalid flag definition"),
            }
        }
        if seeded > 0 {
            tracing::info!(count = seeded, "Seeded feature flags from configuration");
        }
        seeded
    }
}

impl Default for FeatureFlagEngine {
    fn default() -> Self {
        Self::new()
    }
}
