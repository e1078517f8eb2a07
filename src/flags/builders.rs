//! Convenience constructors for common flag shapes.

use serde_json::Value;

use crate::flags::types::{FeatureFlag, Rule, RuleAction, Variant};

impl FeatureFlag {
    /// Plain on/off flag with no rules or variants.
    pub fn simple(name: impl Into<String>, enabled: bool) -> Self {
        Self::new(name, enabled)
    }

    /// Two-variant A/B flag with a 50/50 split.
    pub fn ab_test(name: impl Into<String>, config_a: Value, config_b: Value) -> Self {
        let mut flag = Self::new(name, true);
        flag.variants = vec![
            Variant::new("a", 0.5, config_a),
            Variant::new("b", 0.5, config_b),
        ];
        flag
    }

    /// Flag enabled for `percent` of the population, disabled for the rest.
    pub fn percentage_rollout(name: impl Into<String>, percent: f64) -> Self {
        let mut flag = Self::new(name, true);
        flag.rules = vec![
            Rule::new(format!("percentage < {percent}"), RuleAction::Enable),
            // `percentage < 100` always matches: the catch-all disable.
            Rule::new("percentage < 100", RuleAction::Disable),
        ];
        flag
    }

    /// Flag enabled only in the listed environments.
    pub fn per_environment(name: impl Into<String>, environments: &[&str]) -> Self {
        let mut flag = Self::new(name, true);
        flag.rules = environments
            .iter()
            .map(|env| Rule::new(format!("environment == \"{env}\""), RuleAction::Enable))
            .collect();
        flag.rules
            .push(Rule::new("percentage < 100", RuleAction::Disable));
        flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::engine::FeatureFlagEngine;
    use crate::flags::types::EvaluationContext;
    use serde_json::json;

    #[test]
    fn percentage_rollout_covers_roughly_the_requested_share() {
        let engine = FeatureFlagEngine::new();
        engine
            .register_flag(FeatureFlag::percentage_rollout("gradual", 30.0))
            .unwrap();

        let enabled = (0..1000)
            .filter(|i| {
                let ctx = EvaluationContext::new("e", "d").with_user(format!("user-{i}"));
                engine.evaluate("gradual", &ctx)
            })
            .count();

        assert!((200..=400).contains(&enabled), "got {enabled}");
    }

    #[test]
    fn per_environment_gates_on_environment() {
        let engine = FeatureFlagEngine::new();
        engine
            .register_flag(FeatureFlag::per_environment("canary", &["staging", "dev"]))
            .unwrap();

        assert!(engine.evaluate("canary", &EvaluationContext::new("staging", "d")));
        assert!(!engine.evaluate("canary", &EvaluationContext::new("production", "d")));
    }

    #[test]
    fn ab_test_weights_are_valid() {
        let flag = FeatureFlag::ab_test("exp", json!({"v": 1}), json!({"v": 2}));
        assert!(flag.validate_variants().is_ok());
    }
}
