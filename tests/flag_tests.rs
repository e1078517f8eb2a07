//! Integration tests for the feature flag engine.

use serde_json::json;
use std::collections::HashMap;

use runtime_config::flags::{
    EvaluationContext, FeatureFlag, FeatureFlagEngine, Rule, RuleAction, Variant,
};

fn engine() -> FeatureFlagEngine {
    FeatureFlagEngine::new()
}

#[tokio::test]
async fn enabled_flag_without_rules_is_on_for_every_context() {
    let engine = engine();
    engine.register_flag(FeatureFlag::new("x", true)).unwrap();

    assert!(engine.evaluate("x", &EvaluationContext::new("production", "blue")));
    assert!(engine.evaluate("x", &EvaluationContext::new("dev", "green").with_user("u1")));
    assert!(engine.evaluate("x", &EvaluationContext::default()));
}

#[tokio::test]
async fn disabled_flag_wins_over_enabling_rule() {
    let engine = engine();
    let mut flag = FeatureFlag::new("gated", false);
    flag.rules = vec![Rule::new("environment == \"staging\"", RuleAction::Enable)];
    engine.register_flag(flag).unwrap();

    let result = engine.evaluate_detailed("gated", &EvaluationContext::new("staging", "blue"));
    assert!(!result.enabled);
    assert_eq!(result.reason, "globally disabled");
}

#[tokio::test]
async fn beta_flag_disabled_in_production_only() {
    let engine = engine();
    let mut flag = FeatureFlag::new("beta", true);
    flag.rules = vec![Rule::new(
        "environment == \"production\"",
        RuleAction::Disable,
    )];
    engine.register_flag(flag).unwrap();

    assert!(!engine.evaluate("beta", &EvaluationContext::new("production", "blue")));
    assert!(engine.evaluate("beta", &EvaluationContext::new("staging", "blue")));
}

#[tokio::test]
async fn same_user_always_gets_the_same_variant() {
    let engine = engine();
    engine
        .register_flag(FeatureFlag::ab_test(
            "exp",
            json!({"layout": "old"}),
            json!({"layout": "new"}),
        ))
        .unwrap();

    let ctx = EvaluationContext::new("production", "blue").with_user("user-123");
    let first = engine.get_variant("exp", &ctx).unwrap();
    for _ in 0..20 {
        assert_eq!(engine.get_variant("exp", &ctx).unwrap(), first);
    }
}

#[tokio::test]
async fn fifty_fifty_split_is_roughly_even() {
    let engine = engine();
    engine
        .register_flag(FeatureFlag::ab_test("exp", json!({}), json!({})))
        .unwrap();

    let mut counts: HashMap<String, usize> = HashMap::new();
    for i in 0..10_000 {
        let ctx = EvaluationContext::new("production", "blue").with_user(format!("user-{i}"));
        let variant = engine.get_variant("exp", &ctx).unwrap();
        *counts.entry(variant).or_default() += 1;
    }

    let a = counts.get("a").copied().unwrap_or(0);
    assert!(
        (4500..=5500).contains(&a),
        "split out of tolerance: {counts:?}"
    );
}

#[tokio::test]
async fn variant_rule_pins_the_variant() {
    let engine = engine();
    let mut flag = FeatureFlag::ab_test("exp", json!({"tier": "a"}), json!({"tier": "b"}));
    flag.rules = vec![Rule::variant("userId == \"vip\"", "b")];
    engine.register_flag(flag).unwrap();

    let vip = EvaluationContext::new("production", "blue").with_user("vip");
    assert_eq!(engine.get_variant("exp", &vip), Some("b".to_string()));
    assert_eq!(engine.get_feature_config("exp", &vip), Some(json!({"tier": "b"})));

    let detailed = engine.evaluate_detailed("exp", &vip);
    assert!(detailed.enabled);
    assert_eq!(detailed.variant, Some("b".to_string()));
}

#[tokio::test]
async fn feature_config_is_true_without_variants_and_none_when_disabled() {
    let engine = engine();
    engine.register_flag(FeatureFlag::new("plain", true)).unwrap();
    engine.register_flag(FeatureFlag::new("off", false)).unwrap();

    let ctx = EvaluationContext::new("e", "d");
    assert_eq!(engine.get_feature_config("plain", &ctx), Some(json!(true)));
    assert_eq!(engine.get_feature_config("off", &ctx), None);
    assert_eq!(engine.get_feature_config("missing", &ctx), None);
}

#[tokio::test]
async fn session_id_buckets_when_user_is_absent() {
    let engine = engine();
    engine
        .register_flag(FeatureFlag::ab_test("exp", json!({}), json!({})))
        .unwrap();

    let ctx = EvaluationContext::new("production", "blue").with_session("session-9");
    let first = engine.get_variant("exp", &ctx).unwrap();
    assert_eq!(engine.get_variant("exp", &ctx).unwrap(), first);
}

#[tokio::test]
async fn registry_lifecycle() {
    let engine = engine();
    engine
        .register_flags(vec![
            FeatureFlag::new("one", true),
            FeatureFlag::new("two", false),
        ])
        .unwrap();

    assert_eq!(engine.flag_count(), 2);
    assert!(engine.remove_flag("one"));
    assert!(!engine.remove_flag("one"));
    assert_eq!(engine.flag_count(), 1);

    // Evaluating a removed flag reports "not found", not a stale answer.
    let result = engine.evaluate_detailed("one", &EvaluationContext::new("e", "d"));
    assert!(!result.enabled);
    assert_eq!(result.reason, "not found");
}

#[tokio::test]
async fn percentage_rule_targets_a_stable_cohort() {
    let engine = engine();
    let mut flag = FeatureFlag::new("rollout", true);
    flag.rules = vec![
        Rule::new("percentage < 40", RuleAction::Enable),
        Rule::new("percentage < 100", RuleAction::Disable),
    ];
    engine.register_flag(flag).unwrap();

    let enabled: Vec<bool> = (0..1000)
        .map(|i| {
            let ctx = EvaluationContext::new("e", "d").with_user(format!("user-{i}"));
            engine.evaluate("rollout", &ctx)
        })
        .collect();

    let on = enabled.iter().filter(|e| **e).count();
    assert!((300..=500).contains(&on), "cohort size {on}");

    // Same users, same answers.
    for i in 0..50 {
        let ctx = EvaluationContext::new("e", "d").with_user(format!("user-{i}"));
        assert_eq!(engine.evaluate("rollout", &ctx), enabled[i]);
    }
}

#[tokio::test]
async fn weighted_variants_respect_unequal_weights() {
    let engine = engine();
    let mut flag = FeatureFlag::new("exp", true);
    flag.variants = vec![
        Variant::new("control", 0.9, json!({})),
        Variant::new("treatment", 0.1, json!({})),
    ];
    engine.register_flag(flag).unwrap();

    let treatment = (0..10_000)
        .filter(|i| {
            let ctx = EvaluationContext::new("e", "d").with_user(format!("user-{i}"));
            engine.get_variant("exp", &ctx).as_deref() == Some("treatment")
        })
        .count();

    assert!((600..=1400).contains(&treatment), "treatment share {treatment}");
}
