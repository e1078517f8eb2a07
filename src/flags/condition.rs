//! Rule condition grammar: a tagged AST, a tiny parser, and a pure
//! interpreter.
//!
//! Supported forms:
//! ```text
//! environment == "<env>"
//! deployment == "<dep>"
//! userId == "<id>"
//! percentage < <N>
//! ```
//! Anything else fails to parse and the rule fails closed.

use thiserror::Error;

use crate::flags::types::EvaluationContext;

/// Context field a condition tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Environment,
    Deployment,
    UserId,
    Percentage,
}

/// Parsed rule condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Field, String),
    LessThan(Field, f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseConditionError {
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("malformed condition '{0}'")]
    Malformed(String),
    #[error("expected quoted literal in '{0}'")]
    UnquotedLiteral(String),
    #[error("invalid threshold in '{0}'")]
    InvalidThreshold(String),
}

impl Condition {
    /// Parse a condition string into its AST.
    pub fn parse(input: &str) -> Result<Self, ParseConditionError> {
        let input = input.trim();
        if let Some((left, right)) = input.split_once("==") {
            let field = parse_field(left.trim())?;
            if field == Field::Percentage {
                return Err(ParseConditionError::Malformed(input.to_string()));
            }
            let literal = right.trim();
            let unquoted = literal
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .ok_or_else(|| ParseConditionError::UnquotedLiteral(input.to_string()))?;
            return Ok(Condition::Equals(field, unquoted.to_string()));
        }
        if let Some((left, right)) = input.split_once('<') {
            let field = parse_field(left.trim())?;
            if field != Field::Percentage {
                return Err(ParseConditionError::Malformed(input.to_string()));
            }
            let threshold: f64 = right
                .trim()
                .parse()
                .map_err(|_| ParseConditionError::InvalidThreshold(input.to_string()))?;
            return Ok(Condition::LessThan(field, threshold));
        }
        Err(ParseConditionError::Malformed(input.to_string()))
    }

    /// Evaluate against a context. Pure; never fails.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> bool {
        match self {
            Condition::Equals(Field::Environment, literal) => ctx.environment == *literal,
            Condition::Equals(Field::Deployment, literal) => ctx.deployment == *literal,
            Condition::Equals(Field::UserId, literal) => {
                ctx.user_id.as_deref() == Some(literal.as_str())
            }
            Condition::LessThan(Field::Percentage, threshold) => {
                let key = ctx
                    .user_id
                    .as_deref()
                    .or(ctx.session_id.as_deref())
                    .unwrap_or("default");
                f64::from(stable_hash(key) % 100) < *threshold
            }
            // Unreachable through the parser; fail closed regardless.
            Condition::Equals(Field::Percentage, _) | Condition::LessThan(_, _) => false,
        }
    }
}

fn parse_field(name: &str) -> Result<Field, ParseConditionError> {
    match name {
        "environment" => Ok(Field::Environment),
        "deployment" => Ok(Field::Deployment),
        "userId" => Ok(Field::UserId),
        "percentage" => Ok(Field::Percentage),
        other => Err(ParseConditionError::UnknownField(other.to_string())),
    }
}

/// Deterministic 32-bit FNV-1a hash. Stable across calls and processes so
/// bucket assignment is consistent for a given key.
pub fn stable_hash(input: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in input.bytes() {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(environment: &str, deployment: &str) -> EvaluationContext {
        EvaluationContext::new(environment, deployment)
    }

    #[test]
    fn parses_supported_forms() {
        assert_eq!(
            Condition::parse("environment == \"production\""),
            Ok(Condition::Equals(Field::Environment, "production".into()))
        );
        assert_eq!(
            Condition::parse("deployment == \"blue\""),
            Ok(Condition::Equals(Field::Deployment, "blue".into()))
        );
        assert_eq!(
            Condition::parse("userId == \"u-1\""),
            Ok(Condition::Equals(Field::UserId, "u-1".into()))
        );
        assert_eq!(
            Condition::parse("percentage < 25"),
            Ok(Condition::LessThan(Field::Percentage, 25.0))
        );
    }

    #[test]
    fn rejects_unsupported_forms() {
        assert!(Condition::parse("region == \"eu\"").is_err());
        assert!(Condition::parse("environment == production").is_err());
        assert!(Condition::parse("percentage == \"25\"").is_err());
        assert!(Condition::parse("environment < 5").is_err());
        assert!(Condition::parse("percentage < abc").is_err());
        assert!(Condition::parse("gibberish").is_err());
        assert!(Condition::parse("").is_err());
    }

    #[test]
    fn equals_matches_context_fields() {
        let cond = Condition::parse("environment == \"staging\"").unwrap();
        assert!(cond.evaluate(&ctx("staging", "d")));
        assert!(!cond.evaluate(&ctx("production", "d")));
    }

    #[test]
    fn user_id_requires_presence() {
        let cond = Condition::parse("userId == \"u-1\"").unwrap();
        assert!(!cond.evaluate(&ctx("e", "d")));
        assert!(cond.evaluate(&ctx("e", "d").with_user("u-1")));
        assert!(!cond.evaluate(&ctx("e", "d").with_user("u-2")));
    }

    #[test]
    fn percentage_is_deterministic_per_key() {
        let cond = Condition::parse("percentage < 50").unwrap();
        let a = cond.evaluate(&ctx("e", "d").with_user("user-42"));
        for _ in 0..10 {
            assert_eq!(a, cond.evaluate(&ctx("e", "d").with_user("user-42")));
        }
    }

    #[test]
    fn percentage_bounds() {
        let nobody = Condition::parse("percentage < 0").unwrap();
        let everybody = Condition::parse("percentage < 100").unwrap();
        for i in 0..50 {
            let c = ctx("e", "d").with_user(format!("u{i}"));
            assert!(!nobody.evaluate(&c));
            assert!(everybody.evaluate(&c));
        }
    }

    #[test]
    fn percentage_falls_back_to_session_then_default() {
        let cond = Condition::parse("percentage < 50").unwrap();
        let by_session = cond.evaluate(&ctx("e", "d").with_session("s-1"));
        assert_eq!(by_session, cond.evaluate(&ctx("e", "d").with_session("s-1")));

        // No user or session: the shared "default" key.
        let by_default = cond.evaluate(&ctx("e", "d"));
        assert_eq!(by_default, cond.evaluate(&ctx("other", "d")));
    }

    #[test]
    fn stable_hash_is_stable() {
        assert_eq!(stable_hash("abc"), stable_hash("abc"));
        assert_ne!(stable_hash("abc"), stable_hash("abd"));
    }
}
