//! External validation capability.
//!
//! Structural and business-rule validation of candidate configurations is
//! owned by a collaborator outside this crate. The store only depends on the
//! [`Validator`] trait, passed in at construction; it never discovers a
//! validator through any other channel.

use async_trait::async_trait;
use serde_json::Value;

/// Outcome of validating a candidate configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// A report accepting the candidate.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A report rejecting the candidate with the given errors.
    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            is_valid: false,
            errors,
            warnings: Vec::new(),
        }
    }
}

/// Validates a merged candidate configuration before it is committed.
///
/// Must be a pure function of the candidate: no side effects on the store.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self, config: &Value) -> ValidationReport;
}

/// Any plain function over the candidate can serve as a validator.
#[async_trait]
impl<F> Validator for F
where
    F: Fn(&Value) -> ValidationReport + Send + Sync,
{
    async fn validate(&self, config: &Value) -> ValidationReport {
        (self)(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn closure_as_validator() {
        let validator = |config: &Value| {
            if config.get("name").is_some() {
                ValidationReport::valid()
            } else {
                ValidationReport::invalid(vec!["name is required".into()])
            }
        };

        let ok = validator.validate(&json!({"name": "engine"})).await;
        assert!(ok.is_valid);

        let bad = validator.validate(&json!({})).await;
        assert!(!bad.is_valid);
        assert_eq!(bad.errors.len(), 1);
    }
}
