//! Shared utilities for integration tests.
#![allow(dead_code)]

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use runtime_config::validate::{ValidationReport, Validator};

/// A validator rejecting every candidate.
pub fn deny_all() -> Arc<dyn Validator> {
    Arc::new(|_: &Value| ValidationReport::invalid(vec!["rejected by policy".into()]))
}

/// A validator requiring `server.name` to be a string.
pub fn require_server_name() -> Arc<dyn Validator> {
    Arc::new(|config: &Value| {
        let name = config
            .get("server")
            .and_then(|server| server.get("name"))
            .and_then(Value::as_str);
        match name {
            Some(_) => ValidationReport::valid(),
            None => ValidationReport::invalid(vec!["server.name must be a string".into()]),
        }
    })
}

/// Poll `condition` until it holds or `deadline` elapses.
pub async fn wait_until<F: Fn() -> bool>(deadline: Duration, condition: F) -> bool {
    let started = Instant::now();
    while started.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}
